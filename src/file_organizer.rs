//! Moving classified items into category folders.
//!
//! This module creates category folders inside the desktop, picks a free
//! destination name when one is already taken, moves the item and records
//! the move so it can be undone later.
use crate::backup::copy_dir_recursive;
use crate::item::disk_usage;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Name of the move history file kept in the desktop root.
pub const HISTORY_FILE: &str = ".desktop_organizer_history.json";

/// Represents a single item move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Where the item was before organizing.
    pub original_path: PathBuf,
    /// Where the item was moved to.
    pub new_path: PathBuf,
    /// The category folder the item was moved into.
    pub category: String,
}

/// All moves performed in one organizing run.
///
/// Persisted next to the organized items so the run can be undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLog {
    /// RFC 3339 timestamp of the run.
    pub timestamp: String,
    /// The desktop root that was organized.
    pub base_path: PathBuf,
    pub operations: Vec<Operation>,
}

impl OperationLog {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            base_path,
            operations: Vec::new(),
        }
    }

    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn history_file_path(base_path: &Path) -> PathBuf {
        base_path.join(HISTORY_FILE)
    }

    /// Writes this log as pretty JSON into `base_path`.
    pub fn save(&self, base_path: &Path) -> OrganizeResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            OrganizeError::HistoryWriteFailed {
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            }
        })?;
        fs::write(Self::history_file_path(base_path), json)
            .map_err(|e| OrganizeError::HistoryWriteFailed { source: e })?;
        debug!(moves = self.operations.len(), "history saved");
        Ok(())
    }

    /// Loads the last saved log, if there is one.
    pub fn load(base_path: &Path) -> OrganizeResult<Option<Self>> {
        let history_path = Self::history_file_path(base_path);
        if !history_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&history_path)
            .map_err(|e| OrganizeError::HistoryReadFailed { source: e })?;
        let log = serde_json::from_str(&json).map_err(|e| OrganizeError::InvalidHistoryFormat {
            reason: e.to_string(),
        })?;
        Ok(Some(log))
    }

    pub fn delete(base_path: &Path) -> OrganizeResult<()> {
        let history_path = Self::history_file_path(base_path);
        if history_path.exists() {
            fs::remove_file(&history_path)
                .map_err(|e| OrganizeError::HistoryWriteFailed { source: e })?;
        }
        Ok(())
    }
}

/// Errors that can occur while organizing.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("Failed to move {} to {}: {error}", .item.display(), .destination.display())]
    FileMoveFailure {
        item: PathBuf,
        destination: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("Category path {} exists but is not a folder", .path.display())]
    CategoryPathNotDirectory { path: PathBuf },

    #[error("Invalid base path {}: {source}", .path.display())]
    InvalidBasePath { path: PathBuf, source: io::Error },

    #[error("Failed to write history file: {source}")]
    HistoryWriteFailed { source: io::Error },

    #[error("Failed to read history file: {source}")]
    HistoryReadFailed { source: io::Error },

    #[error("Invalid history file format: {reason}")]
    InvalidHistoryFormat { reason: String },
}

/// Result type for organizing operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// What a single move did, or would do in a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub operation: Operation,
    /// Bytes relocated by the move.
    pub bytes: u64,
    pub dry_run: bool,
}

/// Totals for one organizing run, summed from individual moves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub moved: usize,
    pub failed: usize,
    pub bytes_moved: u64,
    pub per_category: BTreeMap<String, usize>,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &MoveOutcome) {
        self.moved += 1;
        self.bytes_moved += outcome.bytes;
        *self
            .per_category
            .entry(outcome.operation.category.clone())
            .or_insert(0) += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn attempted(&self) -> usize {
        self.moved + self.failed
    }
}

/// Moves items into category folders.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Moves `item_path` into `base_path/category`, creating the folder.
    ///
    /// If the name is already taken in the category folder, `_1`, `_2`, ...
    /// is appended to the stem until a free name is found. In a dry run
    /// nothing is created or moved; the outcome describes the planned move.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use desktop_organizer::file_organizer::FileOrganizer;
    /// use std::path::Path;
    ///
    /// let outcome = FileOrganizer::move_item(
    ///     Path::new("/home/me/Desktop"),
    ///     Path::new("/home/me/Desktop/report.pdf"),
    ///     "Documents",
    ///     false,
    /// );
    /// match outcome {
    ///     Ok(o) => println!("Moved to {}", o.operation.new_path.display()),
    ///     Err(e) => eprintln!("Move failed: {}", e),
    /// }
    /// ```
    pub fn move_item(
        base_path: &Path,
        item_path: &Path,
        category: &str,
        dry_run: bool,
    ) -> OrganizeResult<MoveOutcome> {
        Self::move_item_claiming(base_path, item_path, category, dry_run, &mut HashSet::new())
    }

    /// Like [`FileOrganizer::move_item`], but also avoids every path in
    /// `claimed` and adds the chosen destination to it.
    ///
    /// A dry run moves nothing, so without the claimed set two items with the
    /// same name would both be planned onto the same free path.
    pub fn move_item_claiming(
        base_path: &Path,
        item_path: &Path,
        category: &str,
        dry_run: bool,
        claimed: &mut HashSet<PathBuf>,
    ) -> OrganizeResult<MoveOutcome> {
        if !base_path.is_dir() {
            return Err(OrganizeError::InvalidBasePath {
                path: base_path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "base path does not exist"),
            });
        }

        let category_path = base_path.join(category);
        let file_name = item_path
            .file_name()
            .ok_or_else(|| OrganizeError::FileMoveFailure {
                item: item_path.to_path_buf(),
                destination: category_path.clone(),
                error: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "item has no name component",
                ),
            })?;

        if category_path == item_path || (category_path.exists() && !category_path.is_dir()) {
            return Err(OrganizeError::CategoryPathNotDirectory {
                path: category_path,
            });
        }

        let is_dir = fs::symlink_metadata(item_path)
            .map(|m| m.is_dir())
            .unwrap_or(false);
        let destination =
            unique_destination(&category_path, &file_name.to_string_lossy(), is_dir, claimed);
        claimed.insert(destination.clone());
        let bytes = disk_usage(item_path);
        let operation = Operation {
            original_path: item_path.to_path_buf(),
            new_path: destination.clone(),
            category: category.to_string(),
        };

        if dry_run {
            info!(
                "[DRY RUN] Would move: {} -> {}/{}",
                file_name.to_string_lossy(),
                category,
                file_name_of(&destination)
            );
            return Ok(MoveOutcome {
                operation,
                bytes,
                dry_run,
            });
        }

        if !category_path.exists() {
            fs::create_dir_all(&category_path).map_err(|e| {
                OrganizeError::DirectoryCreationFailed {
                    path: category_path.clone(),
                    source: e,
                }
            })?;
            info!(folder = %category, "created category folder");
        }

        relocate(item_path, &destination, is_dir).map_err(|e| OrganizeError::FileMoveFailure {
            item: item_path.to_path_buf(),
            destination: destination.clone(),
            error: e,
        })?;
        info!(
            "Moved: {} -> {}/{}",
            file_name.to_string_lossy(),
            category,
            file_name_of(&destination)
        );

        Ok(MoveOutcome {
            operation,
            bytes,
            dry_run,
        })
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// First path for `name` inside `folder` that neither exists nor is in
/// `claimed`.
///
/// Files keep their extension (`notes_1.txt`); directories get the counter
/// appended to the whole name (`Projects_1`).
pub fn unique_destination(
    folder: &Path,
    name: &str,
    is_dir: bool,
    claimed: &HashSet<PathBuf>,
) -> PathBuf {
    let is_free = |p: &PathBuf| !p.exists() && !claimed.contains(p);
    let candidate = folder.join(name);
    if is_free(&candidate) {
        return candidate;
    }

    let path = Path::new(name);
    let (stem, extension) = match (is_dir, path.file_stem(), path.extension()) {
        (false, Some(stem), Some(ext)) => (
            stem.to_string_lossy().into_owned(),
            format!(".{}", ext.to_string_lossy()),
        ),
        _ => (name.to_string(), String::new()),
    };

    (1..)
        .map(|n| folder.join(format!("{}_{}{}", stem, n, extension)))
        .find(is_free)
        .unwrap_or(candidate)
}

/// Renames, falling back to copy and delete across filesystems.
pub(crate) fn relocate(from: &Path, to: &Path, is_dir: bool) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(from = %from.display(), "rename crosses devices, copying instead");
            if is_dir {
                copy_dir_recursive(from, to)?;
                fs::remove_dir_all(from)
            } else {
                fs::copy(from, to)?;
                fs::remove_file(from)
            }
        }
        Err(e) => Err(e),
    }
}
