//! Undoing the last organizing run.
//!
//! Moves every item recorded in the history back to where it came from,
//! newest move first.
use crate::file_organizer::{Operation, OperationLog, OrganizeError, OrganizeResult, relocate};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of an undo.
#[derive(Debug, Default)]
pub struct UndoReport {
    pub restored_files: usize,
    /// Moves that could not be reverted, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Moves whose item is no longer where it was put.
    pub skipped_files: Vec<(PathBuf, String)>,
}

impl UndoReport {
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }
}

enum RestoreError {
    Missing(PathBuf),
    Failed(PathBuf, String),
}

/// Reverts organizing runs from their recorded history.
pub struct UndoManager;

impl UndoManager {
    /// Undoes the most recent organizing run in `base_path`.
    ///
    /// * An item no longer at its recorded destination is skipped.
    /// * Anything now occupying an original location is renamed aside with a
    ///   `.bak.<timestamp>` suffix before the item is put back.
    /// * Parent folders removed since the run (such as an emptied staging
    ///   folder) are recreated.
    ///
    /// The history file is deleted only if every move was reverted.
    pub fn undo(base_path: &Path) -> OrganizeResult<UndoReport> {
        if !base_path.is_dir() {
            return Err(OrganizeError::InvalidBasePath {
                path: base_path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "base path does not exist"),
            });
        }

        let log = OperationLog::load(base_path)?.ok_or_else(|| {
            OrganizeError::InvalidHistoryFormat {
                reason: "No previous organization found to undo".to_string(),
            }
        })?;

        let mut report = UndoReport::default();
        for operation in log.operations.iter().rev() {
            match Self::restore(operation) {
                Ok(()) => report.restored_files += 1,
                Err(RestoreError::Missing(path)) => {
                    warn!(path = %path.display(), "item not found, skipping");
                    report
                        .skipped_files
                        .push((path, "File not found at expected location".to_string()));
                }
                Err(RestoreError::Failed(path, reason)) => {
                    warn!(path = %path.display(), reason = %reason, "could not restore item");
                    report.failed_restores.push((path, reason));
                }
            }
        }

        if report.is_complete_success()
            && let Err(e) = OperationLog::delete(base_path)
        {
            warn!(error = %e, "could not delete history file");
        }
        info!(restored = report.restored_files, "undo finished");

        Ok(report)
    }

    fn restore(operation: &Operation) -> Result<(), RestoreError> {
        let meta = fs::symlink_metadata(&operation.new_path)
            .map_err(|_| RestoreError::Missing(operation.new_path.clone()))?;

        let original = &operation.original_path;
        if fs::symlink_metadata(original).is_ok() {
            let backup_path = Self::backup_path(original);
            fs::rename(original, &backup_path).map_err(|e| {
                RestoreError::Failed(
                    original.clone(),
                    format!("Could not back up conflicting item: {}", e),
                )
            })?;
            info!(
                conflict = %original.display(),
                backup = %backup_path.display(),
                "set conflicting item aside"
            );
        }

        if let Some(parent) = original.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                RestoreError::Failed(
                    parent.to_path_buf(),
                    format!("Could not recreate folder: {}", e),
                )
            })?;
        }

        relocate(&operation.new_path, original, meta.is_dir()).map_err(|e| {
            RestoreError::Failed(
                operation.new_path.clone(),
                format!("Failed to restore item: {}", e),
            )
        })
    }

    /// `notes.txt` becomes `notes.txt.bak.20251109-143052`.
    fn backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "item".to_string());
        original_path.with_file_name(format!("{}.bak.{}", filename, timestamp))
    }
}
