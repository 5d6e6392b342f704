//! Cleanup chores run on the desktop after organizing.
//!
//! None of these classify anything: they delete known duplicate paths,
//! prune empty folders and merge folders into one. Every path handed in is
//! taken relative to the desktop root, and paths that would leave it are
//! refused.

use crate::file_organizer::{relocate, unique_destination};
use crate::item::disk_usage;
use crate::rules::extension_of;
use crate::shortcut::{SHORTCUT_EXTENSIONS, is_shortcut_extension};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("Desktop root {} is not a directory", .0.display())]
    InvalidRoot(PathBuf),

    #[error("Path {0:?} leaves the desktop and was refused")]
    EscapesRoot(String),

    #[error("Failed to create {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },
}

/// What a cleanup step did, or would do in a dry run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    /// `(from, to)` for every entry moved by [`consolidate`].
    pub moved: Vec<(PathBuf, PathBuf)>,
    pub bytes_freed: u64,
    pub failures: Vec<(PathBuf, String)>,
    pub dry_run: bool,
}

impl CleanupReport {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.moved.is_empty() && self.failures.is_empty()
    }

    fn fail(&mut self, path: PathBuf, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(path = %path.display(), reason = %reason, "cleanup step failed");
        self.failures.push((path, reason));
    }
}

/// Joins `relative` onto `root`, refusing absolute paths, `..` and paths
/// that name the root itself (such as `.`).
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf, CleanupError> {
    let path = Path::new(relative);
    let components: Vec<Component> = path.components().collect();
    let stays_inside = components
        .iter()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && components.iter().any(|c| matches!(c, Component::Normal(_)));
    if !stays_inside {
        return Err(CleanupError::EscapesRoot(relative.to_string()));
    }
    Ok(root.join(path))
}

fn check_root(root: &Path) -> Result<(), CleanupError> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(CleanupError::InvalidRoot(root.to_path_buf()))
    }
}

/// Deletes each listed desktop path that exists, file or folder.
pub fn remove_duplicates(
    desktop: &Path,
    literals: &[String],
    dry_run: bool,
) -> Result<CleanupReport, CleanupError> {
    check_root(desktop)?;
    let mut report = CleanupReport::new(dry_run);

    for literal in literals {
        match resolve_within(desktop, literal) {
            Ok(path) => remove_path(&path, &mut report),
            Err(e) => report.fail(PathBuf::from(literal), e.to_string()),
        }
    }

    info!(
        removed = report.removed.len(),
        bytes = report.bytes_freed,
        "duplicate removal finished"
    );
    Ok(report)
}

/// Deletes duplicate shortcuts by name.
///
/// Each name is tried as given and with every shortcut extension appended,
/// so `"Steam"` removes `Steam`, `Steam.lnk`, `Steam.url` and
/// `Steam.desktop` when present. Only symlinks and regular files with a
/// shortcut extension are deleted; anything else sharing the name is
/// reported as a failure and left alone.
pub fn remove_duplicate_shortcuts(
    desktop: &Path,
    names: &[String],
    dry_run: bool,
) -> Result<CleanupReport, CleanupError> {
    check_root(desktop)?;
    let mut report = CleanupReport::new(dry_run);

    for name in names {
        let bare = match resolve_within(desktop, name) {
            Ok(path) => path,
            Err(e) => {
                report.fail(PathBuf::from(name), e.to_string());
                continue;
            }
        };
        let candidates = std::iter::once(bare.clone()).chain(SHORTCUT_EXTENSIONS.iter().map(|ext| {
            let mut with_ext = bare.clone().into_os_string();
            with_ext.push(ext);
            PathBuf::from(with_ext)
        }));
        for candidate in candidates {
            let Ok(meta) = fs::symlink_metadata(&candidate) else {
                continue;
            };
            if !is_shortcut_entry(&candidate, &meta) {
                report.fail(candidate, "not a shortcut, left in place");
                continue;
            }
            remove_path(&candidate, &mut report);
        }
    }

    info!(removed = report.removed.len(), "duplicate shortcut removal finished");
    Ok(report)
}

fn is_shortcut_entry(path: &Path, meta: &fs::Metadata) -> bool {
    if meta.file_type().is_symlink() {
        return true;
    }
    meta.is_file()
        && path
            .file_name()
            .is_some_and(|n| is_shortcut_extension(&extension_of(&n.to_string_lossy())))
}

fn remove_path(path: &Path, report: &mut CleanupReport) {
    let Ok(meta) = fs::symlink_metadata(path) else {
        debug!(path = %path.display(), "not present");
        return;
    };
    let bytes = if meta.is_dir() { disk_usage(path) } else { meta.len() };

    if !report.dry_run {
        let removed = if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        if let Err(e) = removed {
            report.fail(path.to_path_buf(), e.to_string());
            return;
        }
        info!(path = %path.display(), "removed");
    }
    report.removed.push(path.to_path_buf());
    report.bytes_freed += bytes;
}

/// Removes every empty folder below `root`, deepest first. `root` itself is
/// kept even when it ends up empty.
///
/// A folder holding only folders that are themselves removed counts as
/// empty, in a dry run too.
pub fn remove_empty_dirs(root: &Path, dry_run: bool) -> Result<CleanupReport, CleanupError> {
    check_root(root)?;
    let mut report = CleanupReport::new(dry_run);
    let mut gone: HashSet<PathBuf> = HashSet::new();

    let dirs = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir());

    for entry in dirs {
        let dir = entry.path();
        let empty = match fs::read_dir(dir) {
            Ok(mut entries) => entries.all(|e| e.is_ok_and(|e| gone.contains(&e.path()))),
            Err(e) => {
                report.fail(dir.to_path_buf(), e.to_string());
                continue;
            }
        };
        if !empty {
            continue;
        }
        if !dry_run && let Err(e) = fs::remove_dir(dir) {
            report.fail(dir.to_path_buf(), e.to_string());
            continue;
        }
        debug!(path = %dir.display(), "removed empty folder");
        gone.insert(dir.to_path_buf());
        report.removed.push(dir.to_path_buf());
    }

    if !report.removed.is_empty() {
        info!(count = report.removed.len(), root = %root.display(), "removed empty folders");
    }
    Ok(report)
}

/// Moves the contents of each `sources` folder into `target`, renaming on
/// conflict, then removes the emptied source folders.
pub fn consolidate(
    desktop: &Path,
    sources: &[String],
    target: &str,
    dry_run: bool,
) -> Result<CleanupReport, CleanupError> {
    check_root(desktop)?;
    let target_path = resolve_within(desktop, target)?;
    let mut report = CleanupReport::new(dry_run);

    if !dry_run && !target_path.exists() {
        fs::create_dir_all(&target_path).map_err(|e| CleanupError::CreateDir {
            path: target_path.clone(),
            source: e,
        })?;
    }

    let mut claimed = HashSet::new();
    for source in sources {
        let source_path = match resolve_within(desktop, source) {
            Ok(path) => path,
            Err(e) => {
                report.fail(PathBuf::from(source), e.to_string());
                continue;
            }
        };
        if source_path == target_path {
            debug!(source = %source, "source is the target, skipping");
            continue;
        }
        if !source_path.is_dir() {
            report.fail(source_path, "source folder not found");
            continue;
        }
        merge_into(&source_path, &target_path, &mut claimed, &mut report);
    }

    info!(
        moved = report.moved.len(),
        target = %target_path.display(),
        "consolidation finished"
    );
    Ok(report)
}

fn merge_into(
    source: &Path,
    target: &Path,
    claimed: &mut HashSet<PathBuf>,
    report: &mut CleanupReport,
) {
    let entries = match fs::read_dir(source) {
        Ok(entries) => entries,
        Err(e) => {
            report.fail(source.to_path_buf(), e.to_string());
            return;
        }
    };
    let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    let mut left_behind = false;
    for entry in entries {
        let from = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        let to = unique_destination(target, &name, is_dir, claimed);
        claimed.insert(to.clone());

        if !report.dry_run
            && let Err(e) = relocate(&from, &to, is_dir)
        {
            report.fail(from, e.to_string());
            left_behind = true;
            continue;
        }
        report.moved.push((from, to));
    }

    if report.dry_run || left_behind {
        return;
    }
    match fs::remove_dir(source) {
        Ok(()) => report.removed.push(source.to_path_buf()),
        Err(e) => report.fail(source.to_path_buf(), e.to_string()),
    }
}
