//! Snapshotting desktop items before they are moved.

use crate::item::DesktopItem;
use chrono::Local;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Failed to create backup directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },
}

/// Where a backup ended up and what went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub path: PathBuf,
    pub copied: usize,
    pub bytes: u64,
    /// Items that could not be copied, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// Copies `items` into a fresh `desktop_backup_YYYYmmdd_HHMMSS` folder under
/// `backup_root`.
///
/// Only failing to create the backup folder is an error. An item that cannot
/// be copied is logged and listed in the report.
pub fn create_backup(items: &[DesktopItem], backup_root: &Path) -> Result<BackupReport, BackupError> {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = backup_root.join(format!("desktop_backup_{}", stamp));
    fs::create_dir_all(&path).map_err(|e| BackupError::CreateDir {
        path: path.clone(),
        source: e,
    })?;

    let mut report = BackupReport {
        path,
        copied: 0,
        bytes: 0,
        failed: Vec::new(),
    };

    for item in items {
        let destination = report.path.join(&item.name);
        let copied = if item.is_dir() {
            copy_dir_recursive(&item.path, &destination)
        } else {
            fs::copy(&item.path, &destination)
        };
        match copied {
            Ok(bytes) => {
                report.copied += 1;
                report.bytes += bytes;
            }
            Err(e) => {
                warn!(item = %item.name, error = %e, "could not back up item");
                report.failed.push((item.path.clone(), e.to_string()));
            }
        }
    }

    info!(
        path = %report.path.display(),
        copied = report.copied,
        failed = report.failed.len(),
        "backup created"
    );
    Ok(report)
}

/// Copies a directory tree, returning the number of bytes copied.
///
/// Symbolic links inside the tree are not followed.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<u64> {
    fs::create_dir_all(dst)?;

    let mut bytes = 0;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            bytes += fs::copy(entry.path(), &target)?;
        } else if file_type.is_symlink() {
            copy_link(entry.path(), &target)?;
        }
    }
    Ok(bytes)
}

#[cfg(unix)]
fn copy_link(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(src)?, dst)
}

#[cfg(not(unix))]
fn copy_link(src: &Path, dst: &Path) -> io::Result<()> {
    fs::copy(src, dst).map(|_| ())
}
