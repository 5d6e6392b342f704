//! Desktop items and the scanner that produces them.

use crate::config::CompiledFilters;
use crate::file_organizer::{OrganizeError, OrganizeResult};
use crate::rules::{extension_of, stem_of};
use crate::shortcut::is_shortcut_extension;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// How many directory levels below a folder are enumerated as members.
///
/// A folder's own entries are level 0; the entries of its sub-folders are
/// level 1. Anything deeper is not listed.
pub const MAX_FOLDER_DEPTH: usize = 1;

/// What kind of entry an item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    File,
    Shortcut,
    Directory,
}

impl ItemKind {
    pub fn icon(&self) -> &'static str {
        match self {
            ItemKind::File => "📄",
            ItemKind::Shortcut => "🔗",
            ItemKind::Directory => "📁",
        }
    }
}

/// One entry found on the desktop or inside a scanned folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopItem {
    pub path: PathBuf,
    pub name: String,
    pub kind: ItemKind,
    /// Size in bytes; zero for directories.
    pub size: u64,
    /// Entries of a directory, down to [`MAX_FOLDER_DEPTH`].
    pub members: Vec<DesktopItem>,
    /// Why the members of a directory could not be listed.
    pub scan_error: Option<String>,
}

impl DesktopItem {
    /// Builds an item without touching the filesystem.
    pub fn new(path: impl Into<PathBuf>, kind: ItemKind) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            kind,
            size: 0,
            members: Vec::new(),
            scan_error: None,
        }
    }

    pub fn with_members(mut self, members: Vec<DesktopItem>) -> Self {
        self.members = members;
        self
    }

    /// Reads an item from disk, listing directory members to the depth limit.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        Self::read(path, 0)
    }

    fn read(path: &Path, depth: usize) -> std::io::Result<Self> {
        let meta = fs::symlink_metadata(path)?;
        let mut item = DesktopItem::new(path, ItemKind::File);

        if meta.file_type().is_symlink() {
            item.kind = ItemKind::Shortcut;
        } else if meta.is_dir() {
            item.kind = ItemKind::Directory;
            if depth <= MAX_FOLDER_DEPTH {
                match read_members(path, depth + 1) {
                    Ok(members) => item.members = members,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "could not list folder");
                        item.scan_error = Some(e.to_string());
                    }
                }
            }
        } else {
            item.size = meta.len();
            if is_shortcut_extension(&extension_of(&item.name)) {
                item.kind = ItemKind::Shortcut;
            }
        }
        Ok(item)
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ItemKind::Directory
    }

    /// Dotted lower-case extension, empty for directories and bare names.
    pub fn extension(&self) -> String {
        if self.is_dir() {
            String::new()
        } else {
            extension_of(&self.name)
        }
    }

    /// Lower-cased name without its extension.
    pub fn stem(&self) -> String {
        stem_of(&self.name)
    }
}

fn read_members(dir: &Path, depth: usize) -> std::io::Result<Vec<DesktopItem>> {
    let mut members = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        match DesktopItem::read(&entry.path(), depth) {
            Ok(item) => members.push(item),
            Err(e) => debug!(path = %entry.path().display(), error = %e, "skipping member"),
        }
    }
    members.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(members)
}

/// Lists the desktop's immediate entries, sorted by name.
///
/// Entries rejected by `filters` are skipped, as are top-level folders whose
/// name is in `reserved` (the category folders items are moved into).
pub fn scan_desktop(
    root: &Path,
    filters: &CompiledFilters,
    reserved: &[String],
) -> OrganizeResult<Vec<DesktopItem>> {
    let items = scan_dir(root, filters, reserved)?;
    info!(count = items.len(), root = %root.display(), "found items on desktop");
    Ok(items)
}

/// Lists the entries of the staging folder, or nothing if it does not exist.
pub fn scan_staging(staging: &Path, filters: &CompiledFilters) -> OrganizeResult<Vec<DesktopItem>> {
    if !staging.is_dir() {
        return Ok(Vec::new());
    }
    let items = scan_dir(staging, filters, &[])?;
    info!(count = items.len(), staging = %staging.display(), "found items in staging folder");
    Ok(items)
}

fn scan_dir(
    root: &Path,
    filters: &CompiledFilters,
    reserved: &[String],
) -> OrganizeResult<Vec<DesktopItem>> {
    let entries = fs::read_dir(root).map_err(|e| OrganizeError::InvalidBasePath {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut items = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "could not read directory entry");
                continue;
            }
        };
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if !filters.should_include(&name) {
            debug!(name = %name, "ignored");
            continue;
        }
        if reserved.iter().any(|r| *r == name) {
            if path.is_dir() {
                debug!(name = %name, "category folder left in place");
            } else {
                warn!(name = %name, "item named like a category folder left in place");
            }
            continue;
        }
        match DesktopItem::from_path(&path) {
            Ok(item) => items.push(item),
            Err(e) => warn!(path = %path.display(), error = %e, "could not inspect item"),
        }
    }
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}

/// Total size in bytes of a file or of everything under a directory.
pub fn disk_usage(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
