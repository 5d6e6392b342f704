//! Organizer configuration: category rules, ignore filters and run defaults.
//!
//! Configuration is a single JSON or TOML document. Files ending in `.toml`
//! are read as TOML and everything else as JSON. Keys left out of a file keep
//! their default value.
//!
//! ```json
//! {
//!   "categories": {
//!     "Documents": { "extensions": [".pdf", ".txt"], "keywords": ["report"] },
//!     "Games":     { "keywords": ["game", "steam"] }
//!   },
//!   "ignore_files": [".DS_Store", "Thumbs.db", "desktop.ini"],
//!   "ignore_patterns": ["*.tmp"],
//!   "dry_run": false,
//!   "cleanup": { "duplicates": ["Copy of notes.txt"], "remove_empty_dirs": true }
//! }
//! ```
//!
//! The order of `categories` in the document is the order in which rules are
//! tried, so it decides every tie.

use crate::file_organizer::HISTORY_FILE;
use crate::rules::{FOLDERS, OTHER, RuleTable};
use glob::Pattern;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration in {}: {reason}", .path.display())]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("IO error reading configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// File names looked for in the working directory when no path is given.
const LOCAL_CONFIG_FILES: &[&str] = &["desktop_organizer.json", "desktop_organizer.toml"];

/// Everything the organizer reads from its configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OrganizerConfig {
    pub categories: RuleTable,
    pub ignore_files: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub ignore_regex: Vec<String>,
    pub include_hidden: bool,
    pub dry_run: bool,
    pub create_backup: bool,
    pub ask_confirmation: bool,
    pub backup_dir: PathBuf,
    pub staging_folder: String,
    pub cleanup: CleanupConfig,
}

/// Paths removed by the `cleanup` command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Paths relative to the desktop that are known duplicates.
    pub duplicates: Vec<String>,
    /// Shortcut names, with or without a shortcut extension.
    pub shortcuts: Vec<String>,
    pub remove_empty_dirs: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            duplicates: Vec::new(),
            shortcuts: Vec::new(),
            remove_empty_dirs: true,
        }
    }
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            categories: RuleTable::builtin(),
            ignore_files: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                "desktop.ini".to_string(),
            ],
            ignore_patterns: Vec::new(),
            ignore_regex: Vec::new(),
            include_hidden: false,
            dry_run: true,
            create_backup: true,
            ask_confirmation: true,
            backup_dir: PathBuf::from("backups"),
            staging_folder: FOLDERS.to_string(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl OrganizerConfig {
    /// Loads configuration, falling back through the usual locations.
    ///
    /// 1. `config_path`, which must exist if given
    /// 2. `desktop_organizer.json` or `desktop_organizer.toml` in the working directory
    /// 3. `desktop-organizer/config.json` or `config.toml` in the user config directory
    /// 4. built-in defaults
    pub fn load(config_path: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        for name in LOCAL_CONFIG_FILES {
            let local = PathBuf::from(name);
            if local.exists() {
                return Self::load_from_file(&local);
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            for name in ["config.json", "config.toml"] {
                let user_config = config_dir.join("desktop-organizer").join(name);
                if user_config.exists() {
                    return Self::load_from_file(&user_config);
                }
            }
        }

        debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Loads configuration from a specific JSON or TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        let config = if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
        .map_err(|reason| ConfigError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        })?;

        info!(
            path = %path.display(),
            categories = config.categories.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Compiles the ignore rules into a reusable filter.
    pub fn compile_filters(&self) -> ConfigResult<CompiledFilters> {
        FilterConfig {
            include_hidden: self.include_hidden,
            ignore_files: self.ignore_files.clone(),
            ignore_patterns: self.ignore_patterns.clone(),
            ignore_regex: self.ignore_regex.clone(),
        }
        .compile()
    }

    /// Names of folders that hold organized items and are never reorganized.
    pub fn reserved_folder_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .categories
            .category_names()
            .map(str::to_string)
            .collect();
        for fixed in [OTHER, FOLDERS, self.staging_folder.as_str()] {
            if !names.iter().any(|n| n == fixed) {
                names.push(fixed.to_string());
            }
        }
        names
    }
}

/// Raw ignore rules, before compilation.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    pub include_hidden: bool,
    pub ignore_files: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub ignore_regex: Vec<String>,
}

impl FilterConfig {
    /// Validates and compiles glob and regex patterns.
    pub fn compile(self) -> ConfigResult<CompiledFilters> {
        let patterns = self
            .ignore_patterns
            .iter()
            .map(|p| Pattern::new(p).map_err(|_| ConfigError::InvalidGlobPattern(p.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let regexes = self
            .ignore_regex
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledFilters {
            include_hidden: self.include_hidden,
            ignore_files: self.ignore_files.into_iter().collect(),
            patterns,
            regexes,
        })
    }
}

/// Compiled ignore rules, applied to entry names while scanning.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    include_hidden: bool,
    ignore_files: HashSet<String>,
    patterns: Vec<Pattern>,
    regexes: Vec<Regex>,
}

impl CompiledFilters {
    /// Returns false for names that should be left alone.
    ///
    /// A name is skipped if it is hidden (unless hidden files are enabled),
    /// listed exactly, matches a glob pattern, or matches a regex. The move
    /// history file is always skipped.
    pub fn should_include(&self, name: &str) -> bool {
        if name == HISTORY_FILE || (!self.include_hidden && name.starts_with('.')) {
            return false;
        }
        if self.ignore_files.contains(name) {
            return false;
        }
        if self.patterns.iter().any(|p| p.matches(name)) {
            return false;
        }
        !self.regexes.iter().any(|r| r.is_match(name))
    }
}
