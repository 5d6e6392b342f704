//! desktop-organizer - sort a cluttered desktop into category folders
//!
//! Items on the desktop (and in the `Folders` staging area) are classified
//! by a staged pipeline: extension rules, keyword scoring, shortcut target
//! resolution, folder-content majority and a MIME fallback. Each item is
//! then moved into a folder named after its category, with a backup
//! beforehand and a history that lets the run be undone.
//!
//! ```no_run
//! use desktop_organizer::{Classifier, DesktopItem, RuleTable};
//! use std::path::Path;
//!
//! let classifier = Classifier::new(RuleTable::builtin());
//! let item = DesktopItem::from_path(Path::new("/home/me/Desktop/report.pdf")).unwrap();
//! println!("{}", classifier.classify(&item).category);
//! ```

pub mod backup;
pub mod classifier;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod file_organizer;
pub mod item;
pub mod mime;
pub mod output;
pub mod rules;
pub mod shortcut;
pub mod undo;

pub use classifier::{ClassificationResult, Classifier, Stage};
pub use config::{CompiledFilters, ConfigError, OrganizerConfig};
pub use file_organizer::{FileOrganizer, RunSummary};
pub use item::{DesktopItem, ItemKind};
pub use mime::{MimeGuesser, SystemMimeGuesser};
pub use rules::{CategoryRule, RuleTable};
pub use shortcut::{ShortcutResolver, ShortcutStrategy};
pub use undo::{UndoManager, UndoReport};

pub use cli::{Cli, run};
