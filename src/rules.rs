//! Category rule table: extension lookup and filename keyword scoring.
//!
//! The table keeps categories in the order they were configured. That order is
//! the tie-breaker everywhere a lookup could match more than one category, so
//! classification is reproducible from one run to the next.
//!
//! # Examples
//!
//! ```
//! use desktop_organizer::rules::RuleTable;
//!
//! let table = RuleTable::default();
//! assert_eq!(table.extension_category(".pdf"), Some("Documents"));
//! assert_eq!(table.extension_category("pdf"), None);
//! assert_eq!(table.score_keywords("holiday photo").map(|m| m.category), Some("Images"));
//! ```

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Label given to files no stage could place.
pub const OTHER: &str = "Other";

/// Label given to directories no stage could place.
pub const FOLDERS: &str = "Folders";

/// One named bucket with the extensions and keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    name: String,
    extensions: Vec<String>,
    keywords: Vec<String>,
}

impl CategoryRule {
    /// Builds a rule, lower-casing and de-duplicating extensions and keywords.
    ///
    /// Extensions are stored as given apart from case: one written without a
    /// leading dot is kept but can never match, because lookups always carry
    /// the dot.
    pub fn new<E, K>(name: impl Into<String>, extensions: E, keywords: K) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let name = name.into();
        let extensions = normalized(extensions);
        for ext in extensions.iter().filter(|e| !e.starts_with('.')) {
            warn!(
                category = %name,
                extension = %ext,
                "extension has no leading dot and will never match"
            );
        }
        Self {
            name,
            extensions,
            keywords: normalized(keywords),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn has_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }

    /// Number of distinct keywords found anywhere in `text`.
    ///
    /// `text` must already be lower-cased.
    fn keyword_hits(&self, text: &str) -> usize {
        self.keywords.iter().filter(|k| text.contains(k.as_str())).count()
    }
}

fn normalized<I>(values: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Winning category of a keyword scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordMatch<'a> {
    pub category: &'a str,
    pub score: usize,
}

/// Ordered, immutable set of category rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<CategoryRule>,
}

/// Error raised when two rules share a name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("category '{0}' is defined more than once")]
pub struct DuplicateCategory(pub String);

impl RuleTable {
    /// Creates a table from rules in iteration order.
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self, DuplicateCategory> {
        let mut names = HashSet::new();
        for rule in &rules {
            if !names.insert(rule.name.as_str()) {
                return Err(DuplicateCategory(rule.name.clone()));
            }
        }
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// Returns the first category, in table order, that lists `ext`.
    ///
    /// `ext` is the dotted suffix of a name (`.pdf`). Matching ignores case but
    /// not the dot: `pdf` and the empty string never match.
    pub fn extension_category(&self, ext: &str) -> Option<&str> {
        if !ext.starts_with('.') || ext.len() < 2 {
            return None;
        }
        let ext = ext.to_lowercase();
        self.rules
            .iter()
            .find(|r| r.has_extension(&ext))
            .map(|r| r.name.as_str())
    }

    /// Scores every category by how many of its keywords occur in `text`.
    ///
    /// Keywords match as case-insensitive substrings, so `art` matches
    /// `start`. The highest score wins; on a tie the category that comes
    /// first in the table wins. Returns `None` when nothing scores.
    pub fn score_keywords(&self, text: &str) -> Option<KeywordMatch<'_>> {
        let text = text.to_lowercase();
        let mut best: Option<KeywordMatch<'_>> = None;
        for rule in &self.rules {
            let score = rule.keyword_hits(&text);
            if score == 0 {
                continue;
            }
            if best.is_none_or(|b| score > b.score) {
                best = Some(KeywordMatch {
                    category: &rule.name,
                    score,
                });
            }
        }
        best
    }

    /// Built-in categories used when no configuration file is found.
    pub fn builtin() -> Self {
        let rule = |name: &str, exts: &[&str], kws: &[&str]| {
            CategoryRule::new(name, exts.iter().copied(), kws.iter().copied())
        };
        Self {
            rules: vec![
                rule(
                    "Documents",
                    &[".pdf", ".doc", ".docx", ".txt", ".rtf", ".odt"],
                    &["document", "paper", "report", "manual"],
                ),
                rule(
                    "Images",
                    &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".svg"],
                    &["photo", "image", "picture", "screenshot"],
                ),
                rule(
                    "Videos",
                    &[".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv"],
                    &["video", "movie", "clip"],
                ),
                rule(
                    "Audio",
                    &[".mp3", ".wav", ".flac", ".aac", ".ogg"],
                    &["music", "audio", "sound"],
                ),
                rule(
                    "Archives",
                    &[".zip", ".rar", ".7z", ".tar", ".gz"],
                    &["archive", "backup", "compressed"],
                ),
                rule(
                    "Applications",
                    &[".exe", ".msi", ".dmg", ".app"],
                    &["installer", "setup", "application"],
                ),
                rule(
                    "Spreadsheets",
                    &[".xls", ".xlsx", ".csv", ".ods"],
                    &["spreadsheet", "data", "excel"],
                ),
                rule(
                    "Presentations",
                    &[".ppt", ".pptx", ".odp"],
                    &["presentation", "slides", "powerpoint"],
                ),
                rule(
                    "Code",
                    &[".py", ".js", ".html", ".css", ".java", ".cpp", ".c", ".php"],
                    &["code", "script", "program", "source"],
                ),
            ],
        }
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Dotted, lower-cased extension of a file name, or an empty string.
///
/// ```
/// use desktop_organizer::rules::extension_of;
///
/// assert_eq!(extension_of("Report.PDF"), ".pdf");
/// assert_eq!(extension_of("backup.tar.gz"), ".gz");
/// assert_eq!(extension_of(".bashrc"), "");
/// assert_eq!(extension_of("README"), "");
/// ```
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Lower-cased file name without its final extension.
pub fn stem_of(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| name.to_lowercase())
}

#[derive(Debug, Default, Deserialize)]
struct RuleBody {
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

impl<'de> Deserialize<'de> for RuleTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = RuleTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of category names to extension and keyword lists")
            }

            fn visit_map<A>(self, mut map: A) -> Result<RuleTable, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut rules = Vec::new();
                while let Some((name, body)) = map.next_entry::<String, RuleBody>()? {
                    rules.push(CategoryRule::new(name, body.extensions, body.keywords));
                }
                RuleTable::new(rules).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}
