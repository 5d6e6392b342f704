//! Classification engine.
//!
//! Every item ends up with exactly one category. Stages are tried in a fixed
//! order and the first one that produces a category wins:
//!
//! | item       | stages                                             | default   |
//! |------------|----------------------------------------------------|-----------|
//! | file       | extension, keyword (stem), MIME                    | `Other`   |
//! | shortcut   | extension, shortcut (stem + target keywords), MIME | `Other`   |
//! | directory  | folder content majority                            | `Folders` |
//!
//! Classification only reads the filesystem. Failures while reading (an
//! unreadable shortcut, an unlisted folder, no MIME guess) make that stage
//! miss and are recorded on the result instead of being returned as errors.

use crate::item::{DesktopItem, ItemKind, MAX_FOLDER_DEPTH};
use crate::mime::{MimeGuesser, SystemMimeGuesser, mime_to_category};
use crate::rules::{FOLDERS, OTHER, RuleTable};
use crate::shortcut::{ShortcutResolver, keyword_text};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Which stage decided an item's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extension,
    Keyword,
    Shortcut,
    FolderContent,
    Mime,
    Default,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extension => "extension",
            Stage::Keyword => "keyword",
            Stage::Shortcut => "shortcut",
            Stage::FolderContent => "folder-content",
            Stage::Mime => "mime",
            Stage::Default => "default",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The category chosen for one item and how it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub category: String,
    pub stage: Stage,
    /// Keyword hits for the keyword and shortcut stages, matching file count
    /// for the folder-content stage.
    pub score: Option<usize>,
    /// A degradation met on the way, such as an unreadable folder.
    pub warning: Option<String>,
}

impl ClassificationResult {
    fn new(category: impl Into<String>, stage: Stage) -> Self {
        Self {
            category: category.into(),
            stage,
            score: None,
            warning: None,
        }
    }

    fn scored(mut self, score: usize) -> Self {
        self.score = Some(score);
        self
    }

    fn warned(mut self, warning: Option<String>) -> Self {
        self.warning = warning;
        self
    }
}

/// Share of a folder's files one category needs, as `NUMERATOR / DENOMINATOR`.
/// A folder qualifies only when the count is strictly above this share.
const MAJORITY_NUMERATOR: usize = 3;
const MAJORITY_DENOMINATOR: usize = 5;

/// Per-category file counts for one folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderTally {
    pub counts: HashMap<String, usize>,
    /// Every file counted, including files no rule matched.
    pub total: usize,
}

impl FolderTally {
    /// The category holding more than 60% of the files, if any.
    ///
    /// The comparison is exact: 3 of 5 files is not enough, 4 of 5 is.
    pub fn majority<'a>(&self, rules: &'a RuleTable) -> Option<(&'a str, usize)> {
        if self.total == 0 {
            return None;
        }
        let mut best: Option<(&'a str, usize)> = None;
        for name in rules.category_names() {
            let count = self.counts.get(name).copied().unwrap_or(0);
            if count > 0 && best.is_none_or(|(_, c)| count > c) {
                best = Some((name, count));
            }
        }
        best.filter(|&(_, count)| {
            count * MAJORITY_DENOMINATOR > self.total * MAJORITY_NUMERATOR
        })
    }
}

/// Assigns a category to each desktop item.
pub struct Classifier {
    rules: RuleTable,
    shortcuts: ShortcutResolver,
    mime: Box<dyn MimeGuesser>,
}

impl Classifier {
    /// Creates a classifier with the default shortcut and MIME strategies.
    pub fn new(rules: RuleTable) -> Self {
        Self {
            rules,
            shortcuts: ShortcutResolver::default(),
            mime: Box::new(SystemMimeGuesser),
        }
    }

    pub fn with_mime_guesser(mut self, mime: impl MimeGuesser + 'static) -> Self {
        self.mime = Box::new(mime);
        self
    }

    pub fn with_shortcut_resolver(mut self, shortcuts: ShortcutResolver) -> Self {
        self.shortcuts = shortcuts;
        self
    }

    /// Classifies one item. Identical inputs always give identical results.
    pub fn classify(&self, item: &DesktopItem) -> ClassificationResult {
        let result = match item.kind {
            ItemKind::Directory => self.classify_folder(item),
            ItemKind::File | ItemKind::Shortcut => self.classify_file(item),
        };
        debug!(
            item = %item.name,
            category = %result.category,
            stage = %result.stage,
            score = ?result.score,
            "classified"
        );
        result
    }

    /// Classifies every item, keyed by path. Nothing is modified.
    pub fn classify_all<'a, I>(&self, items: I) -> BTreeMap<PathBuf, ClassificationResult>
    where
        I: IntoIterator<Item = &'a DesktopItem>,
    {
        items
            .into_iter()
            .map(|item| (item.path.clone(), self.classify(item)))
            .collect()
    }

    fn classify_file(&self, item: &DesktopItem) -> ClassificationResult {
        if let Some(category) = self.rules.extension_category(&item.extension()) {
            return ClassificationResult::new(category, Stage::Extension);
        }

        let mut warning = None;
        if item.kind == ItemKind::Shortcut {
            let target = self.shortcuts.resolve(&item.path);
            if target.is_empty() {
                warn!(item = %item.name, "could not resolve shortcut target, using name only");
                warning = Some("shortcut target could not be resolved".to_string());
            }
            let text = keyword_text(&item.stem(), target.as_str());
            if let Some(m) = self.rules.score_keywords(&text) {
                return ClassificationResult::new(m.category, Stage::Shortcut)
                    .scored(m.score)
                    .warned(warning);
            }
        } else if let Some(m) = self.rules.score_keywords(&item.stem()) {
            return ClassificationResult::new(m.category, Stage::Keyword).scored(m.score);
        }

        match self.mime.guess(&item.path) {
            Some(mime) => {
                if let Some(category) = mime_to_category(&mime) {
                    return ClassificationResult::new(category, Stage::Mime).warned(warning);
                }
                debug!(item = %item.name, mime = %mime, "MIME type has no category");
            }
            None => debug!(item = %item.name, "no MIME type guess"),
        }

        ClassificationResult::new(OTHER, Stage::Default).warned(warning)
    }

    fn classify_folder(&self, item: &DesktopItem) -> ClassificationResult {
        if let Some(err) = &item.scan_error {
            warn!(folder = %item.name, error = %err, "folder contents unreadable, using default");
            return ClassificationResult::new(FOLDERS, Stage::Default)
                .warned(Some(format!("could not read folder contents: {}", err)));
        }

        let tally = self.tally_folder(item);
        match tally.majority(&self.rules) {
            Some((category, count)) => {
                ClassificationResult::new(category, Stage::FolderContent).scored(count)
            }
            None => {
                debug!(
                    folder = %item.name,
                    total = tally.total,
                    "no category holds a majority of the folder"
                );
                ClassificationResult::new(FOLDERS, Stage::Default)
            }
        }
    }

    /// Counts the folder's files, and those of its sub-folders down to
    /// [`MAX_FOLDER_DEPTH`], by extension or keyword category.
    pub fn tally_folder(&self, folder: &DesktopItem) -> FolderTally {
        let mut tally = FolderTally::default();
        self.tally_members(folder, 0, &mut tally);
        tally
    }

    fn tally_members(&self, folder: &DesktopItem, depth: usize, tally: &mut FolderTally) {
        for member in &folder.members {
            match member.kind {
                ItemKind::Directory => {
                    if depth < MAX_FOLDER_DEPTH {
                        if let Some(err) = &member.scan_error {
                            debug!(folder = %member.name, error = %err, "skipping unreadable sub-folder");
                            continue;
                        }
                        self.tally_members(member, depth + 1, tally);
                    }
                }
                ItemKind::File | ItemKind::Shortcut => {
                    tally.total += 1;
                    if let Some(category) = self.member_category(member) {
                        *tally.counts.entry(category.to_string()).or_insert(0) += 1;
                    }
                }
            }
        }
    }

    fn member_category(&self, member: &DesktopItem) -> Option<&str> {
        self.rules
            .extension_category(&member.extension())
            .or_else(|| self.rules.score_keywords(&member.stem()).map(|m| m.category))
    }
}
