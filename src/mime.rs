//! MIME-type fallback used when no rule matched a file.
//!
//! The guess itself comes from a [`MimeGuesser`]; the mapping from a MIME type
//! to a category label is a fixed table keyed on the top-level type and does
//! not depend on the configured rules.

use std::path::Path;
use tracing::debug;

/// Source of MIME-type guesses for a path.
pub trait MimeGuesser {
    /// Returns a MIME string such as `image/png`, or `None` when unknown.
    fn guess(&self, path: &Path) -> Option<String>;
}

/// Guesses from the file name first, then from the file's leading bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMimeGuesser;

impl MimeGuesser for SystemMimeGuesser {
    fn guess(&self, path: &Path) -> Option<String> {
        if let Some(mime) = mime_guess::from_path(path).first_raw() {
            return Some(mime.to_string());
        }

        match infer::get_from_path(path) {
            Ok(Some(kind)) => Some(kind.mime_type().to_string()),
            Ok(None) => None,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "content sniffing failed");
                None
            }
        }
    }
}

/// A guesser that never knows the answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownMime;

impl MimeGuesser for UnknownMime {
    fn guess(&self, _path: &Path) -> Option<String> {
        None
    }
}

const TOP_LEVEL_CATEGORIES: &[(&str, &str)] = &[
    ("image", "Images"),
    ("video", "Videos"),
    ("audio", "Audio"),
    ("text", "Documents"),
];

/// Maps a MIME type to a category label by its top-level type.
///
/// ```
/// use desktop_organizer::mime::mime_to_category;
///
/// assert_eq!(mime_to_category("image/png"), Some("Images"));
/// assert_eq!(mime_to_category("TEXT/plain"), Some("Documents"));
/// assert_eq!(mime_to_category("application/pdf"), None);
/// ```
pub fn mime_to_category(mime: &str) -> Option<&'static str> {
    let top = mime.split('/').next()?.trim().to_lowercase();
    TOP_LEVEL_CATEGORIES
        .iter()
        .find(|(prefix, _)| *prefix == top)
        .map(|(_, category)| *category)
}
