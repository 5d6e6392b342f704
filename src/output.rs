//! Console output for the command-line front end.
//!
//! Everything the user reads goes through [`OutputFormatter`]; diagnostics
//! go through `tracing` instead.

use crate::classifier::{ClassificationResult, Stage};
use crate::item::DesktopItem;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Styled console output.
///
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Progress bars and summary tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use desktop_organizer::output::OutputFormatter;
    /// OutputFormatter::success("Desktop organized!");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red to stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Prints one planned move: icon, name, target category and the stage
    /// that decided it.
    pub fn classification(item: &DesktopItem, result: &ClassificationResult) {
        println!("{}", Self::classification_line(item, result));
        if let Some(warning) = &result.warning {
            println!("    {} {}", "⚠".yellow(), warning.dimmed());
        }
    }

    /// The text printed by [`OutputFormatter::classification`], without the
    /// warning line.
    pub fn classification_line(item: &DesktopItem, result: &ClassificationResult) -> String {
        let how = match (result.stage, result.score) {
            (Stage::Keyword | Stage::Shortcut, Some(score)) => {
                format!("{}, score {}", result.stage, score)
            }
            (Stage::FolderContent, Some(count)) => format!("{}, {} files", result.stage, count),
            (stage, _) => stage.to_string(),
        };
        format!(
            "  {} {} → {} {}",
            item.kind.icon(),
            item.name,
            result.category.green(),
            format!("({})", how).dimmed()
        )
    }

    /// Creates a progress bar for moving items.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use desktop_organizer::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(12);
    /// pb.inc(1);
    /// pb.finish_with_message("done");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Prints item counts per category with a total row.
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_items: usize) {
        Self::header("SUMMARY");

        let width = category_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Items".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                item_word(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_items.to_string().green().bold(),
            item_word(total_items),
            width = width
        );
    }
}

fn item_word(count: usize) -> &'static str {
    if count == 1 { "item" } else { "items" }
}

/// Human-readable byte count, e.g. `1.5 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
