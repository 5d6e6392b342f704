//! Command-line interface for desktop-organizer.
//!
//! This module handles:
//! - Argument parsing
//! - Resolving the desktop root and run options
//! - Orchestrating scan, classification, backup and moves
//! - The undo, cleanup and consolidate commands

use crate::backup::{BackupError, create_backup};
use crate::classifier::{ClassificationResult, Classifier};
use crate::cleanup::{self, CleanupError, CleanupReport};
use crate::config::{ConfigError, OrganizerConfig};
use crate::file_organizer::{FileOrganizer, OperationLog, OrganizeError, RunSummary};
use crate::item::{DesktopItem, scan_desktop, scan_staging};
use crate::output::{OutputFormatter, format_bytes};
use crate::rules::FOLDERS;
use crate::undo::UndoManager;
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "desktop-organizer")]
#[command(about = "Sort desktop files and folders into category folders")]
#[command(version)]
pub struct Cli {
    /// Configuration file (JSON or TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Desktop folder to organize (default: the user's desktop)
    #[arg(long, global = true)]
    pub desktop: Option<PathBuf>,

    /// Only show what would happen
    #[arg(long, global = true, conflicts_with = "apply")]
    pub dry_run: bool,

    /// Really move files, overriding a dry-run default in the configuration
    #[arg(long, global = true)]
    pub apply: bool,

    /// Skip the backup copy before moving
    #[arg(long, global = true)]
    pub no_backup: bool,

    /// Do not ask before moving
    #[arg(long, global = true)]
    pub no_confirm: bool,

    /// Verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Quiet output (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Classify desktop items and move them into category folders (default)
    Organize,

    /// Show how every item would be classified, without moving anything
    List,

    /// Move everything from the last run back where it was
    Undo,

    /// Remove configured duplicates, duplicate shortcuts and empty folders
    Cleanup,

    /// Merge several desktop folders into one
    Consolidate {
        /// Folder to merge into, relative to the desktop
        #[arg(long)]
        into: String,

        /// Folders to empty into the target, relative to the desktop
        #[arg(required = true)]
        sources: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Organize(#[from] OrganizeError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    #[error("Could not determine the desktop folder; pass --desktop")]
    NoDesktop,

    #[error("Desktop folder {} does not exist", .0.display())]
    DesktopMissing(PathBuf),

    #[error("Failed to read confirmation: {0}")]
    Prompt(#[source] io::Error),
}

/// Settings for one invocation, merged from flags and configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub desktop: PathBuf,
    pub dry_run: bool,
    pub backup: bool,
    pub confirm: bool,
    pub backup_root: PathBuf,
}

impl RunOptions {
    /// Flags win over configuration; `--apply` and `--dry-run` override the
    /// configured `dry_run`.
    pub fn resolve(cli: &Cli, config: &OrganizerConfig) -> Result<Self, CliError> {
        let desktop = cli
            .desktop
            .clone()
            .or_else(default_desktop)
            .ok_or(CliError::NoDesktop)?;
        let dry_run = if cli.apply {
            false
        } else {
            cli.dry_run || config.dry_run
        };
        let backup_root =
            std::path::absolute(&config.backup_dir).unwrap_or_else(|_| config.backup_dir.clone());

        Ok(Self {
            desktop,
            dry_run,
            backup: config.create_backup && !cli.no_backup,
            confirm: config.ask_confirmation && !cli.no_confirm,
            backup_root,
        })
    }

    fn staging(&self, config: &OrganizerConfig) -> PathBuf {
        self.desktop.join(&config.staging_folder)
    }
}

/// The user's desktop, falling back to `$HOME/Desktop`.
pub fn default_desktop() -> Option<PathBuf> {
    dirs::desktop_dir().or_else(|| dirs::home_dir().map(|home| home.join("Desktop")))
}

/// One item and where it is headed.
#[derive(Debug, Clone)]
pub struct PlannedMove {
    pub item: DesktopItem,
    pub result: ClassificationResult,
}

/// Runs the command selected on the command line.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use desktop_organizer::cli::{Cli, run};
///
/// let cli = Cli::parse_from(["desktop-organizer", "--dry-run", "list"]);
/// if let Err(e) = run(&cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run(cli: &Cli) -> Result<(), CliError> {
    let config = OrganizerConfig::load(cli.config.as_deref())?;
    let options = RunOptions::resolve(cli, &config)?;

    match cli.command.clone().unwrap_or(Command::Organize) {
        Command::Organize => {
            let stdin = io::stdin();
            organize_desktop(&options, &config, &mut stdin.lock())?;
        }
        Command::List => {
            list_desktop(&options, &config)?;
        }
        Command::Undo => undo_last_run(&options)?,
        Command::Cleanup => {
            cleanup_desktop(&options, &config)?;
        }
        Command::Consolidate { into, sources } => {
            consolidate_folders(&options, &sources, &into)?;
        }
    }
    Ok(())
}

/// Scans the desktop and staging folder and classifies everything found.
///
/// Staged items that land on the default folder label are left out, since
/// they are already where that label would put them.
pub fn plan_moves(
    options: &RunOptions,
    config: &OrganizerConfig,
) -> Result<Vec<PlannedMove>, CliError> {
    if !options.desktop.is_dir() {
        return Err(CliError::DesktopMissing(options.desktop.clone()));
    }

    let filters = config.compile_filters()?;
    let mut reserved = config.reserved_folder_names();
    if let Some(name) = top_level_name(&options.desktop, &options.backup_root) {
        reserved.push(name);
    }

    let classifier = Classifier::new(config.categories.clone());
    let staging = options.staging(config);

    let mut plan: Vec<PlannedMove> = scan_desktop(&options.desktop, &filters, &reserved)?
        .into_iter()
        .map(|item| {
            let result = classifier.classify(&item);
            PlannedMove { item, result }
        })
        .collect();

    for item in scan_staging(&staging, &filters)? {
        let result = classifier.classify(&item);
        if result.category == FOLDERS || result.category == config.staging_folder {
            continue;
        }
        plan.push(PlannedMove { item, result });
    }

    Ok(plan)
}

/// Name of the desktop entry that contains `path`, if `path` is inside it.
fn top_level_name(desktop: &Path, path: &Path) -> Option<String> {
    match path.strip_prefix(desktop).ok()?.components().next()? {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    }
}

/// Prints the classification of every item without touching anything.
pub fn list_desktop(
    options: &RunOptions,
    config: &OrganizerConfig,
) -> Result<Vec<PlannedMove>, CliError> {
    OutputFormatter::info(&format!("Scanning {}", options.desktop.display()));
    let plan = plan_moves(options, config)?;

    if plan.is_empty() {
        OutputFormatter::success("Nothing to organize.");
        return Ok(plan);
    }

    OutputFormatter::header("CLASSIFICATION");
    for planned in &plan {
        OutputFormatter::classification(&planned.item, &planned.result);
    }
    Ok(plan)
}

/// Organizes the desktop: scan, classify, confirm, back up, move.
///
/// Confirmation is read from `input`. Returns `None` when there was
/// nothing to do or the user declined.
pub fn organize_desktop<R: BufRead>(
    options: &RunOptions,
    config: &OrganizerConfig,
    input: &mut R,
) -> Result<Option<RunSummary>, CliError> {
    let plan = list_desktop(options, config)?;
    if plan.is_empty() {
        return Ok(None);
    }

    if options.dry_run {
        OutputFormatter::dry_run_notice("No files will be moved.");
    } else if options.confirm && !confirm(plan.len(), input)? {
        OutputFormatter::warning("Cancelled. Nothing was moved.");
        return Ok(None);
    }

    if options.backup && !options.dry_run {
        let items: Vec<DesktopItem> = plan.iter().map(|p| p.item.clone()).collect();
        let report = create_backup(&items, &options.backup_root)?;
        OutputFormatter::success(&format!(
            "Backup created: {} ({})",
            report.path.display(),
            format_bytes(report.bytes)
        ));
        for (path, reason) in &report.failed {
            OutputFormatter::warning(&format!("Not backed up: {}: {}", path.display(), reason));
        }
    }

    let summary = move_planned(options, &plan);

    if !options.dry_run {
        let staging = options.staging(config);
        if config.cleanup.remove_empty_dirs && staging.is_dir() {
            let report = cleanup::remove_empty_dirs(&staging, false)?;
            if !report.removed.is_empty() {
                info!(count = report.removed.len(), "pruned empty staging folders");
            }
        }
    }

    OutputFormatter::summary_table(&summary.per_category, summary.moved);
    if summary.dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "{} items ({}) would be moved. Run with --apply to move them.",
            summary.moved,
            format_bytes(summary.bytes_moved)
        ));
    } else {
        OutputFormatter::success(&format!(
            "Moved {} items ({}).",
            summary.moved,
            format_bytes(summary.bytes_moved)
        ));
    }
    if summary.failed > 0 {
        OutputFormatter::warning(&format!(
            "{} items could not be moved. Please review errors above.",
            summary.failed
        ));
    }

    Ok(Some(summary))
}

fn confirm<R: BufRead>(count: usize, input: &mut R) -> Result<bool, CliError> {
    print!("\nMove {} items? [y/N] ", count);
    io::stdout().flush().map_err(CliError::Prompt)?;

    let mut answer = String::new();
    input.read_line(&mut answer).map_err(CliError::Prompt)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn move_planned(options: &RunOptions, plan: &[PlannedMove]) -> RunSummary {
    let mut summary = RunSummary::new(options.dry_run);
    let mut log = OperationLog::new(options.desktop.clone());
    let pb = OutputFormatter::create_progress_bar(plan.len() as u64);
    let mut claimed = HashSet::new();

    for planned in plan {
        pb.set_message(planned.item.name.clone());
        match FileOrganizer::move_item_claiming(
            &options.desktop,
            &planned.item.path,
            &planned.result.category,
            options.dry_run,
            &mut claimed,
        ) {
            Ok(outcome) => {
                summary.record(&outcome);
                if !outcome.dry_run {
                    log.add_operation(outcome.operation);
                }
            }
            Err(e) => {
                error!(item = %planned.item.name, error = %e, "move failed");
                pb.suspend(|| OutputFormatter::error(&e.to_string()));
                summary.record_failure();
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if !log.is_empty() {
        match log.save(&options.desktop) {
            Ok(()) => OutputFormatter::info("History saved. Use 'desktop-organizer undo' to revert."),
            Err(e) => {
                warn!(error = %e, "could not save history");
                OutputFormatter::warning(&format!("Could not save history: {}", e));
                if summary.failed > 0 {
                    OutputFormatter::warning(
                        "Undo may not be available. Please verify items were organized correctly.",
                    );
                }
            }
        }
    }

    summary
}

fn undo_last_run(options: &RunOptions) -> Result<(), CliError> {
    OutputFormatter::info("Undoing previous organization...");
    let report = UndoManager::undo(&options.desktop)?;

    OutputFormatter::success(&format!("Restored: {}", report.restored_files));
    if !report.skipped_files.is_empty() {
        OutputFormatter::warning(&format!("Skipped: {}", report.skipped_files.len()));
        for (path, reason) in &report.skipped_files {
            OutputFormatter::plain(&format!("    - {}: {}", path.display(), reason));
        }
    }
    if !report.failed_restores.is_empty() {
        for (path, reason) in &report.failed_restores {
            OutputFormatter::error(&format!("{}: {}", path.display(), reason));
        }
        OutputFormatter::warning("History file was NOT deleted due to failures.");
    }
    Ok(())
}

/// Runs the configured cleanup steps and returns their combined report.
pub fn cleanup_desktop(
    options: &RunOptions,
    config: &OrganizerConfig,
) -> Result<CleanupReport, CliError> {
    let desktop = &options.desktop;
    let dry_run = options.dry_run;
    let mut total = CleanupReport {
        dry_run,
        ..Default::default()
    };

    let steps = [
        (
            "Duplicates",
            cleanup::remove_duplicates(desktop, &config.cleanup.duplicates, dry_run)?,
        ),
        (
            "Duplicate shortcuts",
            cleanup::remove_duplicate_shortcuts(desktop, &config.cleanup.shortcuts, dry_run)?,
        ),
    ];
    for (label, report) in steps {
        print_cleanup(label, &report);
        merge_report(&mut total, report);
    }

    let staging = options.staging(config);
    if config.cleanup.remove_empty_dirs && staging.is_dir() {
        let report = cleanup::remove_empty_dirs(&staging, dry_run)?;
        print_cleanup("Empty folders", &report);
        merge_report(&mut total, report);
    }

    OutputFormatter::success(&format!(
        "Cleanup finished: {} removed, {} freed.",
        total.removed.len(),
        format_bytes(total.bytes_freed)
    ));
    Ok(total)
}

/// Merges `sources` into `into`, both relative to the desktop.
pub fn consolidate_folders(
    options: &RunOptions,
    sources: &[String],
    into: &str,
) -> Result<CleanupReport, CliError> {
    let report = cleanup::consolidate(&options.desktop, sources, into, options.dry_run)?;
    print_cleanup("Consolidate", &report);
    for (from, to) in &report.moved {
        OutputFormatter::plain(&format!("  {} → {}", from.display(), to.display()));
    }
    Ok(report)
}

fn print_cleanup(label: &str, report: &CleanupReport) {
    OutputFormatter::header(label);
    if report.is_empty() {
        OutputFormatter::plain("  nothing to do");
        return;
    }
    for path in &report.removed {
        if report.dry_run {
            OutputFormatter::dry_run_notice(&format!("Would remove {}", path.display()));
        } else {
            OutputFormatter::success(&format!("Removed {}", path.display()));
        }
    }
    for (path, reason) in &report.failures {
        OutputFormatter::error(&format!("{}: {}", path.display(), reason));
    }
}

fn merge_report(total: &mut CleanupReport, report: CleanupReport) {
    total.removed.extend(report.removed);
    total.moved.extend(report.moved);
    total.failures.extend(report.failures);
    total.bytes_freed += report.bytes_freed;
}
