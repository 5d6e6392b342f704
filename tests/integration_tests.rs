//! Integration tests for desktop-organizer
//!
//! These tests build a throwaway desktop in a temporary directory and drive
//! the same entry points the command line uses.
//!
//! Test categories:
//! 1. Classification pipeline
//! 2. Organizing and dry runs
//! 3. Folders and the staging area
//! 4. Configuration and filtering
//! 5. Backup and undo
//! 6. Cleanup and consolidation
use desktop_organizer::cli::{
    CliError, RunOptions, cleanup_desktop, consolidate_folders, list_desktop, organize_desktop,
};
use desktop_organizer::file_organizer::HISTORY_FILE;
use desktop_organizer::mime::UnknownMime;
use desktop_organizer::{
    CategoryRule, Classifier, DesktopItem, OrganizerConfig, RuleTable, RunSummary, Stage,
    UndoManager,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary desktop plus a sibling folder for backups.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("Desktop")).expect("Failed to create desktop");
        TestFixture { temp_dir }
    }

    /// The desktop root.
    fn path(&self) -> PathBuf {
        self.temp_dir.path().join("Desktop")
    }

    fn backup_root(&self) -> PathBuf {
        self.temp_dir.path().join("backups")
    }

    /// Create a file, and any missing parent folders, on the desktop.
    fn create_file(&self, rel_path: &str, content: &[u8]) {
        let file_path = self.path().join(rel_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent folders");
        }
        let mut file = File::create(&file_path).expect("Failed to create file");
        file.write_all(content)
            .expect("Failed to write file content");
    }

    fn create_text_file(&self, rel_path: &str, content: &str) {
        self.create_file(rel_path, content.as_bytes());
    }

    fn create_files(&self, files: &[&str]) {
        for name in files {
            self.create_text_file(name, name);
        }
    }

    fn create_subdir(&self, rel_path: &str) {
        fs::create_dir_all(self.path().join(rel_path)).expect("Failed to create subdirectory");
    }

    fn assert_dir_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_dir(), "Directory should exist: {}", path.display());
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "Path should not exist: {}", path.display());
    }

    /// Writes a configuration file next to the desktop and loads it.
    fn config(&self, file_name: &str, content: &str) -> OrganizerConfig {
        let path = self.temp_dir.path().join(file_name);
        fs::write(&path, content).expect("Failed to write config");
        OrganizerConfig::load_from_file(&path).expect("Config should load")
    }

    fn options(&self, dry_run: bool) -> RunOptions {
        RunOptions {
            desktop: self.path(),
            dry_run,
            backup: false,
            confirm: false,
            backup_root: self.backup_root(),
        }
    }

    fn organize_with(&self, options: &RunOptions, config: &OrganizerConfig) -> Option<RunSummary> {
        organize_desktop(options, config, &mut &b"y\n"[..]).expect("Organize should succeed")
    }

    fn organize(&self) -> RunSummary {
        self.organize_with(&self.options(false), &OrganizerConfig::default())
            .expect("Something should have been organized")
    }
}

/// PNG file header (minimal, just enough to be detected as PNG)
const PNG_HEADER: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 image
    0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, // bit depth, color
    0xDE,
];

/// PDF file header (minimal)
const PDF_HEADER: &[u8] = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n";

const GAMES_CONFIG: &str = r#"
{
  "categories": {
    "Documents": { "extensions": [".pdf"] },
    "Games": { "keywords": ["game", "steam"] }
  }
}
"#;

// ============================================================================
// Test Suite 1: Classification Pipeline
// ============================================================================

#[test]
fn test_end_to_end_classification() {
    let fixture = TestFixture::new();
    fixture.create_file("report.pdf", PDF_HEADER);
    fixture.create_text_file("game_launcher.exe", "MZ");
    fixture.create_text_file("mystery.xyz", "???");

    let rules = RuleTable::new(vec![
        CategoryRule::new("Documents", [".pdf"], Vec::<&str>::new()),
        CategoryRule::new("Games", Vec::<&str>::new(), ["game"]),
    ])
    .expect("Rule names are unique");
    let classifier = Classifier::new(rules).with_mime_guesser(UnknownMime);

    let items: Vec<DesktopItem> = ["report.pdf", "game_launcher.exe", "mystery.xyz"]
        .iter()
        .map(|name| DesktopItem::from_path(&fixture.path().join(name)).unwrap())
        .collect();
    let results = classifier.classify_all(&items);

    let report = &results[&fixture.path().join("report.pdf")];
    assert_eq!(
        (report.category.as_str(), report.stage),
        ("Documents", Stage::Extension)
    );
    let game = &results[&fixture.path().join("game_launcher.exe")];
    assert_eq!((game.category.as_str(), game.stage), ("Games", Stage::Keyword));
    assert_eq!(game.score, Some(1));
    let mystery = &results[&fixture.path().join("mystery.xyz")];
    assert_eq!(
        (mystery.category.as_str(), mystery.stage),
        ("Other", Stage::Default)
    );
}

#[test]
fn test_shortcut_classified_by_target() {
    let fixture = TestFixture::new();
    fixture.create_text_file(
        "Play.url",
        "[InternetShortcut]\nURL=steam://rungameid/440\n",
    );
    let config = fixture.config("config.json", GAMES_CONFIG);

    let summary = fixture
        .organize_with(&fixture.options(false), &config)
        .expect("Shortcut should be organized");

    assert_eq!(summary.per_category.get("Games"), Some(&1));
    fixture.assert_file_exists("Games/Play.url");
}

#[test]
fn test_keyword_match_without_known_extension() {
    let fixture = TestFixture::new();
    fixture.create_text_file("holiday_photo.heic", "heic");

    fixture.organize();

    fixture.assert_file_exists("Images/holiday_photo.heic");
}

// ============================================================================
// Test Suite 2: Organizing and Dry Runs
// ============================================================================

#[test]
fn test_organize_moves_into_category_folders() {
    let fixture = TestFixture::new();
    fixture.create_file("report.pdf", PDF_HEADER);
    fixture.create_file("photo.png", PNG_HEADER);
    fixture.create_files(&["song.mp3", "budget.xlsx", "unknown.xyz"]);

    let summary = fixture.organize();

    assert_eq!(summary.moved, 5);
    assert_eq!(summary.failed, 0);
    fixture.assert_file_exists("Documents/report.pdf");
    fixture.assert_file_exists("Images/photo.png");
    fixture.assert_file_exists("Audio/song.mp3");
    fixture.assert_file_exists("Spreadsheets/budget.xlsx");
    fixture.assert_file_exists("Other/unknown.xyz");
    fixture.assert_not_exists("report.pdf");
    fixture.assert_file_exists(HISTORY_FILE);
}

#[test]
fn test_organize_preserves_file_content() {
    let fixture = TestFixture::new();
    fixture.create_text_file("notes.txt", "remember the milk");

    fixture.organize();

    let content = fs::read_to_string(fixture.path().join("Documents/notes.txt")).unwrap();
    assert_eq!(content, "remember the milk");
}

#[test]
fn test_dry_run_doesnt_move_files() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf", "song.mp3"]);

    let summary = fixture
        .organize_with(&fixture.options(true), &OrganizerConfig::default())
        .expect("Dry run should report planned moves");

    assert!(summary.dry_run);
    assert_eq!(summary.moved, 2);
    fixture.assert_file_exists("report.pdf");
    fixture.assert_file_exists("song.mp3");
    fixture.assert_not_exists("Documents");
    fixture.assert_not_exists(HISTORY_FILE);
}

#[test]
fn test_declined_confirmation_moves_nothing() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf"]);
    let options = RunOptions {
        confirm: true,
        ..fixture.options(false)
    };

    let result = organize_desktop(&options, &OrganizerConfig::default(), &mut &b"n\n"[..])
        .expect("Declining is not an error");

    assert!(result.is_none());
    fixture.assert_file_exists("report.pdf");
}

#[test]
fn test_confirmation_accepts_yes() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf"]);
    let options = RunOptions {
        confirm: true,
        ..fixture.options(false)
    };

    let result = organize_desktop(&options, &OrganizerConfig::default(), &mut &b"YES\n"[..])
        .expect("Organize should succeed");

    assert_eq!(result.map(|s| s.moved), Some(1));
    fixture.assert_file_exists("Documents/report.pdf");
}

#[test]
fn test_list_does_not_mutate() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf", "clip.mp4"]);

    let plan = list_desktop(&fixture.options(false), &OrganizerConfig::default()).unwrap();

    let categories: Vec<_> = plan.iter().map(|p| p.result.category.as_str()).collect();
    assert_eq!(categories, vec!["Videos", "Documents"]);
    fixture.assert_file_exists("report.pdf");
    fixture.assert_file_exists("clip.mp4");
}

#[test]
fn test_organize_empty_desktop() {
    let fixture = TestFixture::new();
    let result = fixture.organize_with(&fixture.options(false), &OrganizerConfig::default());
    assert!(result.is_none());
    fixture.assert_not_exists(HISTORY_FILE);
}

#[test]
fn test_missing_desktop_is_error() {
    let fixture = TestFixture::new();
    let options = RunOptions {
        desktop: fixture.path().join("nope"),
        ..fixture.options(false)
    };
    let result = organize_desktop(&options, &OrganizerConfig::default(), &mut &b""[..]);
    assert!(matches!(result, Err(CliError::DesktopMissing(_))));
}

#[test]
fn test_conflicting_name_is_renamed() {
    let fixture = TestFixture::new();
    fixture.create_text_file("Documents/notes.txt", "old");
    fixture.create_text_file("notes.txt", "new");

    fixture.organize();

    assert_eq!(
        fs::read_to_string(fixture.path().join("Documents/notes.txt")).unwrap(),
        "old"
    );
    assert_eq!(
        fs::read_to_string(fixture.path().join("Documents/notes_1.txt")).unwrap(),
        "new"
    );
}

#[test]
fn test_organize_idempotent() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf", "song.mp3"]);

    fixture.organize();
    let second = fixture.organize_with(&fixture.options(false), &OrganizerConfig::default());

    assert!(second.is_none(), "Category folders are never reorganized");
    fixture.assert_file_exists("Documents/report.pdf");
    fixture.assert_file_exists("Audio/song.mp3");
}

// ============================================================================
// Test Suite 3: Folders and the Staging Area
// ============================================================================

#[test]
fn test_folder_with_clear_majority_is_moved() {
    let fixture = TestFixture::new();
    fixture.create_files(&[
        "Trip/a.jpg",
        "Trip/b.jpg",
        "Trip/c.jpg",
        "Trip/d.jpg",
        "Trip/itinerary.txt",
    ]);

    fixture.organize();

    fixture.assert_file_exists("Images/Trip/a.jpg");
    fixture.assert_file_exists("Images/Trip/itinerary.txt");
}

#[test]
fn test_folder_at_exactly_sixty_percent_goes_to_staging() {
    let fixture = TestFixture::new();
    fixture.create_files(&[
        "Mixed/a.png",
        "Mixed/b.png",
        "Mixed/c.png",
        "Mixed/d.txt",
        "Mixed/e.txt",
    ]);

    fixture.organize();

    fixture.assert_dir_exists("Folders/Mixed");
    fixture.assert_not_exists("Images/Mixed");
}

#[test]
fn test_staged_folders_are_reclassified() {
    let fixture = TestFixture::new();
    fixture.create_files(&["Folders/Tunes/a.mp3", "Folders/Tunes/b.flac"]);
    fixture.create_files(&["Folders/Random/a.mp3", "Folders/Random/b.txt"]);
    fixture.create_subdir("Folders/Empty/inner");

    fixture.organize();

    fixture.assert_file_exists("Audio/Tunes/a.mp3");
    fixture.assert_dir_exists("Folders/Random");
    fixture.assert_not_exists("Folders/Random_1");
    fixture.assert_not_exists("Folders/Empty");
}

// ============================================================================
// Test Suite 4: Configuration and Filtering
// ============================================================================

#[test]
fn test_custom_categories_from_toml() {
    let fixture = TestFixture::new();
    fixture.create_text_file("game_launcher.exe", "MZ");
    fixture.create_files(&["report.pdf"]);
    let config = fixture.config(
        "config.toml",
        r#"
dry_run = false

[categories.Documents]
extensions = [".pdf"]

[categories.Games]
keywords = ["game"]
"#,
    );

    assert!(!config.dry_run);
    let names: Vec<_> = config.categories.category_names().collect();
    assert_eq!(names, vec!["Documents", "Games"]);

    fixture.organize_with(&fixture.options(false), &config);

    fixture.assert_file_exists("Games/game_launcher.exe");
    fixture.assert_file_exists("Documents/report.pdf");
    fixture.assert_not_exists("Applications");
}

#[test]
fn test_ignore_rules_from_config() {
    let fixture = TestFixture::new();
    fixture.create_files(&["keep.pdf", "scratch.tmp", "draft_letter.txt", "report.pdf"]);
    let config = fixture.config(
        "config.json",
        r#"{
            "ignore_files": ["keep.pdf"],
            "ignore_patterns": ["*.tmp"],
            "ignore_regex": ["^draft_"]
        }"#,
    );

    let summary = fixture.organize_with(&fixture.options(false), &config).unwrap();

    assert_eq!(summary.moved, 1);
    fixture.assert_file_exists("keep.pdf");
    fixture.assert_file_exists("scratch.tmp");
    fixture.assert_file_exists("draft_letter.txt");
    fixture.assert_file_exists("Documents/report.pdf");
}

#[test]
fn test_hidden_files_excluded_by_default() {
    let fixture = TestFixture::new();
    fixture.create_files(&[".secret.pdf", "visible.pdf"]);

    fixture.organize();

    fixture.assert_file_exists(".secret.pdf");
    fixture.assert_file_exists("Documents/visible.pdf");
}

#[test]
fn test_invalid_config_is_rejected() {
    let fixture = TestFixture::new();
    let path = fixture.temp_dir.path().join("broken.json");
    fs::write(&path, "{ \"categories\": [").unwrap();
    assert!(OrganizerConfig::load_from_file(&path).is_err());

    let missing = OrganizerConfig::load(Some(Path::new("/non/existent/config.json")));
    assert!(missing.is_err());
}

// ============================================================================
// Test Suite 5: Backup and Undo
// ============================================================================

#[test]
fn test_backup_created_before_moving() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf", "Trip/a.jpg"]);
    let options = RunOptions {
        backup: true,
        ..fixture.options(false)
    };

    fixture.organize_with(&options, &OrganizerConfig::default());

    let backups: Vec<_> = fs::read_dir(fixture.backup_root())
        .expect("Backup folder should exist")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].join("report.pdf").is_file());
    assert!(backups[0].join("Trip").join("a.jpg").is_file());
}

#[test]
fn test_full_workflow_organize_undo() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf", "song.mp3", "Folders/Tunes/a.mp3"]);

    fixture.organize();
    fixture.assert_file_exists("Audio/Tunes/a.mp3");

    let report = UndoManager::undo(&fixture.path()).expect("Undo should succeed");

    assert_eq!(report.restored_files, 3);
    assert!(report.is_complete_success());
    fixture.assert_file_exists("report.pdf");
    fixture.assert_file_exists("song.mp3");
    fixture.assert_file_exists("Folders/Tunes/a.mp3");
    fixture.assert_not_exists(HISTORY_FILE);
}

#[test]
fn test_undo_without_history() {
    let fixture = TestFixture::new();
    assert!(UndoManager::undo(&fixture.path()).is_err());
}

// ============================================================================
// Test Suite 6: Cleanup and Consolidation
// ============================================================================

#[test]
fn test_cleanup_from_config() {
    let fixture = TestFixture::new();
    fixture.create_files(&["Copy of notes.txt", "Steam.lnk", "Steam.url", "notes.txt"]);
    fixture.create_subdir("Folders/empty/nested");
    let config = fixture.config(
        "config.json",
        r#"{
            "cleanup": {
                "duplicates": ["Copy of notes.txt", "../outside.txt"],
                "shortcuts": ["Steam"]
            }
        }"#,
    );

    let report = cleanup_desktop(&fixture.options(false), &config).unwrap();

    assert_eq!(report.removed.len(), 5);
    assert_eq!(report.failures.len(), 1);
    fixture.assert_not_exists("Copy of notes.txt");
    fixture.assert_not_exists("Steam.lnk");
    fixture.assert_not_exists("Steam.url");
    fixture.assert_not_exists("Folders/empty");
    fixture.assert_dir_exists("Folders");
    fixture.assert_file_exists("notes.txt");
}

#[test]
fn test_cleanup_dry_run_keeps_everything() {
    let fixture = TestFixture::new();
    fixture.create_files(&["Copy of notes.txt"]);
    let config = fixture.config(
        "config.json",
        r#"{ "cleanup": { "duplicates": ["Copy of notes.txt"] } }"#,
    );

    let report = cleanup_desktop(&fixture.options(true), &config).unwrap();

    assert_eq!(report.removed.len(), 1);
    fixture.assert_file_exists("Copy of notes.txt");
}

#[test]
fn test_consolidate_folders() {
    let fixture = TestFixture::new();
    fixture.create_text_file("Games/doom.exe", "1");
    fixture.create_text_file("Games 2/doom.exe", "2");
    fixture.create_text_file("Old Games/quake.exe", "3");

    let sources = vec!["Games 2".to_string(), "Old Games".to_string()];
    let report = consolidate_folders(&fixture.options(false), &sources, "Games").unwrap();

    assert_eq!(report.moved.len(), 2);
    fixture.assert_file_exists("Games/doom.exe");
    fixture.assert_file_exists("Games/doom_1.exe");
    fixture.assert_file_exists("Games/quake.exe");
    fixture.assert_not_exists("Games 2");
    fixture.assert_not_exists("Old Games");
}

#[test]
fn test_consolidate_refuses_paths_outside_desktop() {
    let fixture = TestFixture::new();
    let sources = vec!["Games".to_string()];
    let result = consolidate_folders(&fixture.options(false), &sources, "../Games");
    assert!(matches!(result, Err(CliError::Cleanup(_))));
}
