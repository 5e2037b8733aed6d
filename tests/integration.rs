use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, std::path::PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("nested")).unwrap();
    fs::write(
        files_dir.join("notes.txt"),
        "invoice 2024\n\nPayment due in thirty days.",
    )
    .unwrap();
    fs::write(
        files_dir.join("recipes.md"),
        "# Recipes\n\nPancakes need flour, eggs, and milk.",
    )
    .unwrap();
    fs::write(
        files_dir.join("nested").join("travel.txt"),
        "Train tickets to Lisbon, booked for spring.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/omnizient.sqlite"

[crawler]
root = "{root}/files"
include_globs = ["**/*.md", "**/*.txt"]
workers = 2

[embedding]
provider = "hash"
dims = 1024

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("omnizient.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cli(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_omnizient"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .expect("failed to run omnizient binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cli(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_cli(&config_path, &["init"]);
    assert!(success, "second init failed");
}

#[test]
fn test_crawl_indexes_every_file() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cli(&config_path, &["crawl"]);
    assert!(success, "crawl failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("discovered: 3"), "got: {}", stdout);
    assert!(stdout.contains("indexed: 3"), "got: {}", stdout);
    assert!(stdout.contains("embeddings written: 3"), "got: {}", stdout);
    assert!(stdout.trim_end().ends_with("ok"));
}

#[test]
fn test_recrawl_reuses_unchanged_files() {
    let (_tmp, config_path) = setup_test_env();

    run_cli(&config_path, &["crawl"]);
    let (stdout, _, success) = run_cli(&config_path, &["crawl"]);
    assert!(success);
    assert!(stdout.contains("indexed: 0"), "got: {}", stdout);
    assert!(stdout.contains("unchanged: 3"), "got: {}", stdout);
}

#[test]
fn test_search_by_content() {
    let (_tmp, config_path) = setup_test_env();

    run_cli(&config_path, &["crawl"]);
    let (stdout, stderr, success) = run_cli(&config_path, &["search", "invoice"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("notes.txt"), "got: {}", stdout);
    assert!(stdout.contains("matches:  content"), "got: {}", stdout);
    assert!(!stdout.contains("recipes.md"));
}

#[test]
fn test_search_by_name_with_extension_filter() {
    let (_tmp, config_path) = setup_test_env();

    run_cli(&config_path, &["crawl"]);
    let (stdout, _, success) = run_cli(&config_path, &["search", "RECIPES", "--ext", "md"]);
    assert!(success);
    assert!(stdout.contains("recipes.md"), "got: {}", stdout);

    let (stdout, _, success) = run_cli(&config_path, &["search", "recipes", "--ext", "pdf"]);
    assert!(success);
    assert!(stdout.contains("No results."), "got: {}", stdout);
}

#[test]
fn test_search_no_match_is_not_an_error() {
    let (_tmp, config_path) = setup_test_env();

    run_cli(&config_path, &["crawl"]);
    let (stdout, _, success) = run_cli(&config_path, &["search", "zzqqxx"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_sweep_removes_deleted_file() {
    let (tmp, config_path) = setup_test_env();

    run_cli(&config_path, &["crawl"]);
    fs::remove_file(tmp.path().join("files/nested/travel.txt")).unwrap();

    let (stdout, stderr, success) = run_cli(&config_path, &["sweep"]);
    assert!(success, "sweep failed: {}", stderr);
    assert!(stdout.contains("checked: 3"), "got: {}", stdout);
    assert!(stdout.contains("removed: 1"), "got: {}", stdout);

    let (stdout, _, _) = run_cli(&config_path, &["search", "Lisbon"]);
    assert!(stdout.contains("No results."), "got: {}", stdout);
}

#[test]
fn test_extensions_and_stats() {
    let (_tmp, config_path) = setup_test_env();

    run_cli(&config_path, &["crawl"]);
    let (stdout, _, success) = run_cli(&config_path, &["extensions"]);
    assert!(success);
    let exts: Vec<&str> = stdout.lines().collect();
    assert_eq!(exts, vec!["md", "txt"]);

    let (stdout, _, success) = run_cli(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Documents:  3"), "got: {}", stdout);
    assert!(stdout.contains("Entries:    3"), "got: {}", stdout);
}

#[test]
fn test_get_unknown_document_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_cli(&config_path, &["init"]);
    let (_, stderr, success) = run_cli(&config_path, &["get", "does-not-exist"]);
    assert!(!success);
    assert!(stderr.contains("Document not found"), "got: {}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_cli(&tmp.path().join("absent.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "got: {}", stderr);
}
