use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[repository]
base_url = "http://127.0.0.1:1/rest"
timeout_secs = 2

[logging]
filter = "warn"

[backends.sqlite.local]
path = "{}/data/index.sqlite"
"#,
        root.display()
    );

    let config_path = config_dir.join("indexer.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rix(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_rix"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .expect("failed to run rix");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_index() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_rix(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Initialized sqlite:local"));
    assert!(tmp.path().join("data/index.sqlite").exists());

    // Idempotent
    let (_, _, ok) = run_rix(&config, &["init"]);
    assert!(ok);
}

#[test]
fn test_backends_lists_configured_instances() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_rix(&config, &["backends"]);
    assert!(ok, "backends failed: {}", stderr);
    assert!(stdout.contains("sqlite:local"));
    assert!(stdout.contains("named_fields"));
}

#[test]
fn test_handle_removal_needs_no_repository() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_rix(&config, &["handle", "/obj1", "--remove"]);
    assert!(ok, "handle failed: {}", stderr);
    assert!(stdout.contains("remove /obj1"));
    assert!(stdout.contains("succeeded"));
}

#[test]
fn test_handle_update_with_unreachable_repository_skips() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, ok) = run_rix(&config, &["handle", "/obj1"]);
    // Skipped backends are not failures
    assert!(ok);
    assert!(stdout.contains("skipped"));
}

#[test]
fn test_event_code_is_classified() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, ok) = run_rix(
        &config,
        &[
            "handle",
            "/obj1",
            "--event",
            "http://fedora.info/definitions/v4/repository#NODE_REMOVED",
        ],
    );
    assert!(ok);
    assert!(stdout.contains("remove /obj1"));
}

#[test]
fn test_search_empty_index() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_rix(&config, &["search", "microwave"]);
    assert!(ok, "search failed: {}", stderr);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, ok) = run_rix(&tmp.path().join("nope.toml"), &["backends"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}
