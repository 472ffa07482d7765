//! End-to-end tests driving the atk binary against a throwaway ATK Home
//!
//! These tests verify the full workflow:
//! - Initializing a home
//! - Adding a local plugin (twice)
//! - Listing and lifecycle commands
//! - Removing plugins, including unknown ones

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const EXIT_HOME_NOT_INITIALIZED: i32 = 3;
const EXIT_PLUGIN_NOT_FOUND: i32 = 4;

fn git_available() -> bool {
    which::which("git").is_ok()
}

fn tests_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests")
}

/// Run atk with ATK_HOME and the log directory inside `temp`
fn run_atk(temp: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_atk"))
        .current_dir(tests_dir())
        .env("ATK_HOME", temp.join("home"))
        .env("XDG_DATA_HOME", temp.join("data"))
        .env("XDG_CONFIG_HOME", temp.join("config"))
        .env_remove("ATK_CONFIG")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to execute atk")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "atk failed:\nstdout: {}\nstderr: {}",
        stdout(output),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn init_home() -> Option<TempDir> {
    if !git_available() {
        eprintln!("git not available, skipping");
        return None;
    }
    let temp = TempDir::new().unwrap();
    assert_success(&run_atk(temp.path(), &["init"]));
    Some(temp)
}

fn manifest(temp: &Path) -> serde_yaml::Value {
    let content = fs::read_to_string(temp.join("home").join("manifest.yaml")).unwrap();
    serde_yaml::from_str(&content).unwrap()
}

fn git_log(temp: &Path) -> String {
    let output = Command::new("git")
        .args(["log", "--format=%s"])
        .current_dir(temp.join("home"))
        .output()
        .unwrap();
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_init_is_idempotent() {
    let Some(temp) = init_home() else { return };
    let home = temp.path().join("home");

    assert!(home.join("manifest.yaml").exists());
    assert!(home.join("plugins").is_dir());
    assert!(home.join(".gitignore").exists());
    assert!(home.join(".git").exists());
    assert!(git_log(temp.path()).contains("Initialize ATK Home"));

    let again = run_atk(temp.path(), &["init"]);
    assert_success(&again);
    assert!(stdout(&again).contains("already initialized"));
}

#[test]
fn test_commands_require_initialized_home() {
    let temp = TempDir::new().unwrap();
    let output = run_atk(temp.path(), &["list", "--format", "json"]);
    assert_eq!(output.status.code(), Some(EXIT_HOME_NOT_INITIALIZED));
}

#[test]
fn test_add_local_plugin_twice() {
    let Some(temp) = init_home() else { return };

    for _ in 0..2 {
        assert_success(&run_atk(temp.path(), &["add", "./fixtures/full-plugin"]));

        let manifest = manifest(temp.path());
        let plugins = manifest["plugins"].as_sequence().unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0]["name"].as_str(), Some("Full Plugin"));
        assert_eq!(plugins[0]["directory"].as_str(), Some("full-plugin"));
        assert_eq!(plugins[0]["source"]["type"].as_str(), Some("local"));
    }

    let plugin_dir = temp.path().join("home").join("plugins").join("full-plugin");
    assert!(plugin_dir.join("plugin.yaml").exists());
    assert!(plugin_dir.join("installed.marker").exists());

    let gitignore = fs::read_to_string(temp.path().join("home").join(".gitignore")).unwrap();
    assert!(gitignore.contains("!plugins/full-plugin/*"));
    assert!(git_log(temp.path()).contains("Add plugin 'Full Plugin'"));
}

#[test]
fn test_list_json() {
    let Some(temp) = init_home() else { return };
    assert_success(&run_atk(temp.path(), &["add", "./fixtures/full-plugin"]));

    let output = run_atk(temp.path(), &["list", "--format", "json"]);
    assert_success(&output);
    let listed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(listed[0]["directory"], "full-plugin");
    assert_eq!(listed[0]["status"]["state"], "ok");
    assert_eq!(listed[0]["source"], "local");
}

#[test]
fn test_lifecycle_start_status_stop() {
    let Some(temp) = init_home() else { return };
    assert_success(&run_atk(temp.path(), &["add", "./fixtures/full-plugin"]));
    let plugin_dir = temp.path().join("home").join("plugins").join("full-plugin");

    assert_success(&run_atk(temp.path(), &["start", "full-plugin"]));
    assert!(plugin_dir.join("running.marker").exists());

    let status = run_atk(temp.path(), &["status", "full-plugin", "--format", "json"]);
    assert_success(&status);
    let report: serde_json::Value = serde_json::from_str(&stdout(&status)).unwrap();
    assert_eq!(report[0]["state"], "running");

    assert_success(&run_atk(temp.path(), &["stop", "--all"]));
    assert!(!plugin_dir.join("running.marker").exists());
}

#[test]
fn test_remove_unknown_and_cleanup() {
    let Some(temp) = init_home() else { return };

    let direct = run_atk(temp.path(), &["remove", "ghost"]);
    assert_eq!(direct.status.code(), Some(EXIT_PLUGIN_NOT_FOUND));

    assert_success(&run_atk(temp.path(), &["remove", "ghost", "--cleanup"]));
}

#[test]
fn test_remove_plugin() {
    let Some(temp) = init_home() else { return };
    assert_success(&run_atk(temp.path(), &["add", "./fixtures/full-plugin"]));

    assert_success(&run_atk(temp.path(), &["remove", "Full Plugin"]));

    assert!(!temp.path().join("home").join("plugins").join("full-plugin").exists());
    let manifest = manifest(temp.path());
    assert!(manifest["plugins"].as_sequence().is_none_or(|p| p.is_empty()));
    assert!(git_log(temp.path()).contains("Remove plugin 'Full Plugin'"));
}
