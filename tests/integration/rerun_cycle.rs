//! Integration tests for the rerun-cache lifecycle.
//!
//! A full run records its failures; `--rerun` executes only those, and a
//! rerun in which everything passes leaves the cache empty.

use std::fs;
use std::path::Path;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Worker that fails the scenario-7 feature until a `fixed` marker file
/// appears in the working directory.
const FIXABLE_CONFIG: &str = r#"
features_dir = "features"
command = ["sh", "-c", "case \"$1\" in *scenario-7*) test -f fixed ;; *) exit 0 ;; esac", "worker"]
rerun_cache = ".stampede/rerun_cache.json"

[[environments]]
CACHE_DIR = "00-test"

[[environments]]
CACHE_DIR = "01-test"

[[environments]]
CACHE_DIR = "02-test"

[[environments]]
CACHE_DIR = "03-test"
"#;

#[allow(deprecated)]
fn stampede_cmd() -> Command {
    Command::cargo_bin("stampede").expect("Failed to find stampede binary")
}

fn setup(feature_count: usize) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join("stampede.toml"), FIXABLE_CONFIG)
        .expect("Failed to write config");
    let features = temp_dir.path().join("features");
    fs::create_dir_all(&features).expect("Failed to create features dir");
    for i in 0..feature_count {
        let content = format!("Feature: S{i}\n\n  Scenario: passes\n    Given nothing\n");
        fs::write(features.join(format!("scenario-{i}.feature")), content)
            .expect("Failed to write feature");
    }
    temp_dir
}

fn cached_failures(dir: &Path) -> serde_json::Value {
    let cache = fs::read_to_string(dir.join(".stampede/rerun_cache.json"))
        .expect("Failed to read rerun cache");
    let record: serde_json::Value = serde_json::from_str(&cache).expect("Failed to parse cache");
    record["failed"].clone()
}

/// The full cycle: fail, rerun the failure, pass, end with an empty cache.
#[test]
fn test_failure_rerun_and_recovery_cycle() {
    let temp_dir = setup(10);

    // First run: 10 specifications, scenario-7 fails.
    stampede_cmd()
        .current_dir(temp_dir.path())
        .timeout(Duration::from_secs(30))
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("1 of 10 specifications failed"));
    assert_eq!(
        cached_failures(temp_dir.path()),
        serde_json::json!(["features/scenario-7.feature"])
    );

    // Rerun without the fix: only the cached failure executes, still red.
    stampede_cmd()
        .current_dir(temp_dir.path())
        .arg("--rerun")
        .timeout(Duration::from_secs(30))
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("1 of 1 specifications failed"));

    // Apply the fix and rerun: one specification, all green, cache empty.
    fs::write(temp_dir.path().join("fixed"), "").expect("Failed to write marker");
    stampede_cmd()
        .current_dir(temp_dir.path())
        .arg("--rerun")
        .timeout(Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("All specifications passed"))
        .stdout(predicate::str::contains("1 specifications"));
    assert_eq!(cached_failures(temp_dir.path()), serde_json::json!([]));
}

/// A rerun against an empty cache is a successful no-op.
#[test]
fn test_rerun_with_empty_cache_reports_nothing_to_rerun() {
    let temp_dir = setup(3);

    // Passing run leaves an empty cache behind.
    fs::write(temp_dir.path().join("fixed"), "").expect("Failed to write marker");
    stampede_cmd()
        .current_dir(temp_dir.path())
        .timeout(Duration::from_secs(30))
        .assert()
        .success();

    stampede_cmd()
        .current_dir(temp_dir.path())
        .arg("--rerun")
        .timeout(Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to rerun"));
}

/// A rerun with no cache file at all behaves like an empty cache.
#[test]
fn test_rerun_without_cache_file_succeeds() {
    let temp_dir = setup(3);

    stampede_cmd()
        .current_dir(temp_dir.path())
        .arg("--rerun")
        .timeout(Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to rerun"));
}

/// A corrupt cache file is a fatal configuration error.
#[test]
fn test_corrupt_cache_file_aborts_a_rerun() {
    let temp_dir = setup(3);
    fs::create_dir_all(temp_dir.path().join(".stampede")).expect("Failed to create cache dir");
    fs::write(temp_dir.path().join(".stampede/rerun_cache.json"), "{broken")
        .expect("Failed to write corrupt cache");

    stampede_cmd()
        .current_dir(temp_dir.path())
        .arg("--rerun")
        .timeout(Duration::from_secs(30))
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("corrupt"));
}
