//! Integration tests for full parallel runs.
//!
//! These tests drive the stampede binary against real feature files and a
//! real worker command (`sh`), verifying exit codes, summary output, and
//! the persisted rerun cache.

use std::fs;
use std::path::Path;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Config whose worker fails exactly the scenario-7 feature file.
const FAILING_CONFIG: &str = r#"
features_dir = "features"
command = ["sh", "-c", "case \"$1\" in *scenario-7*) exit 1 ;; *) exit 0 ;; esac", "worker"]
rerun_cache = ".stampede/rerun_cache.json"

[[environments]]
CACHE_DIR = "00-test"
SYMFONY_SERVER_PORT = "8000"

[[environments]]
CACHE_DIR = "01-test"
SYMFONY_SERVER_PORT = "8001"

[[environments]]
CACHE_DIR = "02-test"
SYMFONY_SERVER_PORT = "8002"

[[environments]]
CACHE_DIR = "03-test"
SYMFONY_SERVER_PORT = "8003"
"#;

/// Config whose worker always passes.
const PASSING_CONFIG: &str = r#"
features_dir = "features"
command = ["true"]
rerun_cache = ".stampede/rerun_cache.json"

[[environments]]
CACHE_DIR = "00-test"

[[environments]]
CACHE_DIR = "01-test"
"#;

#[allow(deprecated)]
fn stampede_cmd() -> Command {
    Command::cargo_bin("stampede").expect("Failed to find stampede binary")
}

fn write_features(dir: &Path, count: usize) {
    let features = dir.join("features");
    fs::create_dir_all(&features).expect("Failed to create features dir");
    for i in 0..count {
        let content = format!("Feature: S{i}\n\n  Scenario: passes\n    Given nothing\n");
        fs::write(features.join(format!("scenario-{i}.feature")), content)
            .expect("Failed to write feature");
    }
}

fn setup(config: &str, feature_count: usize) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join("stampede.toml"), config).expect("Failed to write config");
    write_features(temp_dir.path(), feature_count);
    temp_dir
}

#[test]
fn test_help_shows_parallel_options() {
    stampede_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--rerun"))
        .stdout(predicate::str::contains("--max-concurrency"))
        .stdout(predicate::str::contains("--scenarios"));
}

#[test]
fn test_missing_config_is_a_fatal_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    stampede_cmd()
        .current_dir(temp_dir.path())
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_all_passing_run_exits_zero() {
    let temp_dir = setup(PASSING_CONFIG, 3);

    stampede_cmd()
        .current_dir(temp_dir.path())
        .timeout(Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("All specifications passed"));
}

#[test]
fn test_failing_spec_sets_exit_code_and_cache() {
    let temp_dir = setup(FAILING_CONFIG, 10);

    stampede_cmd()
        .current_dir(temp_dir.path())
        .timeout(Duration::from_secs(30))
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("1 of 10 specifications failed"))
        .stdout(predicate::str::contains("scenario-7.feature"));

    let cache_path = temp_dir.path().join(".stampede/rerun_cache.json");
    let cache = fs::read_to_string(&cache_path).expect("Failed to read rerun cache");
    let record: serde_json::Value = serde_json::from_str(&cache).expect("Failed to parse cache");
    assert_eq!(
        record["failed"],
        serde_json::json!(["features/scenario-7.feature"])
    );
}

#[test]
fn test_passing_run_persists_an_empty_cache() {
    let temp_dir = setup(PASSING_CONFIG, 3);

    stampede_cmd()
        .current_dir(temp_dir.path())
        .timeout(Duration::from_secs(30))
        .assert()
        .success();

    let cache = fs::read_to_string(temp_dir.path().join(".stampede/rerun_cache.json"))
        .expect("Failed to read rerun cache");
    let record: serde_json::Value = serde_json::from_str(&cache).expect("Failed to parse cache");
    assert_eq!(record["failed"], serde_json::json!([]));
}

#[test]
fn test_scenario_granularity_runs_each_scenario() {
    let temp_dir = setup(PASSING_CONFIG, 2);

    stampede_cmd()
        .current_dir(temp_dir.path())
        .arg("--scenarios")
        .timeout(Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("2 specifications"));
}

#[test]
fn test_max_concurrency_flag_is_accepted() {
    let temp_dir = setup(PASSING_CONFIG, 3);

    stampede_cmd()
        .current_dir(temp_dir.path())
        .arg("--max-concurrency")
        .arg("1")
        .timeout(Duration::from_secs(30))
        .assert()
        .success();
}

#[test]
fn test_quiet_suppresses_the_summary() {
    let temp_dir = setup(PASSING_CONFIG, 2);

    stampede_cmd()
        .current_dir(temp_dir.path())
        .arg("--quiet")
        .timeout(Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
