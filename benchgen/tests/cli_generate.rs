//! Binary-level tests: run `benchgen` in a scratch repository layout.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const SMALL_EXPERIMENT: &str = r#"
[experiment]
id = "tiny_partial"
description = "Small partial-compliance cohort"

[cohort]
subjects = 12
seed = 7

[simulation]
horizon = 30

[intervention]
time = 20

[policy]
compliance = "partial"
"#;

const UNSTABLE_EXPERIMENT: &str = r#"
[experiment]
id = "unstable"

[cohort]
subjects = 4
seed = 7

[simulation]
horizon = 30

[simulation.params]
k_2 = 1.0

[intervention]
time = 20
"#;

fn benchgen(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_benchgen"))
        .args(args)
        .current_dir(root)
        .output()
        .expect("spawn benchgen")
}

fn scratch_repo() -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    let experiments = temp.path().join("benchgen").join("experiments");
    fs::create_dir_all(&experiments).expect("experiments dir");
    fs::write(experiments.join("tiny_partial.toml"), SMALL_EXPERIMENT).expect("experiment");
    temp
}

#[test]
fn generate_writes_dataset_and_meta() {
    let repo = scratch_repo();
    let output = benchgen(repo.path(), &["generate", "tiny_partial"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("rows=12"));

    let dir = repo.path().join("data").join("tiny_partial");
    let csv = fs::read_to_string(dir.join("dataset.csv")).expect("dataset");
    let mut lines = csv.lines();
    let header = lines.next().expect("header");
    assert!(header.ends_with("immune_response,enrolled,treatment,outcome,true_effect"));
    assert_eq!(lines.count(), 12);

    let meta: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join("meta.json")).expect("meta"))
            .expect("meta json");
    assert_eq!(meta["experiment_id"], "tiny_partial");
    assert_eq!(meta["seed"], 7);
    assert_eq!(meta["rows"], 12);
    assert_eq!(meta["config_hash"].as_str().map(str::len), Some(64));

    let rerun = benchgen(repo.path(), &["generate", "tiny_partial"]);
    assert!(rerun.status.success());
    let again = fs::read_to_string(dir.join("dataset.csv")).expect("dataset");
    assert_eq!(csv, again);
}

#[test]
fn replication_override_switches_to_json_and_report_reads_it() {
    let repo = scratch_repo();
    let output = benchgen(
        repo.path(),
        &["generate", "tiny_partial", "--replications", "2", "--workers", "2"],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let dir = repo.path().join("data").join("tiny_partial");
    assert!(dir.join("dataset.json").exists());
    assert!(!dir.join("dataset.csv").exists());

    let report = benchgen(repo.path(), &["report", "tiny_partial"]);
    assert!(report.status.success());
    let stdout = String::from_utf8_lossy(&report.stdout);
    assert!(stdout.contains("rows=24 replications=2"));
    assert!(stdout.contains("report: failures=0"));

    let clean = benchgen(repo.path(), &["clean", "tiny_partial"]);
    assert!(clean.status.success());
    assert!(!dir.exists());
}

#[test]
fn invalid_override_exits_with_invalid_code() {
    let repo = scratch_repo();
    let output = benchgen(repo.path(), &["generate", "tiny_partial", "--subjects", "0"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("cohort.subjects"));
    assert!(!repo.path().join("data").exists());
}

#[test]
fn unknown_experiment_is_reported() {
    let repo = scratch_repo();
    let output = benchgen(repo.path(), &["generate", "missing"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("experiment missing not found"));
}

fn add_unstable_experiment(repo: &Path) {
    let path = repo.join("benchgen").join("experiments").join("unstable.toml");
    fs::write(path, UNSTABLE_EXPERIMENT).expect("experiment");
}

#[test]
fn diverging_simulation_exits_with_simulation_failed_code() {
    let repo = scratch_repo();
    add_unstable_experiment(repo.path());
    let output = benchgen(repo.path(), &["generate", "unstable"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(2), "stderr: {stderr}");
    assert!(stderr.contains("replication 0 subject 0"), "stderr: {stderr}");
    assert!(!repo.path().join("data").join("unstable").exists());
}

#[test]
fn unwritable_data_dir_exits_with_persist_failed_code() {
    let repo = scratch_repo();
    fs::write(repo.path().join("data"), "not a directory").expect("data file");
    let output = benchgen(repo.path(), &["generate", "tiny_partial"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(3), "stderr: {stderr}");
    assert!(stderr.contains("generate tiny_partial"), "stderr: {stderr}");
}

#[test]
fn list_prints_ids_with_descriptions() {
    let repo = scratch_repo();
    let output = benchgen(repo.path(), &["list"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "tiny_partial\tSmall partial-compliance cohort\n"
    );
}
