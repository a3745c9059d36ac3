//! Tests for the rc binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn rc(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("rc").expect("rc binary should build");
    cmd.current_dir(home.path())
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_demo_completes() {
    let home = TempDir::new().unwrap();
    rc(&home)
        .args([
            "demo",
            "-n",
            "5",
            "--max-in-flight",
            "3",
            "--min-in-flight",
            "1",
            "--time-budget-ms",
            "500",
            "--poll-wait-ms",
            "20",
            "--service-time-ms",
            "5",
            "--service-jitter-ms",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("All received: 5 submitted, 5 replies"));

    assert!(home.path().join("data/reqcoord/logs/reqcoord.log").exists());
}

#[test]
fn test_demo_json_output() {
    let home = TempDir::new().unwrap();
    let output = rc(&home)
        .args([
            "demo",
            "-n",
            "3",
            "--poll-wait-ms",
            "20",
            "--service-time-ms",
            "5",
            "--service-jitter-ms",
            "0",
            "--format",
            "json",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["report"]["received"], 3);
    assert_eq!(summary["replies"].as_array().map(Vec::len), Some(3));
}

#[test]
fn test_config_prints_defaults() {
    let home = TempDir::new().unwrap();
    rc(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max-in-flight: 30"))
        .stdout(predicate::str::contains("routing-key: GetPosition"));
}

#[test]
fn test_config_reads_local_file() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join(".reqcoord.yml"), "coordinator:\n  max-in-flight: 7\n").unwrap();
    rc(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max-in-flight: 7"));
}

#[test]
fn test_invalid_window_fails() {
    let home = TempDir::new().unwrap();
    rc(&home)
        .args(["demo", "-n", "1", "--max-in-flight", "2", "--min-in-flight", "5"])
        .assert()
        .failure();
}

#[test]
fn test_demo_gives_up_on_slow_service() {
    let home = TempDir::new().unwrap();
    rc(&home)
        .args([
            "demo",
            "-n",
            "3",
            "--poll-wait-ms",
            "10",
            "--service-time-ms",
            "500",
            "--service-jitter-ms",
            "0",
            "--give-up-after-ms",
            "50",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("still in flight"));
}
