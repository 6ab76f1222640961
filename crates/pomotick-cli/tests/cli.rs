//! CLI E2E tests.
//!
//! Each test runs the `pomotick` binary against its own data directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn pomotick(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pomotick").unwrap();
    cmd.env("POMOTICK_DATA_DIR", data_dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn run_answers_requests_and_closes() {
    let dir = TempDir::new().unwrap();
    let output = pomotick(&dir)
        .arg("run")
        .write_stdin("{\"cmd\":\"getState\"}\n{\"cmd\":\"start\"}\n{\"cmd\":\"quit\"}\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let lines = json_lines(&output.stdout);
    let types: Vec<&str> = lines.iter().map(|l| l["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["State", "StateChanged", "State", "Closed"]);
    assert_eq!(lines[0]["state"]["status"], "idle");
    assert_eq!(lines[2]["state"]["status"], "running");
    assert_eq!(lines[2]["state"]["mode"], "focus");
}

#[test]
fn run_rejects_bad_input_and_keeps_going() {
    let dir = TempDir::new().unwrap();
    let output = pomotick(&dir)
        .arg("run")
        .write_stdin("garbage\n{\"cmd\":\"setMode\",\"mode\":\"nap\"}\n{\"cmd\":\"skip\"}\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let lines = json_lines(&output.stdout);
    assert_eq!(lines[0]["type"], "Error");
    assert_eq!(lines[1]["message"], "Invalid timer mode: nap");
    let last_state = lines.iter().rev().find(|l| l["type"] == "State").unwrap();
    assert_eq!(last_state["state"]["mode"], "shortBreak");
    assert_eq!(last_state["state"]["completedFocus"], 0);
    // stdin EOF shuts down cleanly
    assert_eq!(lines.last().unwrap()["type"], "Closed");
}

#[test]
fn run_survives_non_utf8_input() {
    let dir = TempDir::new().unwrap();
    let mut input = b"\xff\xfe\n".to_vec();
    input.extend_from_slice(b"{\"cmd\":\"getState\"}\n");
    let output = pomotick(&dir).arg("run").write_stdin(input).output().unwrap();
    assert!(output.status.success());

    let lines = json_lines(&output.stdout);
    let types: Vec<&str> = lines.iter().map(|l| l["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["Error", "State", "Closed"]);
    assert_eq!(lines[1]["state"]["status"], "idle");
}

#[test]
fn run_persists_accepted_settings() {
    let dir = TempDir::new().unwrap();
    pomotick(&dir)
        .arg("run")
        .write_stdin("{\"cmd\":\"updateSettings\",\"settings\":{\"focusMinutes\":50}}\n")
        .assert()
        .success();

    pomotick(&dir)
        .args(["config", "get", "timer.focusMinutes"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("50"));
}

#[test]
fn config_set_get_and_reset() {
    let dir = TempDir::new().unwrap();
    pomotick(&dir)
        .args(["config", "set", "timer.longBreakEvery", "2"])
        .assert()
        .success()
        .stdout("ok\n");
    pomotick(&dir)
        .args(["config", "get", "timer.longBreakEvery"])
        .assert()
        .success()
        .stdout("2\n");

    pomotick(&dir).args(["config", "reset"]).assert().success();
    pomotick(&dir)
        .args(["config", "get", "timer.longBreakEvery"])
        .assert()
        .success()
        .stdout("4\n");
}

#[test]
fn config_rejects_invalid_values() {
    let dir = TempDir::new().unwrap();
    pomotick(&dir)
        .args(["config", "set", "timer.focusMinutes", "-5"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error:"));
    pomotick(&dir)
        .args(["config", "get", "timer.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown key: timer.nope"));
}

#[test]
fn config_list_is_json() {
    let dir = TempDir::new().unwrap();
    let output = pomotick(&dir).args(["config", "list"]).output().unwrap();
    assert!(output.status.success());
    let config: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["timer"]["focusMinutes"], 25.0);
    assert_eq!(config["tick_interval_ms"], 250);
}

#[test]
fn stats_on_empty_history() {
    let dir = TempDir::new().unwrap();
    let output = pomotick(&dir).args(["stats", "today"]).output().unwrap();
    assert!(output.status.success());
    let today: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(today["pomodoros"], 0);

    let output = pomotick(&dir)
        .args(["stats", "range", "--days", "3"])
        .output()
        .unwrap();
    let range: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(range["days"], 3);
    assert_eq!(range["focusMinutes"], 0.0);
}
