//! E2E CLI tests for the error contract: stable `E####` codes, hints,
//! non-zero exits and unchanged state after a rejected request.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn tl_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tl"));
    cmd.current_dir(dir);
    cmd.env("TASKLIST_LOG", "error");
    cmd.env("XDG_CONFIG_HOME", dir.join("xdg"));
    cmd.env_remove("TASKLIST_DB");
    cmd
}

fn setup(dir: &Path) {
    tl_cmd(dir).arg("init").assert().success();
    let steps: [&[&str]; 5] = [
        &["list", "create", "L"],
        &["add", "L", "A", "Parent"],
        &["add", "L", "A1", "Child", "--parent", "A"],
        &["add", "L", "D1", "One"],
        &["add", "L", "D2", "Two"],
    ];
    for args in steps {
        tl_cmd(dir).args(args).assert().success();
    }
}

/// Run a failing command in JSON mode and return the `error` object.
fn json_error(dir: &Path, args: &[&str]) -> Value {
    let output = tl_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("tl should not crash");
    assert!(!output.status.success(), "{args:?} unexpectedly succeeded");
    let body: Value = serde_json::from_slice(&output.stderr).expect("error JSON on stderr");
    body["error"].clone()
}

#[test]
fn completing_parent_with_open_children_needs_force() {
    let dir = TempDir::new().expect("temp dir");
    setup(dir.path());

    let err = json_error(dir.path(), &["status", "L", "A", "completed"]);
    assert_eq!(err["error_code"], "E2002");
    assert!(
        err["message"]
            .as_str()
            .is_some_and(|m| m.contains("incomplete: 1/1"))
    );
    assert!(err["hint"].as_str().is_some_and(|h| h.contains("--force")));

    tl_cmd(dir.path())
        .args(["status", "L", "A", "completed", "--force"])
        .assert()
        .success();
}

#[test]
fn dependency_cycle_is_rejected_with_path() {
    let dir = TempDir::new().expect("temp dir");
    setup(dir.path());
    tl_cmd(dir.path())
        .args(["dep", "add", "L/D1", "L/D2"])
        .assert()
        .success();

    let err = json_error(dir.path(), &["dep", "add", "L/D2", "L/D1"]);
    assert_eq!(err["error_code"], "E2003");
    assert!(
        err["message"]
            .as_str()
            .is_some_and(|m| m.contains("L/D2 → L/D1 → L/D2"))
    );

    let shown: Value = serde_json::from_slice(
        &tl_cmd(dir.path())
            .args(["dep", "show", "L/D2", "--json"])
            .output()
            .expect("dep show")
            .stdout,
    )
    .expect("json");
    assert!(shown["depends_on"].as_array().expect("edges").is_empty());
}

#[test]
fn unknown_item_is_not_found() {
    let dir = TempDir::new().expect("temp dir");
    setup(dir.path());
    let err = json_error(dir.path(), &["status", "L", "nope", "failed"]);
    assert_eq!(err["error_code"], "E2001");
}

#[test]
fn duplicate_key_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    setup(dir.path());
    let err = json_error(dir.path(), &["add", "L", "A", "Again"]);
    assert_eq!(err["error_code"], "E2004");
}

#[test]
fn moving_item_under_its_descendant_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    setup(dir.path());
    let err = json_error(dir.path(), &["subitem", "L", "A", "A1"]);
    assert_eq!(err["error_code"], "E2005");
}

#[test]
fn text_errors_show_code_and_hint() {
    let dir = TempDir::new().expect("temp dir");
    setup(dir.path());
    tl_cmd(dir.path())
        .args(["status", "L", "A", "completed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2002]"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn invalid_status_value_is_a_usage_error() {
    let dir = TempDir::new().expect("temp dir");
    setup(dir.path());
    tl_cmd(dir.path())
        .args(["status", "L", "A", "done"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid status"));
}

#[test]
fn malformed_config_is_a_config_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    setup(dir.path());
    std::fs::write(
        dir.path().join(".tasklist/config.toml"),
        "[hierarchy]\nrecommended_max_depth = \"deep\"\n",
    )
    .expect("write config");

    let err = json_error(dir.path(), &["list", "show"]);
    assert_eq!(err["error_code"], "E1002");
    assert!(err["message"].as_str().is_some_and(|m| m.contains("config.toml")));
    assert!(err["hint"].as_str().is_some());
}
