//! End-to-end tests for the tagflow-rs binary.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn tagflow() -> Command {
    Command::cargo_bin("tagflow-rs").expect("binary should build")
}

#[test]
fn test_filter_from_stdin() {
    tagflow()
        .arg("filter")
        .write_stdin(r#"hi <photo>{"query":"Louvre"}</photo> there"#)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("hi  there"))
        .stdout(predicate::str::contains("1 payload(s):"));
}

#[test]
fn test_filter_chunked_flag() {
    tagflow()
        .args(["filter", "--chunk-size", "1"])
        .write_stdin(r#"a<trip_update>{"field":"x","value":1}</trip_update>b"#)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ab\n"))
        .stdout(predicate::str::contains("trip_update"));
}

#[test]
fn test_scan_clean_input() {
    tagflow()
        .arg("scan")
        .write_stdin("no markers here, just prose")
        .assert()
        .success()
        .stdout(predicate::str::contains("No markers found."));
}

#[test]
fn test_replay_json_output() {
    tagflow()
        .args(["replay", "--create-subject", "--format", "json"])
        .write_stdin("hello world\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"complete\""))
        .stdout(predicate::str::contains("\"clean_text\": \"hello world\""));
}

#[test]
fn test_version_flag() {
    tagflow().arg("--version").assert().success();
}
