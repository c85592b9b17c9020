//! Tests for the command-line validator.

mod support;

use std::process::{Command, Output};

use rstest::rstest;
use serde_json::Value;
use support::TempWorkspace;

const MANIFEST: &str = r#"[
  { "pattern": "an empty cart", "source": { "path": "steps.rs", "line": 3 } },
  { "pattern": "I add {int} item(s)", "source": { "path": "steps.rs", "line": 9 } }
]"#;

const MATCHED: &str = "\
Feature: Cart
  Scenario: Add
    Given an empty cart
    When I add 2 items
";

const UNMATCHED: &str = "\
Feature: Cart
  Scenario: Remove
    Given an empty cart
    When I remove everything
";

fn run(workspace: &TempWorkspace, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gherkin-assist"))
        .current_dir(workspace.root())
        .env_remove("GHERKIN_ASSIST_LOG_LEVEL")
        .args(["--debounce-ms", "0"])
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("run gherkin-assist: {e}"))
}

#[test]
fn fully_matched_files_succeed_silently() {
    let workspace = TempWorkspace::new();
    workspace.write("glue.json", MANIFEST);
    workspace.write("cart.feature", MATCHED);

    let output = run(&workspace, &["--glue", "glue.json", "cart.feature"]);
    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty());
}

#[test]
fn unmatched_steps_fail_with_a_text_report() {
    let workspace = TempWorkspace::new();
    workspace.write("glue.json", MANIFEST);
    workspace.write("cart.feature", UNMATCHED);

    let output = run(&workspace, &["--glue", "glue.json", "cart.feature"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim_end(),
        "cart.feature:4: warning [unmatched-step] No step definition found for step: \"I remove everything\""
    );
}

#[test]
fn json_output_lists_every_file() {
    let workspace = TempWorkspace::new();
    workspace.write("glue.json", MANIFEST);
    workspace.write("a.feature", MATCHED);
    workspace.write("b.feature", UNMATCHED);

    let output = run(
        &workspace,
        &["--glue", "glue.json", "--format", "json", "a.feature", "b.feature"],
    );
    assert_eq!(output.status.code(), Some(1));
    let reports: Value = serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("stdout should be JSON: {e}"));
    let summary: Vec<(String, usize)> = reports
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|report| {
            let path = report.get("path").and_then(Value::as_str).unwrap_or_default();
            let count = report
                .get("diagnostics")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            (path.to_owned(), count)
        })
        .collect();
    assert_eq!(
        summary,
        [("a.feature".to_owned(), 0), ("b.feature".to_owned(), 1)]
    );
}

#[rstest]
#[case::without_manifest(&["cart.feature"], 2)]
#[case::missing_manifest(&["--glue", "absent.json", "cart.feature"], 1)]
fn steps_are_reported_when_no_definitions_load(#[case] args: &[&str], #[case] expected: usize) {
    let workspace = TempWorkspace::new();
    workspace.write("cart.feature", MATCHED);

    let output = run(&workspace, args);
    assert_eq!(output.status.code(), Some(1));
    let lines = String::from_utf8_lossy(&output.stdout).lines().count();
    assert_eq!(lines, expected);
}

#[test]
fn missing_feature_files_are_errors() {
    let workspace = TempWorkspace::new();
    let output = run(&workspace, &["absent.feature"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.feature"));
}
