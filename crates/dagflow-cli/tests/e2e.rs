//! End-to-end tests for the `dagflow` CLI binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn dagflow_cmd() -> Command {
    Command::cargo_bin("dagflow").expect("dagflow binary built by the workspace")
}

#[test]
fn run_prints_the_demo_pipeline_results_for_the_default_input() {
    dagflow_cmd()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("n = 21"))
        .stdout(predicate::str::contains("doubled = 42"))
        .stdout(predicate::str::contains("squared = 441"))
        .stdout(predicate::str::contains("sum = 483"));
}

#[test]
fn run_honors_a_custom_input_value() {
    dagflow_cmd()
        .args(["run", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("n = 3"))
        .stdout(predicate::str::contains("doubled = 6"))
        .stdout(predicate::str::contains("squared = 9"))
        .stdout(predicate::str::contains("sum = 15"));
}

#[test]
fn run_with_pool_executor_produces_the_same_results() {
    dagflow_cmd()
        .args(["run", "5", "--pool", "--workers", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sum = 35"));
}

#[test]
fn graph_emits_a_mermaid_topology() {
    dagflow_cmd()
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("graph LR"))
        .stdout(predicate::str::contains("n --> doubled"))
        .stdout(predicate::str::contains("n --> squared"));
}
