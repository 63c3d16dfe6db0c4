// Copyright (c) 2022. Sebastien Soudan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http:www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end tests of the `permtest` binary.

use predicates::prelude::*;
use tempfile::TempDir;

const SNEETCHES: &str = "tests/fixtures/sneetches.csv";
const MESSY: &str = "tests/fixtures/messy.tsv";

fn json_summary(args: &[&str]) -> serde_json::Value {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("permtest");
    let output = cmd.args(args).arg("--format").arg("json").output().unwrap();
    assert!(output.status.success(), "permtest {args:?} failed");
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_text_groups() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("permtest");
    cmd.args(["-a", "1 1 1", "-b", "10, 10, 10", "--seed", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "observed difference (mean B - mean A): 9.0000",
        ))
        .stdout(predicate::str::contains("simulations: 10000"))
        .stdout(predicate::str::contains("p-value: "));
}

#[test]
fn test_text_groups_json() {
    let summary = json_summary(&["-a", "1 1 1", "-b", "10 10 10", "--seed", "42"]);

    assert_eq!(summary["observed_difference"], 9.0);
    assert_eq!(summary["n_a"], 3);
    assert_eq!(summary["n_b"], 3);
    assert_eq!(summary["seed"], 42);
    assert_eq!(summary["contains_text"], false);

    // exactly 1 of the 20 shuffles reaches 9
    let p_value = summary["p_value"].as_f64().unwrap();
    assert!((p_value - 0.05).abs() < 0.02, "p-value {p_value}");
}

#[test]
fn test_text_groups_with_letters() {
    let summary = json_summary(&["-a", "1 abc 2 1e999", "-b", "3 4", "--seed", "7"]);

    assert_eq!(summary["contains_text"], true);
    assert_eq!(summary["n_a"], 2);
    assert_eq!(summary["observed_difference"], 2.0);
    let tokens: Vec<_> = summary["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["token"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(tokens, vec!["abc", "1e999"]);
}

#[test]
fn test_same_seed_same_output() {
    let run = || {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("permtest");
        let output = cmd
            .args([SNEETCHES, "--seed", "7", "-n", "2000"])
            .output()
            .unwrap();
        assert!(output.status.success());
        output.stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn test_file_input() {
    let summary = json_summary(&[SNEETCHES, "--seed", "1", "--tail", "left"]);

    assert_eq!(summary["n_a"], 12);
    assert_eq!(summary["n_b"], 8);
    assert_eq!(summary["pvalue_type"], "one-sided-left-tail");
    assert!(summary["warnings"].as_array().unwrap().is_empty());

    let p_value = summary["p_value"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&p_value));
}

#[test]
fn test_file_input_named_columns_and_skipped_rows() {
    let summary = json_summary(&[
        MESSY,
        "--delimiter",
        "\t",
        "--group-column",
        "star",
        "--value-column",
        "measurement",
        "--seed",
        "3",
    ]);

    assert_eq!(summary["n_a"], 2);
    assert_eq!(summary["n_b"], 3);
    assert_eq!(summary["warnings"].as_array().unwrap().len(), 2);
    assert_eq!(summary["warnings"][0]["kind"], "skipped-row");
    assert_eq!(summary["warnings"][0]["line"], 3);
}

#[test]
fn test_histogram_and_distribution_outputs() {
    let dir = TempDir::new().unwrap();
    let histogram = dir.path().join("null.svg");
    let distribution = dir.path().join("null.csv");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("permtest");
    cmd.arg(SNEETCHES)
        .args(["-n", "500", "--seed", "5", "--bins", "20"])
        .arg("--histogram")
        .arg(&histogram)
        .arg("--distribution")
        .arg(&distribution)
        .assert()
        .success();

    let svg = std::fs::read_to_string(&histogram).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("score difference"));
    assert!(svg.matches("class=\"bar\"").count() <= 20);

    let csv = std::fs::read_to_string(&distribution).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("difference"));
    assert_eq!(lines.count(), 500);
}

#[test]
fn test_text_in_input_warns() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("permtest");
    cmd.args(["-a", "3.5, -2, 1e3, abc, 4,000", "-b", "5 6 7", "-n", "100"])
        .assert()
        .success()
        .stderr(predicate::str::contains("found text in input"))
        .stderr(predicate::str::contains("\"abc\""))
        .stdout(predicate::str::contains("group A: 4 observations"));
}

#[test]
fn test_empty_group_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("permtest");
    cmd.args(["-a", "no numbers here", "-b", "1 2 3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("group A has no observations"));
}

#[test]
fn test_zero_simulations_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("permtest");
    cmd.args(["-a", "1 2", "-b", "3 4", "-n", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_no_input_at_all_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("permtest");
    cmd.args(["-a", "", "-b", ""])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no observations in either group"));
}

#[test]
fn test_missing_file_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("permtest");
    cmd.arg("tests/fixtures/does-not-exist.csv")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn test_missing_column_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("permtest");
    cmd.args([SNEETCHES, "--value-column", "score"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"score\" not found"));
}
