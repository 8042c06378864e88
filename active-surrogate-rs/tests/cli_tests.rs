//! Integration tests for the active-surrogate CLI.

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write `content` to `config.yaml` inside `dir`.
fn create_test_config(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join("config.yaml");
    fs::write(&config_path, content).expect("Failed to write test config");
    config_path
}

/// Helper function to run the CLI with given arguments.
fn run_cli(args: &[&str]) -> Command {
    let mut cmd =
        Command::cargo_bin("active-surrogate").expect("Failed to find active-surrogate binary");
    cmd.env("ACTIVE_SURROGATE_FORCE_CPU", "1");
    cmd.args(args);
    cmd
}

/// A tiny but complete configuration.
fn valid_config_yaml() -> &'static str {
    r#"
sampling:
  dimension: 1
  lower: [0.5]
  upper: [1.5]
  num_init: 4
  num_valid: 10
  n_all: 6

ensemble:
  num_networks: 2
  num_params: 1
  dofs: 2
  depths: [1, 1]
  widths: [8, 8]
  activations: [relu, snake]
  epochs: 5
  batch_frac: 0.5

simulator:
  fixed_parameters: [0.4, 0.4, 0.1]
  initial_conditions: [10.0, 10.0]
  final_time: 5.0
  time_steps: 100
  num_sensors: 10

seed: 3
"#
}

/// Parses, but asks for fewer samples than it starts with.
fn invalid_budget_yaml() -> &'static str {
    r#"
sampling:
  dimension: 1
  lower: [0.5]
  upper: [1.5]
  num_init: 10
  n_all: 5

ensemble:
  num_params: 1
  depths: [2, 2, 3, 3, 4]
  widths: [32, 64, 32, 64, 32]
  activations: [snake, relu, snake, relu, snake]
"#
}

#[test]
fn test_validate_command_valid_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = create_test_config(temp_dir.path(), valid_config_yaml());

    let mut cmd = run_cli(&["validate", config_path.to_str().unwrap()]);

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Configuration is valid"))
        .stdout(predicates::str::contains("2 members"));
}

#[test]
fn test_validate_command_invalid_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = create_test_config(temp_dir.path(), invalid_budget_yaml());

    let mut cmd = run_cli(&["validate", config_path.to_str().unwrap()]);

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("n_all"));
}

#[test]
fn test_validate_command_missing_file() {
    let mut cmd = run_cli(&["validate", "/nonexistent/config.yaml"]);
    cmd.assert().failure();
}

#[test]
fn test_init_command_presets() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    for preset in ["lotka-volterra", "lotka-volterra-quick"] {
        let output = temp_dir.path().join(format!("{preset}.yaml"));
        run_cli(&["init", output.to_str().unwrap(), "--preset", preset])
            .assert()
            .success()
            .stdout(predicates::str::contains("Configuration written"));

        run_cli(&["validate", output.to_str().unwrap()])
            .assert()
            .success();
    }
}

#[test]
fn test_init_command_unknown_preset() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = temp_dir.path().join("config.yaml");

    run_cli(&["init", output.to_str().unwrap(), "--preset", "brusselator"])
        .assert()
        .failure();
    assert!(!output.exists());
}

#[test]
fn test_sample_command_prints_both_sets() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = create_test_config(temp_dir.path(), valid_config_yaml());

    let output = run_cli(&["sample", config_path.to_str().unwrap()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "# training");
    assert_eq!(lines[5], "# validation");
    assert_eq!(lines.len(), 1 + 4 + 1 + 10);
}

#[test]
fn test_run_command_writes_reports() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = create_test_config(temp_dir.path(), valid_config_yaml());
    let out = temp_dir.path().join("reports");

    run_cli(&[
        "run",
        config_path.to_str().unwrap(),
        "--output-dir",
        out.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicates::str::contains("Finished 2 iterations"));

    assert!(out.join("iteration_0.json").exists());
    assert!(out.join("iteration_1.json").exists());
    assert!(!out.join("iteration_2.json").exists());

    let summary = fs::read_to_string(out.join("summary.json")).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&summary).unwrap();
    assert_eq!(summary["iterations"], 2);
    assert_eq!(summary["training_samples"].as_array().unwrap().len(), 6);
}

#[test]
fn test_run_command_help() {
    run_cli(&["run", "--help"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Lotka-Volterra"))
        .stdout(predicates::str::contains("--output-dir"));
}

#[test]
fn test_help_lists_commands() {
    run_cli(&["--help"])
        .assert()
        .success()
        .stdout(predicates::str::contains("validate"))
        .stdout(predicates::str::contains("init"))
        .stdout(predicates::str::contains("sample"))
        .stdout(predicates::str::contains("run"));
}
