mod fixtures;

use std::fs;
use std::process::Command;
use tempfile::TempDir;

use fixtures::get_test_fixture_path;

fn casefinder() -> Command {
    Command::new(env!("CARGO_BIN_EXE_casefinder"))
}

fn events(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8(stdout.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_cli_help() {
    let output = casefinder()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("casefinder"));
    assert!(stdout.contains("--path"));
    assert!(stdout.contains("--stop-after"));
    assert!(stdout.contains("--output-file"));
}

#[test]
fn test_cli_missing_path() {
    let output = casefinder().output().expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("required") || stderr.contains("--path"));
}

#[test]
fn test_cli_invalid_path() {
    let output = casefinder()
        .args(["--path", "/nonexistent/path/that/does/not/exist"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("does not exist") || stderr.contains("Invalid arguments"));
}

#[test]
fn test_cli_emits_json_lines() {
    let output = casefinder()
        .arg("--path")
        .arg(get_test_fixture_path("calculator.unit.yaml"))
        .arg("--include-payload")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let events = events(&output.stdout);
    assert_eq!(events.first().unwrap()["event"], "discovery_starting");
    assert_eq!(events.last().unwrap()["event"], "discovery_complete");
    assert_eq!(events.last().unwrap()["case_count"], 9);
    assert_eq!(events.last().unwrap()["cancelled"], false);

    let doubles = events
        .iter()
        .find(|e| e["display_name"] == "Calculator.Tests.ArithmeticTests.Doubles(value: 42)")
        .unwrap();
    assert_eq!(doubles["kind"], "row");
    assert_eq!(
        doubles["serialization"],
        "1:row:Calculator.Tests.ArithmeticTests:Doubles:1:a1[i42;]"
    );
}

#[test]
fn test_cli_stop_after_and_output_file() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().join("cases.jsonl");

    let output = casefinder()
        .arg("--path")
        .arg(get_test_fixture_path("calculator.unit.yaml"))
        .args(["--stop-after", "2", "--parallel", "1", "-O"])
        .arg(&output_path)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let events = events(&fs::read(&output_path).unwrap());
    let cases = events
        .iter()
        .filter(|e| e["event"] == "test_case_discovered")
        .count();
    assert_eq!(cases, 2);
    assert_eq!(events.last().unwrap()["event"], "discovery_complete");
}

#[test]
fn test_cli_type_filter_includes_private_methods() {
    let output = casefinder()
        .arg("--path")
        .arg(get_test_fixture_path("calculator.unit.yaml"))
        .args(["--type", "Calculator.Tests.ArithmeticTests", "--method-display", "method"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let events = events(&output.stdout);
    assert!(events.iter().any(|e| e["display_name"] == "Helper"));
    assert!(events.iter().all(|e| e["display_name"] != "Runs"));
}

#[test]
fn test_cli_directory_with_config_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::copy(
        get_test_fixture_path("calculator.unit.yaml"),
        temp_dir.path().join("calculator.unit.yaml"),
    )
    .unwrap();
    let config = temp_dir.path().join("options.json");
    fs::write(&config, r#"{"pre_enumerate_theories": false}"#).unwrap();

    let output = casefinder()
        .arg("--path")
        .arg(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let events = events(&output.stdout);
    // Adds, Doubles, Parses, Plots, Connects, Migrates, Runs
    assert_eq!(events.last().unwrap()["case_count"], 7);
}
