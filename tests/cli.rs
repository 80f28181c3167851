use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn config_path(file_name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("config")
        .join(file_name)
}

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gspi_loopback"))
        .args(args)
        .output()
        .expect("failed to spawn gspi_loopback")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn sim_config_passes() {
    let path = config_path("gspi_sim.toml");
    let output = run_cli(&[path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stdout(&output).trim(),
        "run 1: PASS [Transfer -> Send -> Receive -> Completed]"
    );
}

#[test]
fn transfer_only_prints_one_line_per_run() {
    let path = config_path("gspi_sim_transfer_only.toml");
    let output = run_cli(&[path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|l| l.ends_with("PASS [Transfer -> Completed]")));
}

#[test]
fn send_fault_exits_with_failure() {
    let path = config_path("gspi_sim_send_fault.toml");
    let output = run_cli(&[path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains("FAIL [Transfer -> Send -> Completed]"));
    assert!(out.contains("send call failed"));
}

#[test]
fn missing_argument_prints_usage() {
    let output = run_cli(&[]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage:"));
}

#[test]
fn rejects_non_toml_path() {
    let output = run_cli(&["settings.json"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn unreadable_config_is_a_usage_error() {
    let path = config_path("does_not_exist.toml");
    let output = run_cli(&[path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("config error"));
}

#[test]
fn zero_runs_is_rejected() {
    let path = std::env::temp_dir().join(format!("gspi_zero_runs_{}.toml", std::process::id()));
    std::fs::write(&path, "[mode]\ntype = \"sim\"\n\n[test]\nruns = 0\n").unwrap();
    let output = run_cli(&[path.to_str().unwrap()]);
    std::fs::remove_file(&path).unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("test.runs"));
    assert!(stdout(&output).is_empty());
}
