//! Runs the `payroll-calculator` binary as a user would.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use pretty_assertions::assert_eq;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn calculator() -> Command {
    Command::new(env!("CARGO_BIN_EXE_payroll-calculator"))
}

fn run(
    city: &str,
    data: &Path,
    output: &Path,
    extra: &[&str],
) -> Output {
    calculator()
        .arg("-C")
        .arg(city)
        .arg("-c")
        .arg(fixture("config.toml"))
        .arg("-d")
        .arg(data)
        .arg("-o")
        .arg(output)
        .args(extra)
        .output()
        .expect("binary runs")
}

/// Output rows without the trailing timestamp column.
fn rows_without_timestamp(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| {
            let (amounts, _timestamp) = line.rsplit_once(',').expect("six columns");
            amounts.to_string()
        })
        .collect()
}

#[test]
fn test_help_exits_successfully() {
    let output = calculator().arg("--help").output().expect("binary runs");

    assert!(output.status.success());
    let usage = String::from_utf8_lossy(&output.stdout);
    assert!(usage.contains("--city"));
    assert!(usage.contains("--queue-capacity"));
}

#[test]
fn test_missing_arguments_fail() {
    let output = calculator().arg("-C").arg("TEST").output().expect("binary runs");

    assert!(!output.status.success());
}

#[test]
fn test_run_writes_results() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results.csv");

    let output = run("TEST", &fixture("userdata.csv"), &results, &[]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let contents = std::fs::read_to_string(&results).unwrap();
    assert_eq!(
        rows_without_timestamp(&contents),
        vec![
            "E1,10000,1050.00,535.00,8415.00",
            "E2,3000,315.00,0.00,2685.00",
            "E3,1000,315.00,0.00,685.00",
            "E4,50000,2100.00,10565.00,37335.00",
            "E5,7777,816.59,241.04,6719.37",
        ]
    );
}

#[test]
fn test_run_reads_stdin_with_many_workers() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results.csv");

    let mut child = calculator()
        .args(["-C", "test", "-c"])
        .arg(fixture("config.toml"))
        .args(["-d", "-", "-o"])
        .arg(&results)
        .args(["-w", "3", "-q", "1"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("binary starts");
    {
        let mut stdin = child.stdin.take().expect("stdin is piped");
        for i in 0..100 {
            writeln!(stdin, "E{i},{}", 3000 + i * 250).unwrap();
        }
    }
    let status = child.wait().unwrap();

    assert!(status.success());
    let contents = std::fs::read_to_string(&results).unwrap();
    assert_eq!(contents.lines().count(), 100);
}

#[test]
fn test_malformed_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results.csv");

    let output = run("TEST", &fixture("malformed.csv"), &results, &[]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 2"), "stderr: {stderr}");
    assert!(!results.exists(), "an aborted run must not leave partial output");
    let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 0, "the staging file is removed");
}

#[test]
fn test_failed_run_keeps_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results.csv");
    std::fs::write(&results, "previous\n").unwrap();

    let output = run("TEST", &fixture("malformed.csv"), &results, &[]);

    assert!(!output.status.success());
    assert_eq!(std::fs::read_to_string(&results).unwrap(), "previous\n");
}

#[test]
fn test_unknown_city_fails() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results.csv");

    let output = run("NOWHERE", &fixture("userdata.csv"), &results, &[]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NOWHERE"), "stderr: {stderr}");
    assert!(!results.exists(), "no output is created before the policy is known");
}

#[test]
fn test_zero_workers_fail() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results.csv");

    let output = run("TEST", &fixture("userdata.csv"), &results, &["-w", "0"]);

    assert!(!output.status.success());
}
