//! Integration tests of the command line: everything that happens before the engine runs,
//! and short runs that stop by themselves.
mod common;

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;

use common::output_strings;
use common::run::{command_run_agent, run_agent_tee, ChildGuard};
use indoc::indoc;
use pretty_assertions::assert_eq;

fn assert_failure(args: &[&str], expected_msg: &str) {
    let tmp_dir = tempfile::tempdir().unwrap();
    let output = run_agent_tee(args, tmp_dir.path()).unwrap();
    let (stdout, stderr) = output_strings(&output);
    assert_eq!(output.status.code(), Some(1), "unexpected status for {args:?}");
    assert!(
        stderr.contains(expected_msg) || stdout.contains(expected_msg),
        "the output of {args:?} should contain '{expected_msg}'"
    );
}

#[test]
fn help_lists_the_plugins() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let output = run_agent_tee(&["--help"], tmp_dir.path()).unwrap();
    assert!(output.status.success());
    let (stdout, _) = output_strings(&output);
    for expected in ["--input", "--prop", "Inputs", "dummy", "stdin", "Outputs", "stdout", "null"] {
        assert!(stdout.contains(expected), "help should contain '{expected}'");
    }
    // the hidden input is not listed
    assert!(!stdout.contains("  lib "));
}

#[test]
fn help_and_version_stop_before_validation() {
    let tmp_dir = tempfile::tempdir().unwrap();
    // without --help/--version, these args would fail (no input, bad flush)
    let cases: [&[&str]; 6] = [
        &["-f", "0", "-h"],
        &["--flush", "-5", "--version"],
        &["-f", "abc", "-h"],
        &["-i", "dummy", "-p", "x=1", "-o", "stdout", "-v"],
        &["-p", "malformed", "--help"],
        &["-v"],
    ];
    for args in cases {
        let output = run_agent_tee(args, tmp_dir.path()).unwrap();
        assert!(output.status.success(), "{args:?} should succeed");
    }

    let output = run_agent_tee(&["-v"], tmp_dir.path()).unwrap();
    let (stdout, _) = output_strings(&output);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_flag() {
    assert_failure(&["--not-a-flag"], "--not-a-flag");
}

#[test]
fn no_input() {
    assert_failure(&[], "no input defined");
    assert_failure(&["-o", "stdout"], "no input defined");
}

#[test]
fn invalid_flush_interval() {
    assert_failure(&["-i", "dummy", "-f", "0"], "invalid flush interval");
    assert_failure(&["-i", "dummy", "--flush", "-5"], "invalid flush interval");
    // not a number: converted to 0, then rejected by the validation
    assert_failure(&["-f", "abc", "-i", "dummy"], "invalid flush interval: 0");
    assert_failure(&["-i", "dummy", "--flush", "ten"], "invalid flush interval: 0");
}

#[test]
fn malformed_property() {
    assert_failure(&["-i", "dummy", "-p", "rate"], "malformed property 'rate'");
    // checked even without a target
    assert_failure(&["-p", "rate", "-i", "dummy"], "malformed property 'rate'");
}

#[test]
fn unknown_plugin() {
    assert_failure(&["-i", "dumy"], "did you mean 'dummy'?");
    assert_failure(&["-i", "dummy", "-o", "stdot"], "did you mean 'stdout'?");
    // inputs are not outputs
    assert_failure(&["-i", "stdout"], "unknown input plugin 'stdout'");
}

#[test]
fn unreadable_config_file() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let missing = tmp_dir.path().join("missing.toml");
    assert_failure(&["-c", missing.to_str().unwrap(), "-i", "dummy"], "config file unreadable");
}

#[test]
fn invalid_engine_settings() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let config = tmp_dir.path().join("brook.toml");
    std::fs::write(&config, "[engine]\nchannel_size = 0\n").unwrap();
    assert_failure(&["-c", config.to_str().unwrap(), "-i", "dummy"], "invalid engine settings");
}

#[test]
fn unknown_plugin_property() {
    assert_failure(&["-i", "dummy", "-p", "colour=blue"], "colour");
}

#[test]
fn stdin_to_stdout() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let mut cmd = command_run_agent(&["-i", "stdin", "-t", "lines", "-o", "stdout", "-p", "format=json", "-f", "1"])
        .unwrap();
    let child = cmd
        .current_dir(tmp_dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    let mut child = ChildGuard::new(child);

    let input = indoc! {"
        first line
        second line
    "};
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(input.as_bytes()).unwrap();
    // closing stdin stops the input, then the whole pipeline
    drop(stdin);

    let output = child.wait_with_tee(Duration::from_secs(20)).unwrap();
    assert!(output.status.success());
    let (stdout, _) = output_strings(&output);
    let records: Vec<(String, String)> = stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .map(|record| {
            let tag = record["tag"].as_str().unwrap_or_default().to_owned();
            let log = record["fields"]["log"].as_str().unwrap_or_default().to_owned();
            (tag, log)
        })
        .collect();
    assert_eq!(
        records,
        vec![
            (String::from("lines"), String::from("first line")),
            (String::from("lines"), String::from("second line")),
        ]
    );
}

#[test]
fn verbose_prints_the_setup() {
    let tmp_dir = tempfile::tempdir().unwrap();
    // stdin is closed, so the agent stops immediately after startup
    let output = run_agent_tee(&["-V", "-i", "stdin", "-p", "interval=100ms", "-o", "null", "-f", "2"], tmp_dir.path())
        .unwrap();
    assert!(output.status.success());
    let (stdout, _) = output_strings(&output);
    let expected = indoc! {"
        [service]
            flush interval : 2 seconds
            daemon         : off
            verbose        : on
            config file    : none
        [inputs]
            stdin.0 (stdin)
                interval = 100ms
        [outputs]
            null.0 (null)
    "};
    assert!(stdout.contains(expected), "unexpected output:\n{stdout}");
    assert!(stdout.starts_with("Brook v"));
}
