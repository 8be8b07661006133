//! Integration tests of the shutdown on termination signals.
mod common;

use std::time::Duration;

use common::output_strings;
use common::run::{send_signal, spawn_agent};

const SIGNAL_MESSAGE: &str = "[engine] caught signal";

/// Runs the agent, sends `signals` after a while, and returns its stdout and stderr.
fn run_until_signal(args: &[&str], signals: &[libc::c_int]) -> (String, String) {
    let tmp_dir = tempfile::tempdir().unwrap();
    let mut child = spawn_agent(args, tmp_dir.path()).unwrap();

    // let the engine start
    std::thread::sleep(Duration::from_millis(1500));
    assert!(
        child.try_wait().unwrap().is_none(),
        "the agent should still be running before the signal"
    );
    for sig in signals {
        send_signal(&child, *sig).unwrap();
    }

    let output = child.wait_with_tee(Duration::from_secs(15)).unwrap();
    assert!(
        output.status.success(),
        "the agent should exit in a controlled way, but had status {}",
        output.status
    );
    output_strings(&output)
}

#[test]
fn every_termination_signal_stops_the_agent() {
    for sig in [libc::SIGTERM, libc::SIGINT, libc::SIGHUP, libc::SIGQUIT] {
        let (_, stderr) = run_until_signal(&["-i", "dummy", "-o", "null", "-f", "1"], &[sig]);
        assert_eq!(stderr.matches(SIGNAL_MESSAGE).count(), 1, "signal {sig}: unexpected stderr\n{stderr}");
    }
}

#[test]
fn second_signal_has_no_effect() {
    let (_, stderr) = run_until_signal(&["-i", "dummy", "-o", "null"], &[libc::SIGTERM, libc::SIGINT]);
    assert_eq!(stderr.matches(SIGNAL_MESSAGE).count(), 1, "unexpected stderr\n{stderr}");
}

#[test]
fn records_are_flushed_before_exit() {
    // The flush interval is longer than the run: the records are written by the last flush.
    let (stdout, _) = run_until_signal(
        &["-i", "dummy", "-p", r#"message={"msg":"still here"}"#, "-o", "stdout", "-f", "60"],
        &[libc::SIGTERM],
    );
    assert!(stdout.contains(r#"{"msg":"still here"}"#), "unexpected stdout\n{stdout}");
}

#[test]
fn daemon_mode() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let mut parent = spawn_agent(&["-d", "-i", "dummy", "-o", "null"], tmp_dir.path()).unwrap();
    let output = parent.wait_with_tee(Duration::from_secs(15)).unwrap();
    assert!(output.status.success());

    let (stdout, _) = output_strings(&output);
    let pid: i32 = stdout
        .lines()
        .find_map(|line| line.strip_prefix("Brook is running in the background, pid "))
        .and_then(|pid| pid.trim().parse().ok())
        .unwrap_or_else(|| panic!("no pid in the output of the parent:\n{stdout}"));

    // the background process runs until it is stopped
    std::thread::sleep(Duration::from_millis(500));
    let res = unsafe { libc::kill(pid, libc::SIGTERM) };
    assert_eq!(res, 0, "the background process {pid} should be alive");
}
