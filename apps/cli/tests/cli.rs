//! End-to-end tests for the `warden` binary

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn warden() -> Command {
    let mut cmd = Command::cargo_bin("warden").unwrap();
    cmd.env("WARDEN_LOGGING__LEVEL", "error");
    cmd
}

#[test]
fn probe_prints_each_step() {
    warden()
        .args(["probe", "--key", "job:42", "--lease", "5s"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acquire: acquired job:42 lease=5s"))
        .stdout(predicate::str::contains("ownership: held"))
        .stdout(predicate::str::contains("release: released"));
}

#[test]
fn contend_fail_fast_has_a_single_winner() {
    warden()
        .args([
            "contend", "--key", "job:42", "--workers", "6", "--attempts", "0", "--hold", "500ms",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("workers=6 acquired=1 timed_out=5 max_concurrent=1"));
}

#[test]
fn contend_waiting_workers_never_overlap() {
    warden()
        .args([
            "contend", "--key", "job:42", "--workers", "3", "--attempts", "200", "--delay",
            "10ms", "--hold", "20ms",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("acquired=3 timed_out=0 max_concurrent=1"));
}

#[test]
fn env_overrides_config_defaults() {
    warden()
        .env("WARDEN_LOCK__LEASE", "7s")
        .args(["probe", "--key", "k"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lease=7s"));
}

#[test]
fn flags_override_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[lock]\nlease = \"9s\"").unwrap();

    warden()
        .arg("--config")
        .arg(file.path())
        .args(["probe", "--key", "k"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lease=9s"));

    warden()
        .arg("--config")
        .arg(file.path())
        .args(["probe", "--key", "k", "--lease", "2s"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lease=2s"));
}

#[test]
fn invalid_config_fails() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[lock]\nlease = \"0s\"").unwrap();

    warden()
        .arg("--config")
        .arg(file.path())
        .args(["probe", "--key", "k"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lease must be positive"));
}

#[test]
fn empty_key_is_rejected() {
    warden()
        .args(["probe", "--key", ""])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lock key must not be empty"));
}

#[test]
fn unknown_log_format_is_a_usage_error() {
    warden()
        .args(["--log-format", "xml", "probe", "--key", "k"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log format"));
}
