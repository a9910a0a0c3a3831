// tls-reach/tests/cli_integration.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::net::TcpListener;
use tempfile::{NamedTempFile, TempDir};

/// Command with config discovery pointed at an empty directory.
fn tls_reach() -> (Command, TempDir) {
    let home = TempDir::new().expect("Failed to create temp dir");
    let mut cmd = Command::cargo_bin("tls-reach").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("RUST_LOG");
    for var in ["TR_TIMEOUT", "TR_PARALLEL", "TR_PORT", "TR_NETWORKS", "TR_CONFIG"] {
        cmd.env_remove(var);
    }
    (cmd, home)
}

fn create_test_file(content: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("Failed to create temp file");
    fs::write(file.path(), content).expect("Failed to write to temp file");
    file
}

/// A port on 127.0.0.1 with nothing listening on it.
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn test_help_lists_flags() {
    let (mut cmd, _home) = tls_reach();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--timeout"))
        .stdout(predicate::str::contains("--parallel"))
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--networks"));
}

#[test]
fn test_invalid_parallel_is_rejected() {
    let (mut cmd, _home) = tls_reach();
    cmd.args(["--parallel", "0"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error: Parallel count"));
}

#[test]
fn test_missing_networks_file_is_fatal() {
    let (mut cmd, _home) = tls_reach();
    cmd.args(["--networks", "/nonexistent/allow.txt"]);

    cmd.assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("can't read ip filters file"));
}

#[test]
fn test_denied_addresses_are_not_probed() {
    let networks = create_test_file("# documentation range only\n192.0.2.0/24\n");
    let (mut cmd, _home) = tls_reach();
    cmd.arg("--networks")
        .arg(networks.path())
        .write_stdin("127.0.0.1\n");

    cmd.assert()
        .success()
        .stdout("127.0.0.1: denied by network filters: 127.0.0.1\n");
}

#[test]
fn test_empty_networks_file_denies_everything() {
    let networks = create_test_file("# nothing allowed\n");
    let (mut cmd, _home) = tls_reach();
    cmd.arg("-n")
        .arg(networks.path())
        .write_stdin("127.0.0.1 ::1\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "127.0.0.1: denied by network filters: 127.0.0.1",
        ))
        .stdout(predicate::str::contains("::1: denied by network filters: ::1"));
}

#[test]
fn test_closed_port_is_connect_failure() {
    let networks = create_test_file("127.0.0.1\n");
    let port = closed_port().to_string();
    let (mut cmd, _home) = tls_reach();
    cmd.args(["--port", &port, "--timeout", "2000", "--networks"])
        .arg(networks.path())
        .write_stdin("127.0.0.1");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with(
            "127.0.0.1: connect failed: 127.0.0.1 (",
        ));
}

#[test]
fn test_domains_from_files_keep_duplicates() {
    let networks = create_test_file("10.0.0.0/8\n");
    let first = create_test_file("127.0.0.1,127.0.0.1\n");
    let second = create_test_file("127.0.0.2\n");
    let (mut cmd, _home) = tls_reach();
    cmd.arg("-n")
        .arg(networks.path())
        .arg(first.path())
        .arg("/nonexistent/domains.txt")
        .arg(second.path());

    let output = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();
    let mut lines: Vec<&str> = stdout.lines().collect();
    lines.sort();

    assert_eq!(
        lines,
        vec![
            "127.0.0.1: denied by network filters: 127.0.0.1",
            "127.0.0.1: denied by network filters: 127.0.0.1",
            "127.0.0.2: denied by network filters: 127.0.0.2",
        ]
    );
}

#[test]
fn test_json_output() {
    let networks = create_test_file("192.0.2.0/24\n");
    let (mut cmd, _home) = tls_reach();
    cmd.args(["--json", "-n"])
        .arg(networks.path())
        .write_stdin("127.0.0.1\n");

    let output = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();
    let value: serde_json::Value = serde_json::from_str(stdout.trim_end()).unwrap();

    assert_eq!(value["domain"], "127.0.0.1");
    assert_eq!(value["outcomes"][0]["outcome"], "denied");
    assert_eq!(value["outcomes"][0]["addr"], "127.0.0.1");
}

#[test]
fn test_summary_goes_to_stderr() {
    let networks = create_test_file("192.0.2.0/24\n");
    let (mut cmd, _home) = tls_reach();
    cmd.args(["--summary", "-n"])
        .arg(networks.path())
        .write_stdin("127.0.0.1\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("denied by network filters"))
        .stdout(predicate::str::contains("reachable").not())
        .stderr(predicate::str::contains("0 reachable"));
}

#[test]
fn test_config_file_sets_networks() {
    let (mut cmd, home) = tls_reach();
    fs::write(home.path().join("allow.txt"), "192.0.2.0/24\n").unwrap();
    fs::write(
        home.path().join("tls-reach.toml"),
        "[defaults]\nnetworks = \"allow.txt\"\nparallel = 2\n",
    )
    .unwrap();
    cmd.write_stdin("127.0.0.1\n");

    cmd.assert()
        .success()
        .stdout("127.0.0.1: denied by network filters: 127.0.0.1\n");
}

#[test]
fn test_env_networks_overridden_by_flag() {
    let deny = create_test_file("192.0.2.0/24\n");
    let (mut cmd, _home) = tls_reach();
    cmd.env("TR_NETWORKS", "/nonexistent/allow.txt")
        .arg("--networks")
        .arg(deny.path())
        .write_stdin("127.0.0.1\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("denied by network filters"));
}

#[test]
fn test_invalid_config_file_is_fatal() {
    let config = create_test_file("[defaults]\nparallel = 0\n");
    let (mut cmd, _home) = tls_reach();
    cmd.arg("--config").arg(config.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config file"));
}
