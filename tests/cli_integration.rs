//! CLI integration tests using assert_cmd to exercise the actual binary.

mod common;

use std::fs;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use predicates::prelude::*;
use tempfile::TempDir;

use common::{project, spawn_health_responder, test_config};

/// Binary with HOME and XDG dirs pointed into `home` so logs and config
/// lookups stay out of the real user directories
fn devstack(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("devstack").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1");
    cmd
}

fn write_config(dir: &Path, config: &devstack::config::Config) -> std::path::PathBuf {
    let path = dir.join("devstack.yml");
    fs::write(&path, serde_yaml::to_string(config).unwrap()).unwrap();
    path
}

#[test]
fn cli_help_lists_flags() {
    let home = TempDir::new().unwrap();

    devstack(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--root"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn cli_missing_config_file_exits_one() {
    let home = TempDir::new().unwrap();

    devstack(home.path())
        .args(["-c", "/nonexistent/devstack.yml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn cli_missing_tool_exits_one_without_starting_anything() {
    let home = TempDir::new().unwrap();
    let root = project();
    let mut config = test_config(1);
    config.preflight.required_tools = vec!["devstack-no-such-tool-xyz123".to_string()];
    config.install.backend_command = "touch installed.marker".to_string();
    let config_path = write_config(home.path(), &config);

    devstack(home.path())
        .arg("-c")
        .arg(&config_path)
        .arg("--root")
        .arg(root.path())
        .timeout(Duration::from_secs(20))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Missing dependency"))
        .stdout(predicate::str::contains("devstack-no-such-tool-xyz123"));

    assert!(!root.path().join("backend/installed.marker").exists());
}

#[test]
fn cli_missing_backend_file_exits_one() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    fs::create_dir(root.path().join("backend")).unwrap();
    let config_path = write_config(home.path(), &test_config(1));

    devstack(home.path())
        .arg("-c")
        .arg(&config_path)
        .arg("--root")
        .arg(root.path())
        .timeout(Duration::from_secs(20))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("requirements.txt"));
}

#[test]
fn cli_logs_to_data_dir() {
    let home = TempDir::new().unwrap();

    devstack(home.path())
        .args(["-c", "/nonexistent/devstack.yml"])
        .assert()
        .failure();

    assert!(home.path().join("data/devstack/logs/devstack.log").exists());
}

#[tokio::test]
async fn cli_sigterm_stops_services_and_exits_zero() {
    let home = TempDir::new().unwrap();
    let root = project();
    let port = spawn_health_responder().await;
    let mut config = test_config(port);
    config.backend.command = "echo $$ > backend.pid; exec sleep 30".to_string();
    let config_path = write_config(home.path(), &config);

    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("devstack"))
        .arg("-c")
        .arg(&config_path)
        .arg("--root")
        .arg(root.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("NO_COLOR", "1")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // wait for the backend to come up
    let pid_file = root.path().join("backend/backend.pid");
    let started = Instant::now();
    while !pid_file.exists() && started.elapsed() < Duration::from_secs(10) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(pid_file.exists(), "backend never started");
    // past the readiness gate and into the wait
    tokio::time::sleep(Duration::from_millis(1000)).await;

    signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();

    let deadline = Instant::now() + Duration::from_secs(15);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("devstack did not exit after SIGTERM");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    assert_eq!(status.code(), Some(0));

    let backend_pid: i32 = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
    assert!(signal::kill(Pid::from_raw(backend_pid), None).is_err());
}
