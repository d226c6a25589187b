//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use devstack::config::{Config, ReadinessConfig};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Project tree with a backend directory and an env file
pub fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("backend")).unwrap();
    fs::write(dir.path().join("backend/requirements.txt"), "fastapi\nuvicorn\n").unwrap();
    fs::write(dir.path().join(".env"), "ANTHROPIC_API_KEY=test\n").unwrap();
    dir
}

pub fn add_frontend(root: &Path, name: &str) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("package.json"), "{\"name\": \"frontend\"}").unwrap();
    dir
}

/// Config whose services are plain `sleep` processes and whose health
/// endpoint is `127.0.0.1:<port>`
pub fn test_config(port: u16) -> Config {
    let mut config = Config::default();
    config.backend.command = "sleep 30".to_string();
    config.backend.host = "127.0.0.1".to_string();
    config.backend.port = port;
    config.backend.required_files = vec![PathBuf::from("requirements.txt")];
    config.frontend.command = "sleep 30".to_string();
    config.preflight.required_tools = vec!["sh".to_string()];
    config.preflight.frontend_tools = vec!["sh".to_string()];
    config.install.backend_command = "true".to_string();
    config.install.frontend_command = "true".to_string();
    config.readiness = ReadinessConfig {
        initial_delay_ms: 0,
        interval_ms: 20,
        max_interval_ms: 50,
        multiplier: 2.0,
        max_attempts: 5,
        attempt_timeout_ms: 500,
        deadline_ms: 3000,
    };
    config.shutdown.grace_period_ms = 2000;
    config.env_files = vec![PathBuf::from(".env")];
    config
}

/// Minimal HTTP responder standing in for the backend's health endpoint
pub async fn spawn_health_responder() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let body = "{\"status\":\"healthy\"}";
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
    port
}

/// A port nothing listens on
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Running and not a zombie, read from `/proc`
pub fn process_running(pid: u32) -> bool {
    match fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z"),
        Err(_) => false,
    }
}

/// Poll until `pid` stops running or `timeout` passes
pub async fn wait_until_gone(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while process_running(pid) {
        if start.elapsed() > timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    true
}
