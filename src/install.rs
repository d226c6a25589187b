//! Dependency materialization via external package managers
//!
//! Each step is a shell command run to completion in its own directory and
//! its own process group. The command's exit status is authoritative. Steps
//! keep no state between runs, so a partially failed install is simply run
//! again from the first step.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use nix::sys::signal::Signal;
use tokio::process::Command;

use crate::config::Config;
use crate::error::{Result, SupervisorError};
use crate::process::signal_group;

/// One package-manager invocation
#[derive(Debug, Clone)]
pub struct InstallStep {
    /// Step name reported on failure
    pub name: String,
    /// Shell command to execute
    pub command: String,
    /// Directory the command runs in
    pub working_dir: PathBuf,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

impl InstallStep {
    pub fn new(name: impl Into<String>, command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            working_dir: working_dir.into(),
            env: Vec::new(),
        }
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    async fn run(&self) -> Result<()> {
        log::info!("[install:{}] {} (in {})", self.name, self.command, self.working_dir.display());

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.command);
        cmd.current_dir(&self.working_dir);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null()).process_group(0).kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SupervisorError::LaunchFailure {
            name: format!("install step '{}'", self.name),
            dir: self.working_dir.clone(),
            source,
        })?;
        // kills the whole group if this future is dropped mid-wait
        let mut guard = GroupGuard::new(&self.name, child.id());

        let status = child.wait().await?;
        guard.disarm();

        if !status.success() {
            log::error!("[install:{}] failed with {:?}", self.name, status.code());
            return Err(SupervisorError::InstallFailure {
                step: self.name.clone(),
                code: status.code(),
            });
        }

        log::info!("[install:{}] done", self.name);
        Ok(())
    }
}

/// Kills a step's whole process group if the step is abandoned mid-run.
///
/// Package managers fork build helpers and lifecycle scripts that
/// `kill_on_drop` alone would leave behind.
struct GroupGuard {
    step: String,
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(step: &str, pgid: Option<u32>) -> Self {
        Self {
            step: step.to_string(),
            pgid,
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            log::warn!("[install:{}] abandoned, killing process group {}", self.step, pgid);
            let _ = signal_group(pgid, Signal::SIGKILL);
        }
    }
}

/// Ordered list of install steps
#[derive(Debug, Clone, Default)]
pub struct Installer {
    steps: Vec<InstallStep>,
}

impl Installer {
    pub fn new(steps: Vec<InstallStep>) -> Self {
        Self { steps }
    }

    /// Backend step, then a frontend step when a frontend directory was found
    pub fn from_config(config: &Config, root: &Path, frontend_dir: Option<&Path>) -> Self {
        if !config.install.enabled {
            log::info!("Dependency installation disabled by config");
            return Self::default();
        }

        let mut steps = vec![InstallStep::new(
            "backend",
            &config.install.backend_command,
            root.join(&config.backend.dir),
        )];

        if let Some(dir) = frontend_dir {
            steps.push(InstallStep::new("frontend", &config.install.frontend_command, dir));
        }

        Self::new(steps)
    }

    pub fn steps(&self) -> &[InstallStep] {
        &self.steps
    }

    /// Run every step in order, stopping at the first failure
    pub async fn run(&self) -> Result<()> {
        for step in &self.steps {
            step.run().await?;
        }
        Ok(())
    }
}
