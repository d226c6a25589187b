//! Child process handle - one spawned service and how to stop it

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::error::{Result, SupervisorError};

/// What to run for a service
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub name: String,
    /// Shell command line
    pub command: String,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            working_dir: working_dir.into(),
            env: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// How a handle ended up stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// The process had exited before we signaled it
    AlreadyExited,
    /// Exited within the grace period after SIGTERM
    Exited(ExitStatus),
    /// Needed SIGKILL
    Killed,
}

/// A running service owned by the supervisor.
///
/// The child leads its own process group so signals reach anything the
/// service command forks (`sh -c`, npm scripts, reloaders).
#[derive(Debug)]
pub struct ChildHandle {
    name: String,
    pid: u32,
    command: String,
    working_dir: PathBuf,
    child: Child,
}

impl ChildHandle {
    /// Spawn `spec` without waiting for it. Output is forwarded to the log.
    pub fn spawn(spec: &LaunchSpec) -> Result<Self> {
        let launch_failure = |source: std::io::Error| SupervisorError::LaunchFailure {
            name: spec.name.clone(),
            dir: spec.working_dir.clone(),
            source,
        };

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&spec.command);
        cmd.current_dir(&spec.working_dir);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(launch_failure)?;
        let pid = child.id().ok_or_else(|| {
            launch_failure(std::io::Error::other("process exited before its pid could be read"))
        })?;

        if let Some(stdout) = child.stdout.take() {
            forward_output(spec.name.clone(), stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(spec.name.clone(), stderr, true);
        }

        log::info!("[{}] started (PID: {}) in {}", spec.name, pid, spec.working_dir.display());

        Ok(Self {
            name: spec.name.clone(),
            pid,
            command: spec.command.clone(),
            working_dir: spec.working_dir.clone(),
            child,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn working_dir(&self) -> &PathBuf {
        &self.working_dir
    }

    /// True while the direct child has not exited
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Signal the whole process group.
    ///
    /// Returns false when the group no longer exists.
    pub fn signal(&self, sig: Signal) -> Result<bool> {
        signal_group(self.pid, sig)
    }

    /// SIGKILL whatever is left in the group once the leader is gone.
    ///
    /// The leader has been reaped at this point, so only signal while the
    /// group still has members holding its id.
    fn kill_leftovers(&self) {
        if group_alive(self.pid) {
            tracing::debug!(name = %self.name, pgid = self.pid, "Killing leftover group members");
            let _ = self.signal(Signal::SIGKILL);
        }
    }

    /// SIGTERM, wait up to `grace`, then SIGKILL. Always reaps the child.
    pub async fn terminate(&mut self, grace: Duration) -> TerminateOutcome {
        if let Ok(Some(_)) = self.child.try_wait() {
            self.kill_leftovers();
            tracing::debug!(name = %self.name, pid = self.pid, "Already exited");
            return TerminateOutcome::AlreadyExited;
        }

        if let Err(e) = self.signal(Signal::SIGTERM) {
            log::warn!("[{}] SIGTERM failed: {}", self.name, e);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.kill_leftovers();
                tracing::info!(name = %self.name, pid = self.pid, status = %status, "Stopped");
                TerminateOutcome::Exited(status)
            }
            _ => {
                tracing::warn!(name = %self.name, pid = self.pid, "Grace period elapsed, sending SIGKILL");
                let _ = self.signal(Signal::SIGKILL);
                let _ = self.child.kill().await;
                TerminateOutcome::Killed
            }
        }
    }

    /// Synchronous last-resort kill, used when the owner is dropped
    pub(crate) fn force_kill(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        let _ = self.signal(Signal::SIGKILL);
        let _ = self.child.start_kill();
    }
}

/// Whether a process with `pid` exists (zombies included)
pub fn process_alive(pid: u32) -> bool {
    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(e) => e == Errno::EPERM,
    }
}

/// Send `sig` to every process in group `pgid`.
///
/// Returns false when the group no longer exists.
pub fn signal_group(pgid: u32, sig: Signal) -> Result<bool> {
    match signal::killpg(Pid::from_raw(pgid as i32), sig) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(SupervisorError::Io(e.into())),
    }
}

/// Whether any process is still a member of group `pgid`
pub fn group_alive(pgid: u32) -> bool {
    match signal::killpg(Pid::from_raw(pgid as i32), None) {
        Ok(()) => true,
        Err(e) => e == Errno::EPERM,
    }
}

/// Running and not a zombie, read from `/proc`
#[cfg(test)]
pub(crate) fn process_running(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // state is the first field after the parenthesised command name
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z"),
        Err(_) => false,
    }
}

/// Poll until `pid` stops running or `timeout` passes
#[cfg(test)]
pub(crate) async fn wait_until_gone(pid: u32, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while process_running(pid) {
        if start.elapsed() > timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    true
}

fn forward_output<R>(name: String, stream: R, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.is_empty() {
                continue;
            }
            if is_stderr && (line.contains("ERROR") || line.contains("Exception") || line.contains("Traceback")) {
                log::error!("[{} Error] {}", name, line);
            } else {
                log::info!("[{}] {}", name, line);
            }
        }
    });
}
