//! Process supervisor - preflight, install, launch, gate, wait, teardown
//!
//! The supervisor drives a linear state machine:
//!
//! ```text
//! Idle -> PreflightChecked -> DependenciesInstalled -> BackendStarting
//!      -> BackendReady -> [FrontendStarting] -> Running -> Terminating -> Stopped
//! ```
//!
//! Every process it starts goes through its `ChildRegistry`, so teardown has
//! a single source of truth and dropping the supervisor can never orphan a
//! child.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::*;

use crate::config::Config;
use crate::discovery::{discover_env_file, discover_frontend};
use crate::error::{Result, SupervisorError};
use crate::install::Installer;
use crate::preflight::Preflight;
use crate::process::{ChildRegistry, LaunchSpec, TerminateOutcome};
use crate::readiness::{BackoffPolicy, HttpProbe, Probe, wait_for_readiness};

pub const BACKEND: &str = "backend";
pub const FRONTEND: &str = "frontend";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    PreflightChecked,
    DependenciesInstalled,
    BackendStarting,
    BackendReady,
    FrontendStarting,
    Running,
    Terminating,
    Stopped,
}

impl SupervisorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SupervisorState::Stopped)
    }

    /// Whether `next` is a legal successor of this state.
    ///
    /// Any live state may fail straight to `Stopped` or be interrupted into
    /// `Terminating`.
    pub fn can_transition_to(&self, next: SupervisorState) -> bool {
        use SupervisorState::*;
        match (self, next) {
            (Stopped, _) => false,
            (Idle, PreflightChecked)
            | (PreflightChecked, DependenciesInstalled)
            | (DependenciesInstalled, BackendStarting)
            | (BackendStarting, BackendReady)
            | (BackendReady, FrontendStarting)
            | (BackendReady, Running)
            | (FrontendStarting, Running) => true,
            (Terminating, Terminating) => false,
            (_, Terminating) | (_, Stopped) => true,
            _ => false,
        }
    }
}

/// Which services ended up running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    BackendOnly,
    Full,
}

/// What happened during a completed run
#[derive(Debug)]
pub struct RunSummary {
    /// `None` when a signal arrived before startup finished
    pub mode: Option<RunMode>,
    /// Processes ever launched
    pub spawned: usize,
    /// Teardown outcome per service
    pub stopped: Vec<(String, TerminateOutcome)>,
}

pub struct Supervisor {
    config: Config,
    root: PathBuf,
    state: SupervisorState,
    registry: ChildRegistry,
    frontend_dir: Option<PathBuf>,
    probe: Box<dyn Probe>,
    probe_attempts: u32,
}

impl Supervisor {
    pub fn new(config: Config, root: impl Into<PathBuf>) -> Self {
        let probe = HttpProbe::new(
            config.health_url(),
            Duration::from_millis(config.readiness.attempt_timeout_ms),
        );
        Self {
            config,
            root: root.into(),
            state: SupervisorState::Idle,
            registry: ChildRegistry::new(),
            frontend_dir: None,
            probe: Box::new(probe),
            probe_attempts: 0,
        }
    }

    /// Replace the readiness probe
    pub fn with_probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn registry(&self) -> &ChildRegistry {
        &self.registry
    }

    pub fn frontend_dir(&self) -> Option<&Path> {
        self.frontend_dir.as_deref()
    }

    fn transition(&mut self, next: SupervisorState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(SupervisorError::InvalidTransition { from: self.state, to: next });
        }
        log::info!("State: {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn grace_period(&self) -> Duration {
        Duration::from_millis(self.config.shutdown.grace_period_ms)
    }

    /// Verify tools and files. Discovers the frontend first so its tools are
    /// only required when it will actually be started.
    pub fn check_preconditions(&mut self) -> Result<()> {
        println!("{}", "Checking prerequisites...".cyan());

        self.frontend_dir = discover_frontend(
            &self.root,
            &self.config.frontend.candidates,
            &self.config.frontend.marker_file,
        );
        match &self.frontend_dir {
            Some(dir) => log::info!("Frontend found at {}", dir.display()),
            None => log::info!("No frontend directory found, backend-only mode"),
        }

        match discover_env_file(&self.root, &self.config.env_files) {
            Some(path) => log::info!("Using env file {}", path.display()),
            None => {
                let tried: Vec<String> = self.config.env_files.iter().map(|p| p.display().to_string()).collect();
                println!(
                    "{} no .env file found (looked in {}); the backend may be missing secrets such as its API key",
                    "Warning:".yellow(),
                    tried.join(", ")
                );
            }
        }

        Preflight::from_config(&self.config, &self.root, self.frontend_dir.as_deref()).check()?;
        self.transition(SupervisorState::PreflightChecked)
    }

    /// Run the configured package-manager steps from scratch
    pub async fn materialize_dependencies(&mut self) -> Result<()> {
        println!("{}", "Installing dependencies...".cyan());
        Installer::from_config(&self.config, &self.root, self.frontend_dir.as_deref())
            .run()
            .await?;
        self.transition(SupervisorState::DependenciesInstalled)
    }

    /// Spawn the backend and return immediately
    pub fn launch_backend(&mut self) -> Result<u32> {
        self.transition(SupervisorState::BackendStarting)?;
        let spec = LaunchSpec::new(
            BACKEND,
            &self.config.backend.command,
            self.root.join(&self.config.backend.dir),
        )
        .env("PYTHONUNBUFFERED", "1")
        .env("HOST", &self.config.backend.bind)
        .env("PORT", self.config.backend.port.to_string());

        let pid = self.registry.launch(&spec)?;
        println!("{} backend (PID: {})", "Started".green(), pid);
        Ok(pid)
    }

    /// Poll the backend until it answers or the budget runs out
    pub async fn wait_for_readiness(&mut self) -> Result<bool> {
        println!("{} {}", "Waiting for backend at".cyan(), self.probe.target());
        let policy = BackoffPolicy::from(&self.config.readiness);
        let outcome = wait_for_readiness(self.probe.as_ref(), &policy).await;
        self.probe_attempts = outcome.attempts;

        if !outcome.ready {
            log::error!(
                "Backend not ready after {} attempts ({}ms)",
                outcome.attempts,
                outcome.elapsed.as_millis()
            );
            return Ok(false);
        }

        log::info!("Backend ready after {} attempts", outcome.attempts);
        self.transition(SupervisorState::BackendReady)?;
        Ok(true)
    }

    /// Start the frontend if one was discovered, then enter `Running`
    pub fn launch_frontend(&mut self) -> Result<Option<u32>> {
        let Some(dir) = self.frontend_dir.clone() else {
            self.transition(SupervisorState::Running)?;
            return Ok(None);
        };

        self.transition(SupervisorState::FrontendStarting)?;
        let spec = LaunchSpec::new(FRONTEND, &self.config.frontend.command, dir)
            .env("PORT", self.config.frontend.port.to_string());
        let pid = self.registry.launch(&spec)?;
        println!("{} frontend (PID: {})", "Started".green(), pid);

        self.transition(SupervisorState::Running)?;
        Ok(Some(pid))
    }

    /// Preflight through `Running`. On failure every launched child has been
    /// stopped and the state is `Stopped`.
    pub async fn startup(&mut self) -> Result<RunMode> {
        match self.startup_steps().await {
            Ok(mode) => Ok(mode),
            Err(e) => {
                println!("{} {}", "Error:".red(), e);
                let stopped = self.registry.terminate_all(self.grace_period()).await;
                for (name, outcome) in stopped {
                    log::info!("[{}] stopped after startup failure: {:?}", name, outcome);
                }
                self.state = SupervisorState::Stopped;
                Err(e)
            }
        }
    }

    async fn startup_steps(&mut self) -> Result<RunMode> {
        self.check_preconditions()?;
        self.materialize_dependencies().await?;
        self.launch_backend()?;

        if !self.wait_for_readiness().await? {
            return Err(SupervisorError::BackendUnready {
                endpoint: self.probe.target(),
                attempts: self.probe_attempts,
            });
        }

        match self.launch_frontend()? {
            Some(_) => Ok(RunMode::Full),
            None => Ok(RunMode::BackendOnly),
        }
    }

    /// Block until `shutdown` resolves
    pub async fn await_termination<F: Future<Output = ()>>(&mut self, shutdown: F) {
        shutdown.await;
        log::info!("Shutdown requested in state {:?}", self.state);
    }

    /// Signal every tracked child and move to `Stopped`.
    ///
    /// Safe to call repeatedly; children that already exited are tolerated.
    pub async fn teardown(&mut self) -> Vec<(String, TerminateOutcome)> {
        if !self.state.is_terminal() && self.state != SupervisorState::Terminating {
            self.state = SupervisorState::Terminating;
        }
        if !self.registry.is_empty() {
            println!("{}", "Shutting down services...".yellow());
        }

        let stopped = self.registry.terminate_all(self.grace_period()).await;
        self.state = SupervisorState::Stopped;
        stopped
    }

    /// Full lifecycle. `shutdown` resolving at any point, startup included,
    /// leads to teardown and a successful return.
    pub async fn run<F: Future<Output = ()>>(mut self, shutdown: F) -> Result<RunSummary> {
        tokio::pin!(shutdown);

        let started = tokio::select! {
            result = self.startup() => Some(result),
            _ = &mut shutdown => None,
        };

        let mode = match started {
            Some(Ok(mode)) => {
                self.print_banner(mode);
                self.await_termination(&mut shutdown).await;
                Some(mode)
            }
            Some(Err(e)) => return Err(e),
            None => {
                log::info!("Shutdown requested during startup ({:?})", self.state);
                None
            }
        };

        let stopped = self.teardown().await;
        println!("{}", "All services stopped".green());

        Ok(RunSummary {
            mode,
            spawned: self.registry.total_spawned(),
            stopped,
        })
    }

    fn print_banner(&self, mode: RunMode) {
        println!();
        println!("{}", "Services running".green().bold());
        println!("  Backend:  {}", self.config.backend_url());
        println!("  API docs: {}", self.config.docs_url());
        match mode {
            RunMode::Full => {
                println!("  Frontend: {}", self.config.frontend_url());
                println!("  Analysis: {}", self.config.analysis_url());
            }
            RunMode::BackendOnly => {
                let looked_in = self
                    .config
                    .frontend
                    .candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                let marker = &self.config.frontend.marker_file;
                if marker.is_empty() {
                    println!("{} no frontend directory found (looked in: {})", "Note:".yellow(), looked_in);
                } else {
                    println!(
                        "{} no frontend found (a directory only counts if it holds {}; looked in: {})",
                        "Note:".yellow(),
                        marker,
                        looked_in
                    );
                    println!("  Set frontend.marker_file to \"\" to accept any existing candidate directory");
                }
                println!("  To run one manually: cd <frontend> && {}", self.config.frontend.command);
            }
        }
        println!("{}", "Press Ctrl+C to stop".dimmed());
    }
}
