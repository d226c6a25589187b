//! Error types for devstack
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

use crate::supervisor::SupervisorState;

/// All error types that can stop the supervisor
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required tool or file is absent
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// An install step exited nonzero
    #[error("Install failed: step '{step}' exited with {}", describe_code(.code))]
    InstallFailure { step: String, code: Option<i32> },

    /// The backend never answered its readiness probe
    #[error("Backend not ready: no response from {endpoint} after {attempts} attempts")]
    BackendUnready { endpoint: String, attempts: u32 },

    /// Spawning a child process failed
    #[error("Failed to launch {name} in {}: {source}", .dir.display())]
    LaunchFailure {
        name: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Supervisor state machine was driven out of order
    #[error("Invalid transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SupervisorState, to: SupervisorState },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "no exit code (killed by signal)".to_string(),
    }
}

/// Result type alias for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;
