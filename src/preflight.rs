//! Preflight checks - verify tools and files before any side effect
//!
//! Preconditions are evaluated in declaration order and the first one that
//! does not hold is reported. Nothing here spawns or writes anything.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Result, SupervisorError};

/// A single fact that must hold before the supervisor launches anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Executable that must be resolvable on PATH
    Tool(String),
    /// File that must exist
    File(PathBuf),
}

impl Precondition {
    pub fn tool(name: impl Into<String>) -> Self {
        Precondition::Tool(name.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Precondition::File(path.into())
    }

    /// Check whether this precondition holds right now
    pub fn is_satisfied(&self) -> bool {
        match self {
            Precondition::Tool(name) => which::which(name).is_ok(),
            Precondition::File(path) => path.is_file(),
        }
    }

    /// Human-readable description used in the failure message
    pub fn describe(&self) -> String {
        match self {
            Precondition::Tool(name) => format!("tool '{}' not found on PATH", name),
            Precondition::File(path) => format!("required file {} does not exist", path.display()),
        }
    }
}

/// Ordered set of preconditions
#[derive(Debug, Clone, Default)]
pub struct Preflight {
    preconditions: Vec<Precondition>,
}

impl Preflight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    /// Build the precondition set for a project rooted at `root`.
    ///
    /// Frontend tools are only required when a frontend directory was found.
    pub fn from_config(config: &Config, root: &Path, frontend_dir: Option<&Path>) -> Self {
        let mut preflight = Self::new();

        for tool in &config.preflight.required_tools {
            preflight = preflight.require(Precondition::tool(tool));
        }

        let backend_dir = root.join(&config.backend.dir);
        for file in &config.backend.required_files {
            preflight = preflight.require(Precondition::file(backend_dir.join(file)));
        }

        if frontend_dir.is_some() {
            for tool in &config.preflight.frontend_tools {
                preflight = preflight.require(Precondition::tool(tool));
            }
        }

        preflight
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    /// Fail with the first unsatisfied precondition
    pub fn check(&self) -> Result<()> {
        match self.preconditions.iter().find(|p| !p.is_satisfied()) {
            Some(missing) => Err(SupervisorError::MissingDependency(missing.describe())),
            None => Ok(()),
        }
    }
}
