//! devstack - bootstrap and supervise a local backend/frontend dev stack
//!
//! devstack checks prerequisites, installs dependencies through the project's
//! package managers, starts the backend, waits until it answers, starts the
//! frontend when there is one, and stops everything it started on Ctrl+C.

pub mod config;
pub mod discovery;
pub mod error;
pub mod install;
pub mod preflight;
pub mod process;
pub mod readiness;
pub mod signals;
pub mod supervisor;

pub use error::{Result, SupervisorError};
pub use supervisor::{RunMode, RunSummary, Supervisor, SupervisorState};
