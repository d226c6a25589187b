//! Child process management
//!
//! - `ChildHandle`: one spawned service in its own process group
//! - `ChildRegistry`: the supervisor's collection of live handles

pub mod handle;
pub mod registry;

pub use handle::{ChildHandle, LaunchSpec, TerminateOutcome, group_alive, process_alive, signal_group};
pub use registry::ChildRegistry;
