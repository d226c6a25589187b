//! Supervisor-owned registry of live child handles
//!
//! The registry is the only place child processes are tracked. Teardown works
//! from it, and dropping it kills whatever is still registered.

use std::time::Duration;

use futures::future::join_all;

use crate::error::Result;
use crate::process::handle::{ChildHandle, LaunchSpec, TerminateOutcome};

#[derive(Debug, Default)]
pub struct ChildRegistry {
    handles: Vec<ChildHandle>,
    spawned: usize,
}

impl ChildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `spec` and track it. Returns the child's pid.
    pub fn launch(&mut self, spec: &LaunchSpec) -> Result<u32> {
        let handle = ChildHandle::spawn(spec)?;
        let pid = handle.pid();
        self.handles.push(handle);
        self.spawned += 1;
        Ok(pid)
    }

    /// Number of handles still tracked
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Number of processes ever launched through this registry
    pub fn total_spawned(&self) -> usize {
        self.spawned
    }

    pub fn names(&self) -> Vec<&str> {
        self.handles.iter().map(|h| h.name()).collect()
    }

    pub fn pids(&self) -> Vec<u32> {
        self.handles.iter().map(|h| h.pid()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ChildHandle> {
        self.handles.iter().find(|h| h.name() == name)
    }

    /// Stop and forget a single handle
    pub async fn terminate(&mut self, name: &str, grace: Duration) -> Option<TerminateOutcome> {
        let index = self.handles.iter().position(|h| h.name() == name)?;
        let mut handle = self.handles.remove(index);
        Some(handle.terminate(grace).await)
    }

    /// Stop every tracked handle concurrently and empty the registry.
    ///
    /// Calling this on an empty registry is a no-op.
    pub async fn terminate_all(&mut self, grace: Duration) -> Vec<(String, TerminateOutcome)> {
        let outcomes = join_all(self.handles.iter_mut().map(|h| h.terminate(grace))).await;
        self.handles
            .drain(..)
            .zip(outcomes)
            .map(|(h, outcome)| (h.name().to_string(), outcome))
            .collect()
    }
}

impl Drop for ChildRegistry {
    fn drop(&mut self) {
        for handle in &mut self.handles {
            log::warn!("[{}] still registered at drop, killing PID {}", handle.name(), handle.pid());
            handle.force_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::handle::process_alive;
    use tempfile::TempDir;

    const GRACE: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_launch_tracks_handles() {
        let dir = TempDir::new().unwrap();
        let mut registry = ChildRegistry::new();
        assert!(registry.is_empty());

        registry.launch(&LaunchSpec::new("backend", "sleep 30", dir.path())).unwrap();
        registry.launch(&LaunchSpec::new("frontend", "sleep 30", dir.path())).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["backend", "frontend"]);
        assert!(registry.get("frontend").is_some());

        registry.terminate_all(GRACE).await;
    }

    #[tokio::test]
    async fn test_terminate_all_stops_everything() {
        let dir = TempDir::new().unwrap();
        let mut registry = ChildRegistry::new();
        registry.launch(&LaunchSpec::new("backend", "sleep 30", dir.path())).unwrap();
        registry.launch(&LaunchSpec::new("frontend", "sleep 30", dir.path())).unwrap();
        let pids = registry.pids();

        let outcomes = registry.terminate_all(GRACE).await;
        assert_eq!(outcomes.len(), 2);
        assert!(registry.is_empty());
        assert_eq!(registry.total_spawned(), 2);
        for pid in pids {
            assert!(!process_alive(pid));
        }
    }

    #[tokio::test]
    async fn test_terminate_all_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut registry = ChildRegistry::new();
        registry.launch(&LaunchSpec::new("backend", "sleep 30", dir.path())).unwrap();

        assert_eq!(registry.terminate_all(GRACE).await.len(), 1);
        assert!(registry.terminate_all(GRACE).await.is_empty());
    }

    #[tokio::test]
    async fn test_terminate_single() {
        let dir = TempDir::new().unwrap();
        let mut registry = ChildRegistry::new();
        let pid = registry.launch(&LaunchSpec::new("backend", "sleep 30", dir.path())).unwrap();

        assert!(registry.terminate("missing", GRACE).await.is_none());
        assert!(registry.terminate("backend", GRACE).await.is_some());
        assert!(registry.is_empty());
        assert!(!process_alive(pid));
    }

    #[tokio::test]
    async fn test_failed_launch_is_not_tracked() {
        let mut registry = ChildRegistry::new();
        assert!(registry.launch(&LaunchSpec::new("ghost", "true", "/nonexistent/devstack")).is_err());
        assert!(registry.is_empty());
        assert_eq!(registry.total_spawned(), 0);
    }

    #[tokio::test]
    async fn test_drop_kills_registered_children() {
        let dir = TempDir::new().unwrap();
        let pid = {
            let mut registry = ChildRegistry::new();
            registry.launch(&LaunchSpec::new("backend", "sleep 30", dir.path())).unwrap()
        };

        // the killed child is reaped by tokio's orphan queue on a later spawn/poll
        let mut gone = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tokio::process::Command::new("true").status().await;
            if !process_alive(pid) {
                gone = true;
                break;
            }
        }
        assert!(gone);
    }
}
