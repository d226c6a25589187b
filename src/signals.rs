//! Process-level shutdown signals

use std::io;

use tokio::signal::unix::{Signal, SignalKind, signal};

/// SIGINT/SIGTERM listener.
///
/// Installing it replaces the default "terminate immediately" disposition, so
/// it must exist before the supervisor starts anything.
pub struct SignalListener {
    sigint: Signal,
    sigterm: Signal,
}

impl SignalListener {
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next interrupt or termination signal and name it
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }
}
