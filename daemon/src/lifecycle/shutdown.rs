//! Signal handling for graceful shutdown and preference reloads

use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::debug;

/// Handles shutdown signals (SIGTERM, SIGINT)
pub struct ShutdownSignal;

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        Self
    }

    /// Wait for a shutdown signal
    pub async fn wait(&self) -> std::io::Result<()> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                debug!("received SIGTERM");
            }
            _ = sigint.recv() => {
                debug!("received SIGINT");
            }
        }

        Ok(())
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// SIGHUP listener used to re-read the preferences file
pub struct ReloadSignal {
    hangup: Signal,
}

impl ReloadSignal {
    /// Register the SIGHUP handler
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next reload request. `None` once the stream closes.
    pub async fn next(&mut self) -> Option<()> {
        let received = self.hangup.recv().await;
        if received.is_some() {
            debug!("received SIGHUP");
        }
        received
    }
}
