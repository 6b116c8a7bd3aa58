//! OS-level key flag interception
//!
//! The interceptor installs a listen-only tap. Its callback runs on a
//! foreign thread that sits in the system input pipeline, so the only
//! thing it may do is derive one boolean and push it into a [`FlagSink`].

use tokio::sync::mpsc;

use super::observer::KeyStateMsg;

/// Installs system-wide key flag interception
pub trait Interceptor: Send + 'static {
    /// Live interception; dropping or releasing it tears the tap down
    type Handle: InterceptionHandle;

    /// Install a pass-through tap that reports Caps Lock values into `sink`
    fn install(&mut self, sink: FlagSink) -> Result<Self::Handle, InterceptError>;

    /// Caps Lock state straight from the OS, if it can be read without a tap
    fn current_caps_lock(&self) -> Option<bool> {
        None
    }
}

/// An installed tap
pub trait InterceptionHandle: Send + 'static {
    /// Whether the OS still delivers events to this tap
    fn is_enabled(&self) -> bool;

    /// Ask the OS to (re-)enable delivery
    fn set_enabled(&mut self, enabled: bool);

    /// Tear the tap down. Must be done before another one is installed.
    fn release(self);
}

/// Hand-off point from the tap callback into the cooperative context
///
/// Sending never blocks and never fails loudly: if the observer is gone
/// the value is simply dropped.
#[derive(Debug, Clone)]
pub struct FlagSink {
    tx: mpsc::UnboundedSender<KeyStateMsg>,
}

impl FlagSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<KeyStateMsg>) -> Self {
        Self { tx }
    }

    /// Deliver a derived Caps Lock value
    pub fn deliver(&self, caps_lock: bool) {
        let _ = self.tx.send(KeyStateMsg::Flags(caps_lock));
    }
}

/// Health of the interception handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapHealth {
    /// Not started, or stopped
    Stopped,
    /// Install failed (usually Accessibility permission missing)
    Unavailable,
    /// Tap installed and enabled
    Active,
    /// Health poll found the tap disabled; re-enable in progress
    Degraded,
    /// Handle released; a fresh install is scheduled
    Recreating,
}

impl TapHealth {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn allows(self, next: TapHealth) -> bool {
        use TapHealth::*;

        matches!(
            (self, next),
            (Stopped, Active)
                | (Stopped, Unavailable)
                | (Active, Degraded)
                | (Degraded, Active)
                | (Degraded, Recreating)
                | (Recreating, Active)
                | (Active | Degraded | Recreating | Unavailable, Stopped)
        )
    }
}

impl Default for TapHealth {
    fn default() -> Self {
        Self::Stopped
    }
}

impl std::fmt::Display for TapHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TapHealth::Stopped => write!(f, "Stopped"),
            TapHealth::Unavailable => write!(f, "Unavailable"),
            TapHealth::Active => write!(f, "Active"),
            TapHealth::Degraded => write!(f, "Degraded"),
            TapHealth::Recreating => write!(f, "Recreating"),
        }
    }
}

/// Errors that can occur while installing the tap
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    #[error("failed to create event tap - check Accessibility permissions")]
    PermissionDenied,

    #[error("failed to spawn event tap thread: {0}")]
    ThreadSpawn(String),

    #[error("failed to attach event tap to its run loop")]
    RunLoopSource,

    #[error("event tap thread did not report readiness")]
    Disconnected,
}
