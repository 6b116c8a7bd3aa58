//! Caps Lock observer
//!
//! Owns the interception handle and the last known Caps Lock state. All of
//! its state lives on one task; the tap thread and every timer reach it
//! only through the inbox.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::lifecycle::Mailbox;

use super::flags::{KeyFlagState, Observation};
use super::tap::{FlagSink, InterceptError, InterceptionHandle, Interceptor, TapHealth};

/// Timing knobs for the observer
#[derive(Debug, Clone, Copy)]
pub struct KeyStateTimings {
    /// How often the tap is checked for silent revocation
    pub health_interval: Duration,
    /// Delay between tearing a dead tap down and installing a new one
    pub recreate_backoff: Duration,
    /// Window after start during which the first change is not surfaced
    pub startup_grace: Duration,
}

impl Default for KeyStateTimings {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(5),
            recreate_backoff: Duration::from_secs(1),
            startup_grace: Duration::from_secs(1),
        }
    }
}

/// Snapshot published for the status display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyStateStatus {
    /// Last known Caps Lock state, baseline included
    pub caps_lock: bool,
    /// Current interception health
    pub health: TapHealth,
}

/// Messages processed by the observer task
#[derive(Debug)]
pub(crate) enum KeyStateMsg {
    /// Derived Caps Lock value handed off by the tap thread
    Flags(bool),
    Start,
    Stop,
    Shutdown,
    /// Startup grace period elapsed for the given session
    GraceElapsed { session: u64 },
    /// Recreation backoff elapsed for the given session
    Recreate { session: u64 },
}

/// Callback invoked with every surfaced Caps Lock change
pub type CapsLockCallback = Box<dyn FnMut(bool) + Send>;

/// Caps Lock observer state, driven by [`KeyStateObserver::run`]
pub struct KeyStateObserver<I: Interceptor> {
    interceptor: I,
    handle: Option<I::Handle>,
    health: TapHealth,
    flags: KeyFlagState,
    /// Bumped on every start/stop so timers from an older session no-op
    session: u64,
    timings: KeyStateTimings,
    mailbox: Mailbox<KeyStateMsg>,
    status_tx: watch::Sender<KeyStateStatus>,
    on_change: CapsLockCallback,
}

impl<I: Interceptor> KeyStateObserver<I> {
    fn new(
        interceptor: I,
        timings: KeyStateTimings,
        mailbox: Mailbox<KeyStateMsg>,
        status_tx: watch::Sender<KeyStateStatus>,
        on_change: CapsLockCallback,
    ) -> Self {
        Self {
            interceptor,
            handle: None,
            health: TapHealth::Stopped,
            flags: KeyFlagState::default(),
            session: 0,
            timings,
            mailbox,
            status_tx,
            on_change,
        }
    }

    /// Begin interception. No-op unless stopped.
    pub fn start(&mut self) {
        if self.health != TapHealth::Stopped {
            debug!(health = %self.health, "caps lock observer already started");
            return;
        }

        self.session += 1;

        let baseline = self.interceptor.current_caps_lock().unwrap_or(false);
        self.flags = KeyFlagState::new(baseline);
        self.mailbox.post_after(
            self.timings.startup_grace,
            KeyStateMsg::GraceElapsed {
                session: self.session,
            },
        );

        match self.install() {
            Ok(handle) => {
                self.handle = Some(handle);
                self.set_health(TapHealth::Active);
                info!(baseline, "caps lock observer started");
            }
            Err(e) => {
                // Not fatal: the OS prompts for permission out of band
                warn!(error = %e, "caps lock interception unavailable");
                self.set_health(TapHealth::Unavailable);
            }
        }
    }

    /// Release the interception handle. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.health == TapHealth::Stopped {
            return;
        }

        self.session += 1;
        self.release_handle();
        self.set_health(TapHealth::Stopped);
        info!("caps lock observer stopped");
    }

    /// Poll the tap and repair it if the OS disabled it behind our back
    pub fn check_health(&mut self) {
        if self.health != TapHealth::Active {
            return;
        }
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        if handle.is_enabled() {
            trace!("event tap healthy");
            return;
        }

        warn!("event tap disabled by the system, re-enabling");
        self.set_health(TapHealth::Degraded);

        let reenabled = self.handle.as_mut().map_or(false, |handle| {
            handle.set_enabled(true);
            handle.is_enabled()
        });
        if reenabled {
            info!("event tap re-enabled");
            self.set_health(TapHealth::Active);
            return;
        }

        warn!(
            backoff_ms = self.timings.recreate_backoff.as_millis() as u64,
            "event tap re-enable failed, recreating"
        );
        self.release_handle();
        self.set_health(TapHealth::Recreating);
        self.schedule_recreate();
    }

    fn handle_message(&mut self, msg: KeyStateMsg) {
        match msg {
            KeyStateMsg::Flags(active) => self.handle_flags(active),
            KeyStateMsg::Start => self.start(),
            KeyStateMsg::Stop => self.stop(),
            KeyStateMsg::Shutdown => {}
            KeyStateMsg::GraceElapsed { session } => self.end_grace(session),
            KeyStateMsg::Recreate { session } => self.recreate(session),
        }
    }

    fn handle_flags(&mut self, active: bool) {
        if self.health == TapHealth::Stopped {
            trace!("flags after stop dropped");
            return;
        }

        match self.flags.observe(active) {
            Observation::Unchanged => {}
            Observation::Baseline(active) => {
                debug!(active, "caps lock baseline recorded");
                self.publish();
            }
            Observation::Changed(active) => {
                debug!(active, "caps lock changed");
                self.publish();
                (self.on_change)(active);
            }
        }
    }

    fn end_grace(&mut self, session: u64) {
        if session != self.session {
            return;
        }
        self.flags.end_grace();
    }

    fn recreate(&mut self, session: u64) {
        if session != self.session || self.health != TapHealth::Recreating {
            trace!("stale recreate timer");
            return;
        }

        match self.install() {
            Ok(handle) => {
                self.handle = Some(handle);
                self.set_health(TapHealth::Active);
                info!("event tap recreated");
            }
            Err(e) => {
                warn!(error = %e, "event tap recreation failed, retrying");
                self.schedule_recreate();
            }
        }
    }

    fn schedule_recreate(&self) {
        self.mailbox.post_after(
            self.timings.recreate_backoff,
            KeyStateMsg::Recreate {
                session: self.session,
            },
        );
    }

    fn install(&mut self) -> Result<I::Handle, InterceptError> {
        // Never two live taps at once
        self.release_handle();
        let sink = FlagSink::new(self.mailbox.sender());
        self.interceptor.install(sink)
    }

    fn release_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
            debug!("event tap released");
        }
    }

    fn set_health(&mut self, next: TapHealth) {
        debug_assert!(
            self.health.allows(next),
            "illegal tap transition {} -> {}",
            self.health,
            next
        );
        debug!(from = %self.health, to = %next, "tap health transition");
        self.health = next;
        self.publish();
    }

    fn publish(&self) {
        self.status_tx.send_replace(KeyStateStatus {
            caps_lock: self.flags.is_active,
            health: self.health,
        });
    }

    /// Process messages and health polls until shut down
    pub(crate) async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<KeyStateMsg>) {
        let period = self.timings.health_interval;
        let mut health_poll = time::interval_at(Instant::now() + period, period);
        health_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = inbox.recv() => match msg {
                    Some(KeyStateMsg::Shutdown) | None => break,
                    Some(msg) => self.handle_message(msg),
                },
                _ = health_poll.tick() => self.check_health(),
            }
        }

        self.stop();
        debug!("caps lock observer task exited");
    }
}

/// Control surface for a spawned observer
#[derive(Clone)]
pub struct KeyStateHandle {
    mailbox: Mailbox<KeyStateMsg>,
    status: watch::Receiver<KeyStateStatus>,
}

impl KeyStateHandle {
    /// Begin interception (idempotent)
    pub fn start(&self) {
        self.mailbox.post(KeyStateMsg::Start);
    }

    /// Release the interception handle (idempotent)
    pub fn stop(&self) {
        self.mailbox.post(KeyStateMsg::Stop);
    }

    /// Stop and end the observer task
    pub fn shutdown(&self) {
        self.mailbox.post(KeyStateMsg::Shutdown);
    }

    /// Latest published status
    pub fn status(&self) -> KeyStateStatus {
        *self.status.borrow()
    }

    /// Receiver that is notified on every status change
    pub fn subscribe_status(&self) -> watch::Receiver<KeyStateStatus> {
        self.status.clone()
    }
}

/// Spawn an observer on the current runtime
pub fn spawn<I, F>(
    interceptor: I,
    timings: KeyStateTimings,
    on_change: F,
) -> (KeyStateHandle, JoinHandle<()>)
where
    I: Interceptor,
    F: FnMut(bool) + Send + 'static,
{
    let (mailbox, inbox) = Mailbox::channel();
    let (status_tx, status) = watch::channel(KeyStateStatus::default());

    let observer = KeyStateObserver::new(
        interceptor,
        timings,
        mailbox.clone(),
        status_tx,
        Box::new(on_change),
    );
    let task = tokio::spawn(observer.run(inbox));

    (KeyStateHandle { mailbox, status }, task)
}
