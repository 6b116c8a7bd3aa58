//! Overlay lifecycle
//!
//! `Hidden -> Showing(g) -> FadingOut(g) -> Hidden`, where `g` is the
//! generation of the request that opened the window. A new request always
//! closes whatever is on screen first, so at most one window exists. Every
//! timer carries the generation it was scheduled for and does nothing if
//! that generation is no longer the one it guards.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::lifecycle::Mailbox;

use super::layout;
use super::request::{Generation, OverlayKind, OverlayPayload, OverlayRequest};
use super::surface::{OverlaySurface, SurfaceError};

/// Timing knobs for the presenter
#[derive(Debug, Clone, Copy)]
pub struct OverlayTimings {
    /// Quiet period before a request is turned into a window
    pub debounce: Duration,
    /// How long the window stays fully visible
    pub visible: Duration,
    /// Fade-out duration
    pub fade: Duration,
    /// Hard limit on a window's lifetime, measured from the request
    pub failsafe: Duration,
}

impl Default for OverlayTimings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(50),
            visible: Duration::from_millis(1500),
            fade: Duration::from_millis(300),
            failsafe: Duration::from_secs(3),
        }
    }
}

/// The single overlay window's state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlayWindowState {
    #[default]
    Hidden,
    Showing(Generation),
    FadingOut(Generation),
}

impl OverlayWindowState {
    /// Generation of the window currently on screen
    pub fn window(self) -> Option<Generation> {
        match self {
            OverlayWindowState::Hidden => None,
            OverlayWindowState::Showing(g) | OverlayWindowState::FadingOut(g) => Some(g),
        }
    }
}

/// Messages processed by the presenter task
#[derive(Debug)]
pub(crate) enum PresenterMsg {
    Show {
        kind: OverlayKind,
        payload: OverlayPayload,
    },
    /// Debounce elapsed
    Construct { generation: Generation },
    /// Visible period elapsed
    HideDue { generation: Generation },
    /// Fade animation finished
    FadeComplete { generation: Generation },
    /// Hard lifetime limit reached
    Failsafe { generation: Generation },
    Shutdown,
}

/// Presenter state, driven by [`OverlayPresenter::run`]
pub struct OverlayPresenter<S: OverlaySurface> {
    surface: S,
    timings: OverlayTimings,
    /// Latest generation handed out
    generation: Generation,
    state: OverlayWindowState,
    /// Request waiting for its debounce to elapse
    pending: Option<OverlayRequest>,
    /// Armed auto-hide, cleared to cancel
    hide_timer: Option<Generation>,
    /// Armed failsafe, cleared to cancel
    failsafe_timer: Option<Generation>,
    mailbox: Mailbox<PresenterMsg>,
    state_tx: watch::Sender<OverlayWindowState>,
}

impl<S: OverlaySurface> OverlayPresenter<S> {
    fn new(
        surface: S,
        timings: OverlayTimings,
        mailbox: Mailbox<PresenterMsg>,
        state_tx: watch::Sender<OverlayWindowState>,
    ) -> Self {
        Self {
            surface,
            timings,
            generation: Generation::default(),
            state: OverlayWindowState::Hidden,
            pending: None,
            hide_timer: None,
            failsafe_timer: None,
            mailbox,
            state_tx,
        }
    }

    /// Queue a new overlay, preempting whatever is on screen
    pub fn show(&mut self, kind: OverlayKind, payload: OverlayPayload) {
        let generation = self.generation.next();
        self.generation = generation;

        self.force_hide();
        self.hide_timer = None;
        self.failsafe_timer = None;

        let request = OverlayRequest {
            generation,
            kind,
            payload,
        };
        if let Some(superseded) = self.pending.replace(request) {
            trace!(superseded = %superseded.generation, "pending overlay superseded");
        }

        self.mailbox.post_after(
            self.timings.debounce,
            PresenterMsg::Construct { generation },
        );
        self.failsafe_timer = Some(generation);
        self.mailbox.post_after(
            self.timings.failsafe,
            PresenterMsg::Failsafe { generation },
        );

        debug!(%generation, %kind, "overlay requested");
    }

    fn handle_message(&mut self, msg: PresenterMsg) {
        match msg {
            PresenterMsg::Show { kind, payload } => self.show(kind, payload),
            PresenterMsg::Construct { generation } => self.construct(generation),
            PresenterMsg::HideDue { generation } => self.hide_due(generation),
            PresenterMsg::FadeComplete { generation } => self.fade_complete(generation),
            PresenterMsg::Failsafe { generation } => self.failsafe(generation),
            PresenterMsg::Shutdown => {}
        }
    }

    fn construct(&mut self, generation: Generation) {
        if generation != self.generation {
            trace!(%generation, "superseded overlay abandoned");
            return;
        }
        let Some(request) = self.pending.take() else {
            return;
        };

        let screens = self.surface.screens();
        let pointer = self.surface.pointer_location();
        let Some(screen) = layout::screen_for_pointer(&screens, pointer) else {
            debug!(%generation, "no display, overlay skipped");
            self.failsafe_timer = None;
            return;
        };
        let frame = layout::hud_frame(screen);

        match self.surface.open(generation, frame, &request.payload) {
            Ok(()) => {
                self.set_state(OverlayWindowState::Showing(generation));
                self.hide_timer = Some(generation);
                self.mailbox.post_after(
                    self.timings.visible,
                    PresenterMsg::HideDue { generation },
                );
                debug!(%generation, text = %request.payload.text, "overlay shown");
            }
            Err(SurfaceError::NoDisplay) => {
                debug!(%generation, "no display, overlay skipped");
                self.failsafe_timer = None;
            }
            Err(e) => {
                warn!(%generation, error = %e, "overlay not shown");
                self.failsafe_timer = None;
            }
        }
    }

    fn hide_due(&mut self, generation: Generation) {
        if self.hide_timer != Some(generation) || generation != self.generation {
            trace!(%generation, "stale hide timer");
            return;
        }
        self.hide_timer = None;

        if self.state != OverlayWindowState::Showing(generation) {
            return;
        }

        self.surface.fade_out(generation, self.timings.fade);
        self.set_state(OverlayWindowState::FadingOut(generation));
        self.mailbox.post_after(
            self.timings.fade,
            PresenterMsg::FadeComplete { generation },
        );
    }

    fn fade_complete(&mut self, generation: Generation) {
        if self.state != OverlayWindowState::FadingOut(generation) {
            trace!(%generation, "stale fade completion");
            return;
        }

        self.surface.close(generation);
        self.set_state(OverlayWindowState::Hidden);
        if self.failsafe_timer == Some(generation) {
            self.failsafe_timer = None;
        }
        debug!(%generation, "overlay hidden");
    }

    fn failsafe(&mut self, generation: Generation) {
        if self.failsafe_timer != Some(generation) {
            trace!(%generation, "failsafe disarmed");
            return;
        }
        self.failsafe_timer = None;

        if self
            .pending
            .as_ref()
            .is_some_and(|request| request.generation == generation)
        {
            self.pending = None;
        }

        if self.state.window() == Some(generation) {
            warn!(%generation, state = ?self.state, "failsafe closing overlay");
            self.hide_timer = None;
            self.surface.close(generation);
            self.set_state(OverlayWindowState::Hidden);
        }
    }

    /// Close the current window without animation
    fn force_hide(&mut self) {
        if let Some(window) = self.state.window() {
            debug!(generation = %window, "overlay preempted");
            self.surface.close(window);
            self.set_state(OverlayWindowState::Hidden);
        }
    }

    fn set_state(&mut self, next: OverlayWindowState) {
        self.state = next;
        self.state_tx.send_replace(next);
    }

    /// Process requests and timers until shut down
    pub(crate) async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<PresenterMsg>) {
        while let Some(msg) = inbox.recv().await {
            if matches!(msg, PresenterMsg::Shutdown) {
                break;
            }
            self.handle_message(msg);
        }

        self.pending = None;
        self.force_hide();
        debug!("overlay presenter task exited");
    }
}

/// Fire-and-forget entry point into a spawned presenter
#[derive(Clone)]
pub struct PresenterHandle {
    mailbox: Mailbox<PresenterMsg>,
    state: watch::Receiver<OverlayWindowState>,
}

impl PresenterHandle {
    /// Request an overlay. Returns immediately.
    pub fn show(&self, kind: OverlayKind, payload: OverlayPayload) {
        if !self.mailbox.post(PresenterMsg::Show { kind, payload }) {
            trace!("overlay presenter gone, request dropped");
        }
    }

    /// Close any window and end the presenter task
    pub fn shutdown(&self) {
        self.mailbox.post(PresenterMsg::Shutdown);
    }

    /// Current window state
    pub fn state(&self) -> OverlayWindowState {
        *self.state.borrow()
    }

    /// Handle whose requests land in the returned inbox instead of a presenter
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<PresenterMsg>) {
        let (mailbox, inbox) = Mailbox::channel();
        let (_state_tx, state) = watch::channel(OverlayWindowState::Hidden);
        (Self { mailbox, state }, inbox)
    }
}

/// Spawn a presenter on the current runtime
pub fn spawn<S: OverlaySurface>(
    surface: S,
    timings: OverlayTimings,
) -> (PresenterHandle, JoinHandle<()>) {
    let (mailbox, inbox) = Mailbox::channel();
    let (state_tx, state) = watch::channel(OverlayWindowState::Hidden);

    let presenter = OverlayPresenter::new(surface, timings, mailbox.clone(), state_tx);
    let task = tokio::spawn(presenter.run(inbox));

    (PresenterHandle { mailbox, state }, task)
}
