//! Wiring between observers and the overlay
//!
//! Change events are gated by the user's preferences before they reach the
//! presenter. The Caps Lock status display follows the observer's published
//! status instead, so it also reflects the startup baseline that never
//! produces an overlay.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::config::Preferences;
use crate::events::ChangeEvent;
use crate::keystate::KeyStateStatus;
use crate::overlay::PresenterHandle;

/// Something that shows the current Caps Lock state outside the HUD
pub trait StatusDisplay: Send + 'static {
    fn set_caps_lock(&mut self, active: bool);
}

/// Status line text for a Caps Lock state
pub fn status_text(active: bool) -> &'static str {
    if active {
        "Caps Lock: ON"
    } else {
        "Caps Lock: OFF"
    }
}

/// Status display that writes the status line to the log
#[derive(Debug, Default)]
pub struct LoggedStatus {
    last: Option<bool>,
}

impl StatusDisplay for LoggedStatus {
    fn set_caps_lock(&mut self, active: bool) {
        if self.last != Some(active) {
            self.last = Some(active);
            info!(status = status_text(active), "status updated");
        }
    }
}

/// Routes change events to the presenter
pub struct Coordinator<D: StatusDisplay> {
    presenter: PresenterHandle,
    preferences: watch::Receiver<Preferences>,
    display: D,
}

impl<D: StatusDisplay> Coordinator<D> {
    pub fn new(
        presenter: PresenterHandle,
        preferences: watch::Receiver<Preferences>,
        display: D,
    ) -> Self {
        Self {
            presenter,
            preferences,
            display,
        }
    }

    /// Present `event` unless the user turned its overlay off
    pub fn handle_event(&mut self, event: ChangeEvent) {
        let prefs = *self.preferences.borrow();
        let enabled = match event {
            ChangeEvent::CapsLockChanged { .. } => prefs.show_caps_lock_hud,
            ChangeEvent::InputSourceChanged { .. } => prefs.show_language_hud,
        };

        if !enabled {
            debug!(%event, "overlay disabled by preferences");
            return;
        }

        info!(%event, "keyboard state changed");
        self.presenter.show(event.overlay_kind(), event.payload());
    }

    /// Run until every event sender is gone
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ChangeEvent>,
        mut status: watch::Receiver<KeyStateStatus>,
    ) {
        let initial = status.borrow_and_update().caps_lock;
        self.display.set_caps_lock(initial);
        let mut status_open = true;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                changed = status.changed(), if status_open => {
                    if changed.is_err() {
                        status_open = false;
                        continue;
                    }
                    let caps_lock = status.borrow_and_update().caps_lock;
                    self.display.set_caps_lock(caps_lock);
                }
            }
        }

        debug!("coordinator exited");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::keystate::TapHealth;
    use crate::overlay::{OverlayKind, PresenterMsg};

    #[derive(Clone, Default)]
    struct RecordingDisplay(Arc<Mutex<Vec<bool>>>);

    impl StatusDisplay for RecordingDisplay {
        fn set_caps_lock(&mut self, active: bool) {
            self.0.lock().unwrap().push(active);
        }
    }

    fn shown(inbox: &mut mpsc::UnboundedReceiver<PresenterMsg>) -> Vec<(OverlayKind, String)> {
        let mut out = Vec::new();
        while let Ok(msg) = inbox.try_recv() {
            if let PresenterMsg::Show { kind, payload } = msg {
                out.push((kind, payload.text));
            }
        }
        out
    }

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(true), "Caps Lock: ON");
        assert_eq!(status_text(false), "Caps Lock: OFF");
    }

    #[test]
    fn test_preferences_gate_each_kind() {
        let (presenter, mut inbox) = PresenterHandle::detached();
        let (prefs_tx, prefs) = watch::channel(Preferences {
            show_caps_lock_hud: false,
            show_language_hud: true,
        });
        let mut coordinator = Coordinator::new(presenter, prefs, RecordingDisplay::default());

        coordinator.handle_event(ChangeEvent::CapsLockChanged { active: true });
        coordinator.handle_event(ChangeEvent::InputSourceChanged {
            name: "German".to_string(),
        });
        assert_eq!(
            shown(&mut inbox),
            vec![(OverlayKind::InputSource, "German".to_string())]
        );

        prefs_tx.send_replace(Preferences {
            show_caps_lock_hud: true,
            show_language_hud: false,
        });
        coordinator.handle_event(ChangeEvent::CapsLockChanged { active: false });
        coordinator.handle_event(ChangeEvent::InputSourceChanged {
            name: "ABC".to_string(),
        });
        assert_eq!(
            shown(&mut inbox),
            vec![(OverlayKind::CapsLock, "Caps Lock OFF".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_display_follows_status_including_baseline() {
        let (presenter, mut inbox) = PresenterHandle::detached();
        let (_prefs_tx, prefs) = watch::channel(Preferences::default());
        let (status_tx, status) = watch::channel(KeyStateStatus {
            caps_lock: true,
            health: TapHealth::Active,
        });
        let (event_tx, events) = mpsc::unbounded_channel();

        let display = RecordingDisplay::default();
        let coordinator = Coordinator::new(presenter, prefs, display.clone());
        let task = tokio::spawn(coordinator.run(events, status));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*display.0.lock().unwrap(), vec![true]);
        assert!(shown(&mut inbox).is_empty());

        status_tx.send_replace(KeyStateStatus {
            caps_lock: false,
            health: TapHealth::Active,
        });
        event_tx
            .send(ChangeEvent::CapsLockChanged { active: false })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*display.0.lock().unwrap(), vec![true, false]);
        assert_eq!(
            shown(&mut inbox),
            vec![(OverlayKind::CapsLock, "Caps Lock OFF".to_string())]
        );

        // Observer gone first, coordinator keeps routing events
        drop(status_tx);
        event_tx
            .send(ChangeEvent::InputSourceChanged {
                name: "French".to_string(),
            })
            .unwrap();
        drop(event_tx);
        task.await.unwrap();
        assert_eq!(shown(&mut inbox).len(), 1);
    }

    #[test]
    fn test_logged_status_skips_repeats() {
        let mut status = LoggedStatus::default();
        status.set_caps_lock(false);
        status.set_caps_lock(false);
        assert_eq!(status.last, Some(false));
        status.set_caps_lock(true);
        assert_eq!(status.last, Some(true));
    }
}
