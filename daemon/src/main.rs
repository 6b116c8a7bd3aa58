//! keyhud-daemon: Caps Lock and input source HUD for macOS
//!
//! This daemon runs as an accessory app (no Dock icon) and provides:
//! - Caps Lock detection via a listen-only CGEventTap that heals itself
//!   when macOS disables it
//! - Input source change detection via the distributed TIS notification
//! - A short-lived, single-instance HUD for each change
//!
//! Which HUDs are shown is controlled by the preferences file, re-read on
//! SIGHUP.

#![cfg_attr(not(target_os = "macos"), allow(dead_code))]

mod config;
mod coordinator;
mod events;
mod keystate;
mod lifecycle;
mod locale;
mod overlay;
mod platform;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Preferences};
use crate::coordinator::{Coordinator, LoggedStatus};
use crate::events::ChangeEvent;
use crate::keystate::{Interceptor, KeyStateTimings};
use crate::lifecycle::{ReloadSignal, ShutdownSignal};
use crate::locale::InputSourceFeed;
use crate::overlay::{OverlaySurface, OverlayTimings};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "keyhud-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    if Preferences::init_file(&config.preferences_path)? {
        info!(?config.preferences_path, "default preferences written");
    }
    info!(?config.preferences_path, "configuration loaded");

    platform::run(config)
}

/// Wire observers, coordinator and presenter together and run until a
/// shutdown signal arrives
pub(crate) async fn run_core<I, F, S>(
    interceptor: I,
    feed: F,
    surface: S,
    config: Config,
) -> Result<()>
where
    I: Interceptor,
    F: InputSourceFeed,
    S: OverlaySurface,
{
    let shutdown = ShutdownSignal::new();
    let mut reload = ReloadSignal::new().context("failed to install SIGHUP handler")?;

    let (prefs_tx, prefs_rx) = watch::channel(load_preferences(&config));

    let (presenter, presenter_task) = overlay::spawn(surface, OverlayTimings::default());

    // Observers -> coordinator
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let caps_tx = event_tx.clone();
    let (keystate, keystate_task) =
        keystate::spawn(interceptor, KeyStateTimings::default(), move |active| {
            let _ = caps_tx.send(ChangeEvent::CapsLockChanged { active });
        });

    let source_tx = event_tx;
    let (locale, locale_task) = locale::spawn(feed, move |name| {
        let _ = source_tx.send(ChangeEvent::InputSourceChanged { name });
    });

    let coordinator = Coordinator::new(presenter.clone(), prefs_rx, LoggedStatus::default());
    let coordinator_task = tokio::spawn(coordinator.run(event_rx, keystate.subscribe_status()));

    keystate.start();
    locale.start();

    info!("keyhud initialized, entering main loop");

    let shutdown_wait = shutdown.wait();
    tokio::pin!(shutdown_wait);

    loop {
        tokio::select! {
            result = &mut shutdown_wait => {
                if let Err(e) = result {
                    error!(?e, "signal handler failed");
                }
                info!("shutdown signal received");
                break;
            }

            Some(()) = reload.next() => {
                let prefs = load_preferences(&config);
                info!(?prefs, "preferences reloaded");
                prefs_tx.send_replace(prefs);
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    keystate.shutdown();
    locale.shutdown();
    let _ = keystate_task.await;
    let _ = locale_task.await;

    // Both observers are gone, so the coordinator's event stream has ended
    let _ = coordinator_task.await;

    presenter.shutdown();
    let _ = presenter_task.await;

    info!("keyhud-daemon stopped");

    Ok(())
}

fn load_preferences(config: &Config) -> Preferences {
    Preferences::load(&config.preferences_path).unwrap_or_else(|e| {
        warn!(error = %e, "preferences unreadable, using defaults");
        Preferences::default()
    })
}
