//! On-screen overlay
//!
//! Shows a short-lived HUD with an icon and a line of text. Requests are
//! debounced and each new one replaces whatever is currently visible.

mod layout;
mod presenter;
mod request;
mod surface;

pub use layout::{Point, Rect, Screen};
pub use presenter::{spawn, OverlayTimings, OverlayWindowState, PresenterHandle};
pub use request::{AccentColor, Generation, IconKind, OverlayKind, OverlayPayload};
pub use surface::{OverlaySurface, SurfaceError};

#[cfg(test)]
pub(crate) use presenter::PresenterMsg;
