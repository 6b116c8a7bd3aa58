//! Window primitives the presenter drives
//!
//! Every call returns immediately. Implementations that must run on
//! another thread (AppKit) queue the work and return.

use std::time::Duration;

use super::layout::{Point, Rect, Screen};
use super::request::{Generation, OverlayPayload};

/// Creates, fades and destroys overlay windows
pub trait OverlaySurface: Send + 'static {
    /// Attached displays, primary first. Empty when nothing can be drawn on.
    fn screens(&self) -> Vec<Screen>;

    /// Current pointer location, if known
    fn pointer_location(&self) -> Option<Point>;

    /// Create and show a window for `generation`. It must ignore mouse
    /// input, float above normal windows and never take focus.
    fn open(
        &mut self,
        generation: Generation,
        frame: Rect,
        payload: &OverlayPayload,
    ) -> Result<(), SurfaceError>;

    /// Start fading the window out over `duration`
    fn fade_out(&mut self, generation: Generation, duration: Duration);

    /// Hide the window without animation and release it
    fn close(&mut self, generation: Generation);
}

/// Errors that can occur while opening a window
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("no display available")]
    NoDisplay,

    #[error("window could not be created: {0}")]
    WindowCreation(String),
}
