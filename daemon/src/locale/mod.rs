//! Keyboard input source observation
//!
//! Tracks the display name of the selected keyboard input source and
//! reports when it changes.

mod names;
mod observer;

pub use names::InputSourceInfo;
pub use observer::{spawn, InputSourceFeed, LocaleHandle, SourceSink, SubscribeError};
