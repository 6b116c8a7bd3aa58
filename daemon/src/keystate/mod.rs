//! Caps Lock observation
//!
//! A listen-only, system-wide flags tap feeds a single-task observer that
//! filters duplicates, hides the startup baseline and keeps the tap alive
//! when macOS silently disables it.

mod flags;
mod observer;
mod tap;

pub use flags::caps_lock_from_bits;
pub use observer::{spawn, KeyStateHandle, KeyStateStatus, KeyStateTimings};
pub use tap::{FlagSink, InterceptError, InterceptionHandle, Interceptor, TapHealth};
