//! macOS implementations of the OS boundary

mod app;
mod event_tap;
mod hud_window;
mod input_source;
mod main_thread;

pub use app::run;
