//! Process lifecycle: signals and the timer mailbox shared by components

mod shutdown;
mod timer;

pub use shutdown::{ReloadSignal, ShutdownSignal};
pub use timer::Mailbox;
