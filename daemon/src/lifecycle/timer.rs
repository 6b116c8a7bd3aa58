//! Mailbox for components running on the cooperative context
//!
//! Each component owns one inbox and processes its messages serially.
//! Timers never touch component state: they sleep on their own task and
//! post a message back into the inbox, carrying whatever token the
//! component needs to recognise a stale firing.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

/// Sending side of a component inbox
#[derive(Debug)]
pub struct Mailbox<M> {
    tx: mpsc::UnboundedSender<M>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<M: Send + 'static> Mailbox<M> {
    /// Create a mailbox together with the inbox its owner drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<M>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Post a message now. Returns false once the owner has gone away.
    pub fn post(&self, msg: M) -> bool {
        self.tx.send(msg).is_ok()
    }

    /// Post a message after `delay` without blocking the caller
    pub fn post_after(&self, delay: Duration, msg: M) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(msg).is_err() {
                trace!("timer fired after its owner stopped");
            }
        });
    }

    /// Raw sender, for hand-off points that live outside the runtime
    pub fn sender(&self) -> mpsc::UnboundedSender<M> {
        self.tx.clone()
    }
}
