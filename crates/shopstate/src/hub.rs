//! Observable state hub: publishes snapshots to subscribers.
//!
//! Built on [`tokio::sync::watch`]: subscribers receive every snapshot
//! published after they subscribe (full values, never partial updates) and
//! unsubscribe by dropping the receiver. A synchronous current-value read is
//! always available, so callers never need to await just to render.

use tokio::sync::watch;

/// Holds the current value of a piece of state and broadcasts changes.
#[derive(Debug)]
pub struct StateHub<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StateHub<T> {
    /// Create a hub seeded with an initial value.
    #[must_use]
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new snapshot to all subscribers.
    ///
    /// Publishes happen once per completed mutation, in completion order.
    /// A hub with no subscribers still updates its current value.
    pub fn publish(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Subscribe to snapshot changes. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Synchronous read of the current snapshot.
    #[must_use]
    pub fn current(&self) -> T {
        self.tx.borrow().clone()
    }
}
