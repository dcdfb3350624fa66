//! # Broadcast bus shared by every component.
//!
//! ```text
//!   FocusSupervisor ──┐
//!   focus runner    ──┼──► Bus ──┬──► SubscriberSet::forward_from ──► subscribers
//!   accept loop     ──┤          └──► Bus::subscribe() (tests, embedders)
//!   conn handlers   ──┘
//! ```
//!
//! Publishing never waits. The channel keeps the last `capacity` events; a receiver
//! that falls further behind gets `RecvError::Lagged(n)` and resumes at the oldest
//! retained event. Events published while nobody listens are gone.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable publish/subscribe handle over a `tokio::sync::broadcast` channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus retaining up to `capacity` undelivered events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends `ev` to every current receiver. Without receivers the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Opens a receiver that sees events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of open receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
