//! # Subscriber extension point.
//!
//! Implement [`Subscribe`] to observe focus and server events. The
//! [`SubscriberSet`](crate::subscribers::SubscriberSet) drives each implementation from
//! its own worker and bounded queue, so `on_event` may take its time (I/O, batching)
//! without delaying publishers or other subscribers. When the queue is full, events
//! for that subscriber are dropped and reported as `SubscriberOverflow`.
//!
//! ## Example
//! ```rust
//! use focusvisor::{Event, EventKind, Subscribe};
//!
//! struct ConnectionAudit;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for ConnectionAudit {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ConnectionClosed {
//!             println!("conn {:?} answered {:?} lines", ev.conn, ev.lines);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "connection-audit"
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event handler driven by a dedicated worker.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Should not block the runtime thread.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and in `SubscriberOverflow` / `SubscriberPanicked` events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
