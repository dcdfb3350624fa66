//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the focus supervisor, the focus
//! runner, the command server and its connection handlers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `FocusSupervisor`, `focus::runner`, `CommandServer` accept loop,
//!   `ConnectionHandler`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `SubscriberSet::forward_from()` (fans out to subscribers) and any
//!   receiver obtained through [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
