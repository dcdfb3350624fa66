//! # Event subscribers for the focusvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! built-in implementations for handling runtime events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! FocusSupervisor / CommandServer ── publish(Event) ──► Bus
//!                                                        │
//!                                        SubscriberSet::forward_from()
//!                                                        │
//!                                    ┌─────────┬─────────┴─────────┐
//!                                    ▼         ▼                   ▼
//!                                LogWriter   Metrics   ...      Custom
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
