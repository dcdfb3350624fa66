//! Glue between an external host lifecycle and the runtime components.
//!
//! - [`LifecycleBridge`] is the callback surface a host drives.
//! - [`Host`] implements it over an owned tokio runtime, one
//!   [`CommandServer`](crate::CommandServer) and one
//!   [`FocusSupervisor`](crate::FocusSupervisor).

mod host;
mod lifecycle;
mod shutdown;

pub use host::{Host, HostBuilder};
pub use lifecycle::LifecycleBridge;
pub use shutdown::wait_for_shutdown_signal;
