//! Embedded line-oriented TCP command server.
//!
//! - [`CommandServer`] owns the listener and the accept task.
//! - [`ConnectionHandler`] serves one accepted client.
//! - [`protocol`] holds the reply format and framing.

mod command;
mod connection;
pub mod protocol;

pub use command::{CommandServer, ServerStatus};
pub use connection::ConnectionHandler;
pub use protocol::{DEFAULT_PORT, REPLY_PREFIX, reply};
