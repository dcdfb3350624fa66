//! Error types used by the focusvisor runtime, the command server and focus work.
//!
//! This module defines three error enums:
//!
//! - [`ServerError`]: failures of the command server (bind, accept, per-connection I/O).
//! - [`TaskError`]: failures produced by (or captured around) a focus work function.
//! - [`GrantError`]: a grant refused by the focus supervisor.
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging/events.
//! None of these errors ever escape a lifecycle boundary: each is converted to a
//! log record and a bus event where it happens.

use std::any::Any;

use thiserror::Error;

/// # Errors produced by the command server.
///
/// Every variant is terminal only for the unit it belongs to: a bind failure ends the
/// accept task before it loops, an accept failure ends the accept loop, a connection
/// failure ends one connection.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ServerError {
    /// The listening socket could not be created or bound.
    #[error("bind {addr} failed: {error}")]
    Bind {
        /// Address the server attempted to bind.
        addr: String,
        /// The underlying I/O error message.
        error: String,
    },

    /// `accept()` failed while the listener was open.
    #[error("accept failed: {error}")]
    Accept {
        /// The underlying I/O error message.
        error: String,
    },

    /// The listener was closed by `stop()` while an accept was pending.
    #[error("listener closed")]
    ListenerClosed,

    /// Read or write failure on one accepted connection.
    #[error("connection {conn} i/o failed: {error}")]
    ConnectionIo {
        /// Connection identifier.
        conn: u64,
        /// The underlying error message.
        error: String,
    },

    /// The server is not listening (bind failed, not started, or stopped).
    #[error("server not listening: {reason}")]
    NotListening {
        /// Why no listening address is available.
        reason: String,
    },
}

impl ServerError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use focusvisor::ServerError;
    ///
    /// let err = ServerError::ListenerClosed;
    /// assert_eq!(err.as_label(), "server_listener_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServerError::Bind { .. } => "server_bind_failed",
            ServerError::Accept { .. } => "server_accept_failed",
            ServerError::ListenerClosed => "server_listener_closed",
            ServerError::ConnectionIo { .. } => "server_connection_io",
            ServerError::NotListening { .. } => "server_not_listening",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ServerError::Bind { addr, error } => format!("bind {addr}: {error}"),
            ServerError::Accept { error } => format!("accept: {error}"),
            ServerError::ListenerClosed => "listener closed".to_string(),
            ServerError::ConnectionIo { conn, error } => format!("conn={conn} error: {error}"),
            ServerError::NotListening { reason } => format!("not listening: {reason}"),
        }
    }
}

/// # Errors produced by focus work.
///
/// Work functions return `Fail` or `Canceled`; `Panicked` is produced by the
/// supervisor when a work function unwinds.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Work failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Work observed its cancellation token and stopped early.
    #[error("context cancelled")]
    Canceled,

    /// Work panicked; the panic was caught at the supervisor boundary.
    #[error("work panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use focusvisor::TaskError;
    ///
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Canceled => "context cancelled".to_string(),
            TaskError::Panicked { info } => format!("panic: {info}"),
        }
    }
}

/// # Errors returned by [`FocusSupervisor::grant`](crate::FocusSupervisor::grant).
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantError {
    /// A grant arrived while another focus task was still running or cancelling.
    #[error("concurrent grant rejected: grant {active} is still active")]
    ConcurrentGrant {
        /// Grant id of the task that still holds the slot.
        active: u64,
    },
}

impl GrantError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            GrantError::ConcurrentGrant { .. } => "grant_concurrent",
        }
    }
}

/// Renders a panic payload caught by `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_labels_are_stable() {
        let bind = ServerError::Bind {
            addr: "0.0.0.0:12345".into(),
            error: "address in use".into(),
        };
        assert_eq!(bind.as_label(), "server_bind_failed");
        assert_eq!(bind.as_message(), "bind 0.0.0.0:12345: address in use");

        let io = ServerError::ConnectionIo {
            conn: 7,
            error: "reset".into(),
        };
        assert_eq!(io.as_label(), "server_connection_io");
        assert_eq!(io.to_string(), "connection 7 i/o failed: reset");
    }

    #[test]
    fn test_task_error_messages() {
        assert_eq!(TaskError::fail("boom").as_message(), "error: boom");
        let panicked = TaskError::Panicked {
            info: "oops".into(),
        };
        assert_eq!(panicked.as_label(), "task_panicked");
        assert_eq!(panicked.to_string(), "work panicked: oops");
    }

    #[test]
    fn test_grant_error_display() {
        let err = GrantError::ConcurrentGrant { active: 3 };
        assert_eq!(err.as_label(), "grant_concurrent");
        assert_eq!(
            err.to_string(),
            "concurrent grant rejected: grant 3 is still active"
        );
    }

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*s), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*owned), "owned");
        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*other), "unknown panic");
    }
}
