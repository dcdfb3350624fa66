//! # Events published by the focus supervisor and the command server.
//!
//! [`EventKind`] falls into three groups:
//! - **focus**: grant, cancel and settle of focus work
//! - **server**: listener and connection lifecycle
//! - **subscriber**: delivery problems inside the [`SubscriberSet`](crate::SubscriberSet)
//!
//! An [`Event`] carries a kind plus whichever optional fields that kind sets.
//! `seq` is taken from one process-wide counter, so sorting by `seq` recovers
//! publish order across receivers.
//!
//! ```rust
//! use focusvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ConnectionClosed)
//!     .with_conn(3)
//!     .with_lines(2);
//!
//! assert_eq!(ev.kind, EventKind::ConnectionClosed);
//! assert_eq!(ev.lines, Some(2));
//! assert!(ev.task.is_none());
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // subscribers
    /// `on_event` panicked.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// An event could not be queued for a subscriber.
    ///
    /// Sets: `task` (subscriber name), `reason` ("full" / "closed").
    SubscriberOverflow,

    // focus
    /// Grant accepted; the focus task is about to be spawned.
    ///
    /// Sets: `task`, `grant`.
    FocusGranted,

    /// Grant refused because another focus task is still active.
    ///
    /// Sets: `task`, `grant` (the active grant), `reason`.
    GrantRejected,

    /// Focus work started executing.
    ///
    /// Sets: `task`, `grant`.
    TaskStarting,

    /// Cancellation was requested for the active focus task.
    ///
    /// Sets: `task`, `grant`, `reason` ("revoke" / "replace").
    CancelRequested,

    /// Focus work finished without being cancelled.
    ///
    /// Sets: `task`, `grant`.
    TaskCompleted,

    /// Focus work finished after observing cancellation.
    ///
    /// Sets: `task`, `grant`.
    TaskCancelled,

    /// Focus work failed or panicked.
    ///
    /// Sets: `task`, `grant`, `reason`.
    TaskFailed,

    /// Focus was revoked and the task it owned has settled.
    ///
    /// Sets: `task`, `grant`.
    FocusRevoked,

    // server
    /// `start()` was called; the accept task is binding.
    ///
    /// Sets: `addr` (requested address).
    ServerStarting,

    /// Listener bound; the accept loop is running.
    ///
    /// Sets: `addr` (bound address).
    ServerListening,

    /// Listener could not be bound.
    ///
    /// Sets: `addr` (requested address), `reason`.
    BindFailed,

    /// `accept()` failed; the accept loop terminated.
    ///
    /// Sets: `reason`.
    AcceptFailed,

    /// Accept loop terminated and the listener is closed.
    ServerStopped,

    /// Connection accepted and handed to its handler.
    ///
    /// Sets: `conn`, `addr` (peer).
    ConnectionOpened,

    /// Connection read/write failed.
    ///
    /// Sets: `conn`, `addr` (peer), `reason`.
    ConnectionFailed,

    /// Connection closed (always emitted once per connection).
    ///
    /// Sets: `conn`, `addr` (peer), `lines` (requests answered).
    ConnectionClosed,
}

/// One published event. Optional fields are filled according to [`EventKind`].
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide publish sequence.
    pub seq: u64,
    /// Creation time.
    pub at: SystemTime,
    /// Kind.
    pub kind: EventKind,

    /// Name of the focus task or subscriber, if applicable.
    pub task: Option<Arc<str>>,
    /// Grant id of the focus task.
    pub grant: Option<u64>,
    /// Connection id.
    pub conn: Option<u64>,
    /// Listener or peer address.
    pub addr: Option<SocketAddr>,
    /// Number of request lines answered on a connection.
    pub lines: Option<u64>,
    /// Error text or other detail.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Stamps a new event of `kind` with the next sequence number and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            grant: None,
            conn: None,
            addr: None,
            lines: None,
            reason: None,
        }
    }

    /// Sets `reason`.
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets `task`.
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a grant id.
    pub fn with_grant(mut self, grant: u64) -> Self {
        self.grant = Some(grant);
        self
    }

    /// Attaches a connection id.
    pub fn with_conn(mut self, conn: u64) -> Self {
        self.conn = Some(conn);
        self
    }

    /// Attaches a socket address.
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Attaches the number of answered lines.
    pub fn with_lines(mut self, lines: u64) -> Self {
        self.lines = Some(lines);
        self
    }

    /// `SubscriberOverflow` for `subscriber`; `reason` is "full" or "closed".
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Self::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// `SubscriberPanicked` for `subscriber` with the rendered panic payload.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Self::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}
