//! # LogWriter: event stream renderer
//!
//! A subscriber that renders incoming [`Event`]s as `tracing` records under the
//! `focusvisor::events` target. Failures are logged at `warn`, everything else at
//! `debug`, so the event stream stays quiet unless asked for:
//!
//! ```text
//! RUST_LOG=focusvisor::events=debug focus-host
//! ```
//!
//! ## Example output
//! ```text
//! DEBUG focusvisor::events: focus granted task="heartbeat" grant=1
//! DEBUG focusvisor::events: server listening addr=0.0.0.0:12345
//! DEBUG focusvisor::events: connection opened conn=1 peer=127.0.0.1:50112
//! DEBUG focusvisor::events: connection closed conn=1 lines=2
//! DEBUG focusvisor::events: task cancelled task="heartbeat" grant=1
//! ```

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "focusvisor::events";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::FocusGranted => {
                debug!(target: TARGET, task, grant = e.grant, "focus granted");
            }
            EventKind::GrantRejected => {
                warn!(target: TARGET, task, active = e.grant, reason, "grant rejected");
            }
            EventKind::TaskStarting => {
                debug!(target: TARGET, task, grant = e.grant, "task starting");
            }
            EventKind::CancelRequested => {
                debug!(target: TARGET, task, grant = e.grant, reason, "cancel requested");
            }
            EventKind::TaskCompleted => {
                debug!(target: TARGET, task, grant = e.grant, "task completed");
            }
            EventKind::TaskCancelled => {
                debug!(target: TARGET, task, grant = e.grant, "task cancelled");
            }
            EventKind::TaskFailed => {
                warn!(target: TARGET, task, grant = e.grant, reason, "task failed");
            }
            EventKind::FocusRevoked => {
                debug!(target: TARGET, task, grant = e.grant, "focus revoked");
            }
            EventKind::ServerStarting => {
                debug!(target: TARGET, addr = ?e.addr, "server starting");
            }
            EventKind::ServerListening => {
                debug!(target: TARGET, addr = ?e.addr, "server listening");
            }
            EventKind::BindFailed => {
                warn!(target: TARGET, addr = ?e.addr, reason, "bind failed");
            }
            EventKind::AcceptFailed => {
                warn!(target: TARGET, reason, "accept failed");
            }
            EventKind::ServerStopped => {
                debug!(target: TARGET, "server stopped");
            }
            EventKind::ConnectionOpened => {
                debug!(target: TARGET, conn = e.conn, peer = ?e.addr, "connection opened");
            }
            EventKind::ConnectionFailed => {
                warn!(target: TARGET, conn = e.conn, peer = ?e.addr, reason, "connection failed");
            }
            EventKind::ConnectionClosed => {
                debug!(target: TARGET, conn = e.conn, lines = e.lines, "connection closed");
            }
            // The subscriber set logs these itself and never forwards them.
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {}
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
