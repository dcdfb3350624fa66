//! # One accepted client connection.
//!
//! [`ConnectionHandler`] owns the accepted socket and runs the request/reply loop:
//!
//! ```text
//! read line ──► "Server received: <line>\n" ──► flush ──► read line ...
//!    │
//!    ├─ EOF           → close
//!    ├─ read error    → warn + ConnectionFailed → close
//!    ├─ write error   → warn + ConnectionFailed → close
//!    └─ drain (stop)  → close
//! ```
//!
//! The socket is closed exactly once, on every exit path, and a
//! `ConnectionClosed` event is always published last.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::events::{Bus, Event, EventKind};
use crate::server::protocol::{line_codec, reply};

/// Live connection accounting shared by the accept loop and its handlers.
#[derive(Default)]
pub(crate) struct ConnectionTracker {
    next_id: AtomicU64,
    active: AtomicUsize,
}

impl ConnectionTracker {
    /// Registers a new connection and returns its id with a guard that
    /// unregisters it on drop.
    pub(crate) fn enter(self: &Arc<Self>) -> (u64, ConnectionGuard) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.active.fetch_add(1, Ordering::AcqRel);
        (
            id,
            ConnectionGuard {
                tracker: Arc::clone(self),
            },
        )
    }

    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// Decrements the active connection count when dropped.
pub(crate) struct ConnectionGuard {
    tracker: Arc<ConnectionTracker>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.active.fetch_sub(1, Ordering::AcqRel);
    }
}

enum Ended {
    Eof,
    Drained,
}

/// Serves a single accepted connection until EOF, an I/O error or a drain request.
pub struct ConnectionHandler {
    id: u64,
    peer: SocketAddr,
    stream: TcpStream,
    line_limit: Option<usize>,
    bus: Bus,
    drain: CancellationToken,
    _guard: ConnectionGuard,
}

impl ConnectionHandler {
    pub(crate) fn new(
        id: u64,
        peer: SocketAddr,
        stream: TcpStream,
        line_limit: Option<usize>,
        bus: Bus,
        drain: CancellationToken,
        guard: ConnectionGuard,
    ) -> Self {
        Self {
            id,
            peer,
            stream,
            line_limit,
            bus,
            drain,
            _guard: guard,
        }
    }

    /// Runs the request/reply loop and returns the number of lines answered.
    ///
    /// Never returns an error: failures are logged, published as
    /// `ConnectionFailed` and end only this connection.
    pub async fn run(self) -> u64 {
        let Self {
            id,
            peer,
            stream,
            line_limit,
            bus,
            drain,
            _guard,
        } = self;

        let (read, write) = stream.into_split();
        let mut lines = FramedRead::new(read, line_codec(line_limit));
        let mut replies = FramedWrite::new(write, LinesCodec::new());
        let mut answered = 0u64;

        let res = exchange(id, &mut lines, &mut replies, &drain, &mut answered).await;

        match res {
            Ok(Ended::Eof) => debug!(conn = id, %peer, "client closed the connection"),
            Ok(Ended::Drained) => debug!(conn = id, %peer, "connection drained by server stop"),
            Err(e) => {
                warn!(conn = id, %peer, label = e.as_label(), error = %e, "error handling client");
                bus.publish(
                    Event::new(EventKind::ConnectionFailed)
                        .with_conn(id)
                        .with_addr(peer)
                        .with_reason(e.to_string()),
                );
            }
        }

        if let Err(e) = SinkExt::<String>::close(&mut replies).await {
            debug!(conn = id, %peer, error = %e, "socket close reported an error");
        }
        drop(lines);
        drop(replies);

        info!(conn = id, %peer, answered, "client disconnected");
        bus.publish(
            Event::new(EventKind::ConnectionClosed)
                .with_conn(id)
                .with_addr(peer)
                .with_lines(answered),
        );
        answered
    }
}

async fn exchange(
    id: u64,
    lines: &mut FramedRead<OwnedReadHalf, LinesCodec>,
    replies: &mut FramedWrite<OwnedWriteHalf, LinesCodec>,
    drain: &CancellationToken,
    answered: &mut u64,
) -> Result<Ended, ServerError> {
    let io_err = |error: String| ServerError::ConnectionIo { conn: id, error };

    loop {
        let next = tokio::select! {
            _ = drain.cancelled() => return Ok(Ended::Drained),
            next = lines.next() => next,
        };

        match next {
            None => return Ok(Ended::Eof),
            Some(Err(e)) => return Err(io_err(e.to_string())),
            Some(Ok(line)) => {
                debug!(conn = id, line = %line, "request received");
                replies
                    .send(reply(&line))
                    .await
                    .map_err(|e| io_err(e.to_string()))?;
                *answered += 1;
            }
        }
    }
}
