//! # Embedded command server.
//!
//! [`CommandServer`] owns one listening socket at a time and a background accept task.
//!
//! ```text
//! start(port)
//!   └─► accept task: bind ──► Listening(addr)
//!          loop {
//!            select! {
//!              stop token   → break (ListenerClosed)
//!              accept()     → spawn ConnectionHandler::run
//!                           → Err: AcceptFailed, break
//!            }
//!          }
//!          drop(listener) ──► Stopped
//!
//! stop().await
//!   └─► cancel stop token (+ drain token if configured), await accept task
//! ```
//!
//! ## Rules
//! - `start` is non-blocking; bind errors are reported through [`ServerStatus`],
//!   the log and a `BindFailed` event, never returned.
//! - `stop` is idempotent and returns only once the listener is closed.
//! - Connection handlers are independent of the accept loop: a stop does not end
//!   them unless `drain_connections_on_stop` is set.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::ServerError;
use crate::events::{Bus, Event, EventKind};
use crate::server::connection::{ConnectionHandler, ConnectionTracker};

/// Observable state of the listening socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerStatus {
    /// No accept task, or the accept task has exited.
    Stopped,
    /// `start` was called and the listener is being bound.
    Starting,
    /// The listener is bound to the given address.
    Listening(SocketAddr),
    /// The listener could not be bound.
    Failed {
        /// Rendered bind error.
        reason: String,
    },
}

struct Running {
    stop: CancellationToken,
    drain: CancellationToken,
    join: JoinHandle<()>,
}

/// Line-oriented TCP echo server with an explicit start/stop lifecycle.
pub struct CommandServer {
    host: IpAddr,
    line_limit: Option<usize>,
    drain_on_stop: bool,
    bus: Bus,
    running: Mutex<Option<Running>>,
    status: Arc<watch::Sender<ServerStatus>>,
    connections: Arc<ConnectionTracker>,
}

impl CommandServer {
    /// Creates a stopped server using `cfg.host`, `cfg.max_line_length` and
    /// `cfg.drain_connections_on_stop`.
    pub fn new(cfg: &Config, bus: Bus) -> Self {
        let (status, _) = watch::channel(ServerStatus::Stopped);
        Self {
            host: cfg.host,
            line_limit: cfg.line_limit(),
            drain_on_stop: cfg.drain_connections_on_stop,
            bus,
            running: Mutex::new(None),
            status: Arc::new(status),
            connections: Arc::new(ConnectionTracker::default()),
        }
    }

    /// Starts listening on `port` in a background task and returns immediately.
    ///
    /// Must be called from within a tokio runtime. Calling `start` while an
    /// accept task is still alive logs a warning and does nothing.
    pub fn start(&self, port: u16) {
        let mut running = self.lock_running();
        if let Some(r) = running.as_ref() {
            if !r.join.is_finished() {
                warn!(port, "command server already running; start ignored");
                return;
            }
        }

        let addr = SocketAddr::new(self.host, port);
        let stop = CancellationToken::new();
        let drain = CancellationToken::new();

        self.status.send_replace(ServerStatus::Starting);
        info!(%addr, "starting command server");
        self.bus
            .publish(Event::new(EventKind::ServerStarting).with_addr(addr));

        let accept = AcceptLoop {
            addr,
            line_limit: self.line_limit,
            bus: self.bus.clone(),
            status: Arc::clone(&self.status),
            connections: Arc::clone(&self.connections),
            stop: stop.clone(),
            drain: drain.clone(),
        };
        let join = tokio::spawn(accept.run());
        *running = Some(Running { stop, drain, join });
    }

    /// Closes the listener and waits for the accept task to exit.
    ///
    /// A pending `accept()` is interrupted. Calling `stop` on a stopped server
    /// is a no-op.
    pub async fn stop(&self) {
        let Some(running) = self.lock_running().take() else {
            debug!("command server not running; stop ignored");
            return;
        };

        running.stop.cancel();
        if self.drain_on_stop {
            running.drain.cancel();
        }
        if let Err(e) = running.join.await {
            error!(error = %e, "accept task aborted");
            self.status.send_replace(ServerStatus::Stopped);
        }
    }

    /// Current listener state.
    pub fn status(&self) -> ServerStatus {
        self.status.borrow().clone()
    }

    /// Subscribes to listener state changes.
    pub fn watch_status(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    /// Returns `true` while the listener is bound.
    pub fn is_listening(&self) -> bool {
        matches!(*self.status.borrow(), ServerStatus::Listening(_))
    }

    /// Waits until a pending `start` has either bound or failed.
    ///
    /// Returns the bound address, or [`ServerError::NotListening`] if binding
    /// failed or the server is stopped.
    pub async fn wait_listening(&self) -> Result<SocketAddr, ServerError> {
        let mut rx = self.status.subscribe();
        let status = rx
            .wait_for(|s| !matches!(s, ServerStatus::Starting))
            .await
            .map_err(|_| ServerError::NotListening {
                reason: "status channel closed".into(),
            })?
            .clone();

        match status {
            ServerStatus::Listening(addr) => Ok(addr),
            ServerStatus::Failed { reason } => Err(ServerError::NotListening { reason }),
            ServerStatus::Stopped | ServerStatus::Starting => Err(ServerError::NotListening {
                reason: "stopped".into(),
            }),
        }
    }

    /// Number of connections whose handler is still running.
    pub fn active_connections(&self) -> usize {
        self.connections.active()
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CommandServer {
    fn drop(&mut self) {
        if let Some(running) = self.lock_running().take() {
            running.stop.cancel();
            if self.drain_on_stop {
                running.drain.cancel();
            }
        }
    }
}

struct AcceptLoop {
    addr: SocketAddr,
    line_limit: Option<usize>,
    bus: Bus,
    status: Arc<watch::Sender<ServerStatus>>,
    connections: Arc<ConnectionTracker>,
    stop: CancellationToken,
    drain: CancellationToken,
}

impl AcceptLoop {
    async fn run(self) {
        let listener = match TcpListener::bind(self.addr).await {
            Ok(listener) => listener,
            Err(e) => {
                let err = ServerError::Bind {
                    addr: self.addr.to_string(),
                    error: e.to_string(),
                };
                error!(addr = %self.addr, label = err.as_label(), error = %e, "failed to start command server");
                self.bus.publish(
                    Event::new(EventKind::BindFailed)
                        .with_addr(self.addr)
                        .with_reason(err.as_message()),
                );
                self.status.send_replace(ServerStatus::Failed {
                    reason: err.to_string(),
                });
                return;
            }
        };

        let local = listener.local_addr().unwrap_or(self.addr);
        info!(addr = %local, "command server listening; waiting for clients");
        self.status.send_replace(ServerStatus::Listening(local));
        self.bus
            .publish(Event::new(EventKind::ServerListening).with_addr(local));

        let end = loop {
            let accepted = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break ServerError::ListenerClosed,
                res = listener.accept() => res,
            };

            match accepted {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(e) => {
                    break ServerError::Accept {
                        error: e.to_string(),
                    };
                }
            }
        };
        drop(listener);

        match &end {
            ServerError::ListenerClosed => info!(addr = %local, "command server stopped: listener closed"),
            other => {
                error!(addr = %local, label = other.as_label(), error = %other, "command server stopped");
                self.bus.publish(
                    Event::new(EventKind::AcceptFailed).with_reason(other.as_message()),
                );
            }
        }

        self.status.send_replace(ServerStatus::Stopped);
        self.bus
            .publish(Event::new(EventKind::ServerStopped).with_addr(local));
    }

    fn dispatch(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let (id, guard) = self.connections.enter();
        info!(conn = id, %peer, "client connected");
        self.bus.publish(
            Event::new(EventKind::ConnectionOpened)
                .with_conn(id)
                .with_addr(peer),
        );

        let handler = ConnectionHandler::new(
            id,
            peer,
            stream,
            self.line_limit,
            self.bus.clone(),
            self.drain.clone(),
            guard,
        );
        tokio::spawn(handler.run());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    fn local_config() -> Config {
        Config {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ..Config::default()
        }
    }

    async fn started(cfg: &Config) -> (CommandServer, SocketAddr) {
        let server = CommandServer::new(cfg, Bus::new(64));
        server.start(0);
        let addr = server.wait_listening().await.unwrap();
        (server, addr)
    }

    async fn ask(stream: &mut BufReader<TcpStream>, line: &str) -> String {
        stream
            .get_mut()
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
        let mut reply = String::new();
        stream.read_line(&mut reply).await.unwrap();
        reply
    }

    async fn wait_connections(server: &CommandServer, n: usize) {
        timeout(Duration::from_secs(5), async {
            while server.active_connections() != n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_echoes_lines_with_prefix() {
        let (server, addr) = started(&local_config()).await;
        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());

        assert_eq!(ask(&mut client, "ping").await, "Server received: ping\n");
        assert_eq!(
            ask(&mut client, "hello world").await,
            "Server received: hello world\n"
        );

        server.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_eof_closes_one_connection_only() {
        let (server, addr) = started(&local_config()).await;
        let mut a = BufReader::new(TcpStream::connect(addr).await.unwrap());
        let mut b = BufReader::new(TcpStream::connect(addr).await.unwrap());
        assert_eq!(ask(&mut a, "a").await, "Server received: a\n");
        assert_eq!(ask(&mut b, "b").await, "Server received: b\n");
        wait_connections(&server, 2).await;

        drop(a);
        wait_connections(&server, 1).await;
        assert_eq!(ask(&mut b, "still").await, "Server received: still\n");

        server.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_closes_listener_and_keeps_connections() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let server = CommandServer::new(&local_config(), bus);
        server.start(0);
        let addr = server.wait_listening().await.unwrap();

        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());
        assert_eq!(ask(&mut client, "before").await, "Server received: before\n");

        timeout(Duration::from_secs(5), server.stop()).await.unwrap();
        assert_eq!(server.status(), ServerStatus::Stopped);
        assert!(TcpStream::connect(addr).await.is_err());

        assert_eq!(ask(&mut client, "after").await, "Server received: after\n");

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::ServerListening));
        assert!(kinds.contains(&EventKind::ServerStopped));
        assert!(!kinds.contains(&EventKind::AcceptFailed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_is_idempotent() {
        let (server, _) = started(&local_config()).await;
        server.stop().await;
        server.stop().await;
        assert_eq!(server.status(), ServerStatus::Stopped);

        let never_started = CommandServer::new(&local_config(), Bus::new(4));
        never_started.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_restart_after_stop() {
        let (server, _) = started(&local_config()).await;
        server.stop().await;

        server.start(0);
        let addr = server.wait_listening().await.unwrap();
        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());
        assert_eq!(ask(&mut client, "again").await, "Server received: again\n");
        server.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let server = CommandServer::new(&local_config(), bus);
        server.start(port);

        let err = server.wait_listening().await.unwrap_err();
        assert_eq!(err.as_label(), "server_not_listening");
        assert!(matches!(server.status(), ServerStatus::Failed { .. }));

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ServerStarting);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::BindFailed);

        server.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drain_on_stop_closes_connections() {
        let cfg = Config {
            drain_connections_on_stop: true,
            ..local_config()
        };
        let (server, addr) = started(&cfg).await;
        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());
        assert_eq!(ask(&mut client, "x").await, "Server received: x\n");

        server.stop().await;
        wait_connections(&server, 0).await;

        let mut rest = String::new();
        assert_eq!(client.read_line(&mut rest).await.unwrap(), 0);
    }
}
