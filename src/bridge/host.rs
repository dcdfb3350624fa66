//! # Host runtime.
//!
//! [`Host`] owns everything a host process needs to drive the crate from plain,
//! synchronous lifecycle callbacks:
//!
//! ```text
//! Host
//!  ├─ tokio Runtime (multi-thread)
//!  ├─ Bus ──► forwarding listener ──► SubscriberSet ──► subscribers
//!  ├─ CommandServer     (on_create / on_destroy)
//!  └─ FocusSupervisor   (on_focus_gained / on_focus_lost)
//! ```
//!
//! Callbacks block the calling thread until the operation is done, so they must be
//! invoked from outside the runtime. Focus work runs on the runtime's blocking pool,
//! so even `worker_threads = 1` keeps the command server responsive while it blocks.
//!
//! ## Example
//! ```no_run
//! use focusvisor::{Config, Host, LifecycleBridge, TaskError, TaskFn, TaskRef};
//! use tokio_util::sync::CancellationToken;
//!
//! let task: TaskRef<String> = TaskFn::arc("greeter", |who: String, token: CancellationToken| async move {
//!     println!("hello {who}");
//!     token.cancelled().await;
//!     Ok::<(), TaskError>(())
//! });
//!
//! let host = Host::builder(Config::default(), task).build()?;
//! host.on_create();
//! host.on_focus_gained("robot".to_string());
//! host.on_focus_lost();
//! host.on_destroy();
//! # Ok::<(), std::io::Error>(())
//! ```

use std::sync::Arc;

use tokio::runtime::{self, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::LifecycleBridge;
use crate::config::Config;
use crate::events::Bus;
use crate::focus::{FocusSupervisor, Settled};
use crate::server::CommandServer;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::TaskRef;

/// Builder for [`Host`].
pub struct HostBuilder<C> {
    cfg: Config,
    task: TaskRef<C>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<C: Send + 'static> HostBuilder<C> {
    /// Sets event subscribers.
    ///
    /// Subscribers receive every bus event through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the runtime and all components. Nothing is started yet.
    pub fn build(self) -> std::io::Result<Host<C>> {
        let mut rt = runtime::Builder::new_multi_thread();
        rt.enable_all().thread_name("focusvisor-worker");
        if let Some(n) = self.cfg.runtime_workers() {
            rt.worker_threads(n);
        }
        let runtime = rt.build()?;
        let forward_stop = CancellationToken::new();

        let (bus, subs, forwarder) = {
            let _enter = runtime.enter();
            let bus = Bus::new(self.cfg.bus_capacity_clamped());
            let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
            let forwarder = subs.forward_from(&bus, forward_stop.clone());
            (bus, subs, forwarder)
        };

        let server = Arc::new(CommandServer::new(&self.cfg, bus.clone()));
        let focus = Arc::new(FocusSupervisor::new(
            self.task,
            self.cfg.grant_policy,
            bus.clone(),
        ));

        debug!(
            task = focus.name(),
            policy = self.cfg.grant_policy.as_label(),
            subscribers = subs.len(),
            "host built"
        );

        Ok(Host {
            cfg: self.cfg,
            bus,
            subs,
            forwarder,
            forward_stop,
            server,
            focus,
            runtime,
        })
    }
}

/// Owns the runtime, the command server and the focus supervisor of one host.
pub struct Host<C: Send + 'static> {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    forwarder: JoinHandle<()>,
    forward_stop: CancellationToken,
    server: Arc<CommandServer>,
    focus: Arc<FocusSupervisor<C>>,
    // Dropped last: the supervisor cancels its lane first, and the runtime then
    // waits for that lane to finish.
    runtime: Runtime,
}

impl<C: Send + 'static> Host<C> {
    /// Starts building a host that binds per `cfg` and supervises `task`.
    pub fn builder(cfg: Config, task: TaskRef<C>) -> HostBuilder<C> {
        HostBuilder {
            cfg,
            task,
            subscribers: Vec::new(),
        }
    }

    /// Runs `fut` to completion on the host runtime.
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Host configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus shared by all components.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The command server.
    pub fn server(&self) -> &Arc<CommandServer> {
        &self.server
    }

    /// The focus supervisor.
    pub fn focus(&self) -> &Arc<FocusSupervisor<C>> {
        &self.focus
    }

    /// Stops everything and waits for subscribers to drain their queues.
    pub fn shutdown(self) {
        let Host {
            runtime,
            subs,
            forwarder,
            forward_stop,
            server,
            focus,
            ..
        } = self;

        runtime.block_on(async move {
            server.stop().await;
            focus.revoke().await;

            forward_stop.cancel();
            if let Err(e) = forwarder.await {
                warn!(error = %e, "subscriber listener aborted");
            }
            match Arc::try_unwrap(subs) {
                Ok(set) => set.shutdown().await,
                Err(_) => debug!("subscriber set still shared; workers end with the runtime"),
            }
        });
        info!("host shut down");
    }

    fn log_settled(&self, settled: Option<Settled>) {
        match settled {
            Some(Settled::Failed(e)) => {
                warn!(task = self.focus.name(), label = e.as_label(), error = %e, "focus work ended with failure");
            }
            Some(settled) => info!(task = self.focus.name(), ?settled, "focus work settled"),
            None => debug!(task = self.focus.name(), "no focus work to revoke"),
        }
    }
}

impl<C: Send + 'static> LifecycleBridge<C> for Host<C> {
    fn on_create(&self) {
        let _enter = self.runtime.enter();
        self.server.start(self.cfg.port);
    }

    fn on_destroy(&self) {
        let settled = self.runtime.block_on(async {
            self.server.stop().await;
            self.focus.revoke().await
        });
        if settled.is_some() {
            self.log_settled(settled);
        }
        info!("host destroyed");
    }

    fn on_focus_gained(&self, ctx: C) {
        match self.runtime.block_on(self.focus.grant(ctx)) {
            Ok(grant) => info!(task = self.focus.name(), grant, "focus gained; work started"),
            Err(e) => {
                warn!(task = self.focus.name(), label = e.as_label(), error = %e, "focus gained; grant ignored");
            }
        }
    }

    fn on_focus_lost(&self) {
        let settled = self.runtime.block_on(self.focus.revoke());
        self.log_settled(settled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::events::EventKind;
    use crate::focus::{GrantPolicy, TaskState};
    use crate::tasks::TaskFn;
    use async_trait::async_trait;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{IpAddr, Ipv4Addr, TcpStream};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    fn local_config() -> Config {
        Config {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            worker_threads: 2,
            ..Config::default()
        }
    }

    fn waiting_task(cancelled: Arc<AtomicBool>) -> TaskRef<u32> {
        TaskFn::arc("waiter", move |_: u32, token: CancellationToken| {
            let cancelled = Arc::clone(&cancelled);
            async move {
                token.cancelled().await;
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancelled.store(true, Ordering::SeqCst);
                Ok::<(), TaskError>(())
            }
        })
    }

    #[test]
    fn test_create_serves_and_destroy_stops() {
        let host = Host::builder(local_config(), waiting_task(Arc::default()))
            .build()
            .unwrap();
        host.on_create();
        let addr = host.block_on(host.server().wait_listening()).unwrap();

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"ping\n").unwrap();
        let mut reply = String::new();
        BufReader::new(&stream).read_line(&mut reply).unwrap();
        assert_eq!(reply, "Server received: ping\n");

        host.on_destroy();
        assert!(TcpStream::connect(addr).is_err());
    }

    #[test]
    fn test_focus_lost_waits_for_cancellation() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let host = Host::builder(local_config(), waiting_task(Arc::clone(&cancelled)))
            .build()
            .unwrap();

        host.on_focus_gained(1);
        assert!(host.focus().is_active());

        host.on_focus_lost();
        assert!(cancelled.load(Ordering::SeqCst));
        assert_eq!(host.focus().state(), TaskState::Idle);

        host.on_focus_lost();
    }

    #[test]
    fn test_second_grant_is_logged_not_propagated() {
        let host = Host::builder(local_config(), waiting_task(Arc::default()))
            .build()
            .unwrap();
        let mut rx = host.bus().subscribe();

        host.on_focus_gained(1);
        let first = host.focus().state().grant();
        host.on_focus_gained(2);
        assert_eq!(host.focus().policy(), GrantPolicy::Reject);
        assert_eq!(host.focus().state().grant(), first);

        let rejected = host.block_on(async {
            loop {
                let ev = rx.recv().await.unwrap();
                if ev.kind == EventKind::GrantRejected {
                    break ev;
                }
            }
        });
        assert_eq!(rejected.grant, first);
        host.on_focus_lost();
    }

    #[test]
    fn test_idle_connection_does_not_delay_focus() {
        let host = Host::builder(local_config(), waiting_task(Arc::default()))
            .build()
            .unwrap();
        host.on_create();
        let addr = host.block_on(host.server().wait_listening()).unwrap();
        let _idle = TcpStream::connect(addr).unwrap();

        let started = Instant::now();
        host.on_focus_gained(7);
        host.on_focus_lost();
        assert!(started.elapsed() < Duration::from_secs(5));

        host.on_destroy();
    }

    #[test]
    fn test_blocking_focus_work_does_not_stall_server() {
        let cfg = Config {
            worker_threads: 1,
            ..local_config()
        };
        let task: TaskRef<u32> = TaskFn::arc("busy", |_: u32, token: CancellationToken| async move {
            while !token.is_cancelled() {
                std::thread::sleep(Duration::from_millis(10));
            }
            Ok::<(), TaskError>(())
        });
        let host = Host::builder(cfg, task).build().unwrap();
        host.on_create();
        let addr = host.block_on(host.server().wait_listening()).unwrap();

        host.on_focus_gained(1);
        std::thread::sleep(Duration::from_millis(50));

        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        stream.write_all(b"ping\n").unwrap();
        let mut reply = String::new();
        BufReader::new(&stream).read_line(&mut reply).unwrap();
        assert_eq!(reply, "Server received: ping\n");

        host.on_focus_lost();
        assert_eq!(host.focus().state(), TaskState::Idle);
        host.on_destroy();
    }

    struct Recorder(Arc<Mutex<Vec<EventKind>>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, e: &crate::events::Event) {
            self.0.lock().unwrap().push(e.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[test]
    fn test_subscribers_see_lifecycle_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let host = Host::builder(local_config(), waiting_task(Arc::default()))
            .with_subscribers(vec![Arc::new(Recorder(Arc::clone(&seen)))])
            .build()
            .unwrap();

        host.on_create();
        host.block_on(host.server().wait_listening()).unwrap();
        host.on_focus_gained(1);
        host.on_focus_lost();
        host.shutdown();

        let seen = seen.lock().unwrap();
        for kind in [
            EventKind::ServerListening,
            EventKind::FocusGranted,
            EventKind::TaskCancelled,
            EventKind::FocusRevoked,
            EventKind::ServerStopped,
        ] {
            assert!(seen.contains(&kind), "missing {kind:?}");
        }
    }
}
