//! # focus-host
//!
//! Runs a [`Host`] as a standalone process: the command server listens for the whole
//! process lifetime and a heartbeat focus task holds focus until a termination signal.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► on_create          (server binds, accept loop running)
//!   ├─► on_focus_gained    (heartbeat starts ticking)
//!   ├─► wait for SIGINT / SIGTERM / SIGQUIT
//!   ├─► on_focus_lost      (heartbeat cancelled and awaited)
//!   ├─► on_destroy         (listener closed)
//!   └─► shutdown           (subscribers drained)
//! ```
//!
//! ## Run
//! ```bash
//! focus-host --port 12345 --policy replace
//! printf 'ping\n' | nc localhost 12345
//! ```

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use focusvisor::{
    Config, DEFAULT_PORT, GrantPolicy, Host, LifecycleBridge, LogWriter, Subscribe, TaskError,
    TaskFn, TaskRef, wait_for_shutdown_signal,
};

#[derive(Parser, Debug)]
#[command(name = "focus-host", version, about = "Focus-scoped task host with a line echo command server")]
struct Args {
    /// Port of the command server (0 = ephemeral).
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Interface the command server binds to.
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// What a grant does while focus work is still active.
    #[arg(long, value_enum, default_value_t = PolicyArg::Reject)]
    policy: PolicyArg,

    /// Close accepted connections when the server stops.
    #[arg(long)]
    drain_on_stop: bool,

    /// Runtime worker threads (0 = one per core).
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Heartbeat period of the focus task in milliseconds.
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_ms: u64,

    /// Enable debug logging (including the event stream).
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Reject,
    Replace,
}

impl From<PolicyArg> for GrantPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Reject => GrantPolicy::Reject,
            PolicyArg::Replace => GrantPolicy::Replace,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let cfg = Config {
        host: args.host,
        port: args.port,
        grant_policy: args.policy.into(),
        drain_connections_on_stop: args.drain_on_stop,
        worker_threads: args.workers,
        ..Config::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let host = Host::builder(cfg, heartbeat(Duration::from_millis(args.heartbeat_ms)))
        .with_subscribers(subs)
        .build()
        .context("failed to build host runtime")?;

    host.on_create();
    match host.block_on(host.server().wait_listening()) {
        Ok(addr) => info!(%addr, "accepting commands"),
        Err(e) => warn!(error = %e, "running without command server"),
    }

    host.on_focus_gained("focus-host".to_string());

    let signal = host
        .block_on(wait_for_shutdown_signal())
        .context("failed to install signal handlers")?;
    info!(signal, "shutdown signal received");

    host.on_focus_lost();
    host.on_destroy();
    host.shutdown();
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("focusvisor=debug,focus_host=debug")
        } else {
            EnvFilter::new("focusvisor=info,focus_host=info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Focus work that ticks until focus is lost.
fn heartbeat(period: Duration) -> TaskRef<String> {
    TaskFn::arc("heartbeat", move |holder: String, token: CancellationToken| async move {
        let mut interval = tokio::time::interval(period);
        let mut ticks = 0u64;
        info!(%holder, "heartbeat started");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!(%holder, ticks, "heartbeat stopped");
                    return Err::<(), TaskError>(TaskError::Canceled);
                }
                _ = interval.tick() => {
                    ticks += 1;
                    debug!(%holder, ticks, "heartbeat");
                }
            }
        }
    })
}
