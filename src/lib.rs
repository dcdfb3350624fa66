//! # focusvisor
//!
//! **Focusvisor** runs work that is only allowed while a host holds *focus*, next to
//! an embedded line-oriented TCP command server.
//!
//! It provides a focus-scoped supervisor (grant/revoke, single-flight, cooperative
//! cancel-and-await), a start/stop TCP echo server with one handler per connection,
//! and a [`LifecycleBridge`] that maps host lifecycle callbacks onto both.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!        host callbacks (create / destroy / focus gained / focus lost)
//!                                   │
//!                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Host (LifecycleBridge)                                           │
//! │  - tokio Runtime (multi-thread)                                   │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        ▼                                              ▼
//! ┌──────────────────────┐                   ┌──────────────────────┐
//! │    CommandServer     │                   │   FocusSupervisor    │
//! │  start(port) / stop  │                   │   grant / revoke     │
//! └──────┬───────────────┘                   └──────┬───────────────┘
//!        ▼                                          ▼
//!   accept loop ──► ConnectionHandler (1/conn)   focus task (≤ 1 active)
//!        │                  │                       │
//!        │ Publishes        │ Publishes             │ Publishes
//!        │ - ServerListening│ - ConnectionOpened    │ - FocusGranted
//!        │ - BindFailed     │ - ConnectionFailed    │ - TaskCancelled
//!        │ - ServerStopped  │ - ConnectionClosed    │ - FocusRevoked ...
//!        ▼                  ▼                       ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                  (capacity: Config::bus_capacity)                 │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  forwarding listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                          (per-sub queues)
//!                       ┌───────────┼───────────┐
//!                       ▼           ▼           ▼
//!                    worker1     worker2     workerN
//! ```
//!
//! ### Focus lifecycle
//! ```text
//! grant(ctx)
//!   ├─ slot busy?
//!   │    ├─ GrantPolicy::Reject  ─► GrantRejected, Err(ConcurrentGrant)
//!   │    └─ GrantPolicy::Replace ─► cancel token, await settle, continue
//!   ├─► publish FocusGranted, state = Running
//!   └─► spawn work(ctx, token) ─► Completed | Cancelled | Failed
//!
//! revoke()
//!   ├─► state = Cancelling, cancel token, publish CancelRequested
//!   ├─► await settle (no timeout)
//!   └─► state = Idle, publish FocusRevoked
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                          |
//! |-------------------|----------------------------------------------------------------|---------------------------------------------|
//! | **Focus**         | Single-flight focus-bound work with cancel-and-await.          | [`FocusSupervisor`], [`GrantPolicy`]        |
//! | **Server**        | Line echo TCP server with explicit start/stop.                 | [`CommandServer`], [`ConnectionHandler`]    |
//! | **Bridge**        | Drive everything from synchronous host callbacks.              | [`LifecycleBridge`], [`Host`]               |
//! | **Subscriber API**| Hook into focus and server events.                             | [`Subscribe`], [`SubscriberSet`]            |
//! | **Errors**        | Typed errors for the server, focus work and grants.            | [`ServerError`], [`TaskError`], [`GrantError`] |
//! | **Tasks**         | Define focus work as closures.                                 | [`FocusTask`], [`TaskFn`], [`TaskRef`]      |
//! | **Configuration** | Centralize runtime settings.                                   | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber.
//! - `cli`: builds the `focus-host` binary (implies `logging`).
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use focusvisor::{Config, Host, LifecycleBridge, TaskError, TaskFn, TaskRef};
//! use tokio_util::sync::CancellationToken;
//!
//! let work: TaskRef<()> = TaskFn::arc("patrol", |_ctx: (), token: CancellationToken| async move {
//!     while !token.is_cancelled() {
//!         tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//!     }
//!     Ok::<(), TaskError>(())
//! });
//!
//! #[cfg(feature = "logging")]
//! let subs: Vec<Arc<dyn focusvisor::Subscribe>> = vec![Arc::new(focusvisor::LogWriter::new())];
//! #[cfg(not(feature = "logging"))]
//! let subs: Vec<Arc<dyn focusvisor::Subscribe>> = Vec::new();
//!
//! let host = Host::builder(Config::default(), work)
//!     .with_subscribers(subs)
//!     .build()?;
//!
//! host.on_create();           // server listens on 0.0.0.0:12345
//! host.on_focus_gained(());   // patrol starts
//! host.on_focus_lost();       // patrol cancelled and awaited
//! host.on_destroy();          // listener closed
//! # Ok::<(), std::io::Error>(())
//! ```
mod bridge;
mod config;
mod error;
mod events;
mod focus;
mod subscribers;
mod tasks;

pub mod server;

// ---- Public re-exports ----

pub use bridge::{Host, HostBuilder, LifecycleBridge, wait_for_shutdown_signal};
pub use config::Config;
pub use error::{GrantError, ServerError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use focus::{FocusSupervisor, GrantPolicy, Settled, TaskState};
pub use server::{CommandServer, ConnectionHandler, DEFAULT_PORT, REPLY_PREFIX, ServerStatus};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{BoxTaskFuture, FocusTask, TaskFn, TaskRef};

// Optional: expose a simple built-in logger subscriber.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
