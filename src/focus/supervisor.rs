//! # FocusSupervisor: single-flight execution of focus-bound work.
//!
//! The [`FocusSupervisor`] owns one slot. A grant starts the work function with the
//! granted context on a dedicated lane; a revoke cancels it and waits until it has
//! settled before returning.
//!
//! The lane is a thread of the runtime's blocking pool that drives the work through
//! `Handle::block_on`. Work that blocks its thread (sensor reads, sleeps, FFI calls)
//! therefore never starves the runtime workers serving connections, even with a
//! single worker thread. Timers and sockets used by the work are still driven by the
//! runtime.
//!
//! ## Architecture
//! ```text
//! grant(ctx) ──► lock slot ──► reap settled task (if any)
//!                   │
//!                   ├─ slot busy + Reject  ─► publish GrantRejected ─► Err(ConcurrentGrant)
//!                   ├─ slot busy + Replace ─► cancel ─► await Settled ─┐
//!                   └─ slot idle ──────────────────────────────────────┴─► spawn run_guarded
//!                                                                          publish FocusGranted
//!
//! revoke() ──► lock slot ──► reap settled task (if any)
//!                   │
//!                   ├─ slot idle ─► None
//!                   └─ slot busy ─► token.cancel() ──► await Settled ──► clear slot
//!                                   publish CancelRequested            publish FocusRevoked
//! ```
//!
//! ## Rules
//! - The slot lock is held across cancel-and-await, so grants and revokes are totally ordered.
//! - A task handle leaves the slot only after its task has settled. A caller that
//!   stops waiting (timeout, `select!`) leaves the task in the slot, and the next
//!   grant or revoke waits for it again.
//! - A task that settled on its own is reaped silently: revoke then returns `None`.
//! - Waiting happens on the caller's task; the focus work runs on its own lane.
//! - Dropping the supervisor cancels a task that is still running.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::{GrantError, TaskError},
    events::{Bus, Event, EventKind},
    focus::{
        policy::GrantPolicy,
        runner::run_guarded,
        slot::{Active, Settled, SlotState, TaskState},
    },
    tasks::TaskRef,
};

/// Runs at most one focus task at a time and retires it on revoke.
pub struct FocusSupervisor<C> {
    task: TaskRef<C>,
    policy: GrantPolicy,
    bus: Bus,
    slot: Mutex<SlotState>,
    state: Arc<watch::Sender<TaskState>>,
    next_grant: AtomicU64,
}

impl<C: Send + 'static> FocusSupervisor<C> {
    /// Creates an idle supervisor for `task`.
    pub fn new(task: TaskRef<C>, policy: GrantPolicy, bus: Bus) -> Self {
        let (state, _) = watch::channel(TaskState::Idle);
        Self {
            task,
            policy,
            bus,
            slot: Mutex::new(SlotState::new()),
            state: Arc::new(state),
            next_grant: AtomicU64::new(0),
        }
    }

    /// Name of the supervised work.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Configured grant policy.
    pub fn policy(&self) -> GrantPolicy {
        self.policy
    }

    /// Current slot state. A task that settled on its own is reported as `Idle`.
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Returns true while a task is running or being cancelled.
    pub fn is_active(&self) -> bool {
        !matches!(self.state(), TaskState::Idle)
    }

    /// Returns a receiver that observes every slot state change.
    pub fn watch_state(&self) -> watch::Receiver<TaskState> {
        self.state.subscribe()
    }

    /// Starts the work function with `ctx` and returns the new grant id.
    ///
    /// If a task is still active, the [`GrantPolicy`] decides: `Reject` returns
    /// [`GrantError::ConcurrentGrant`], `Replace` cancels the active task and waits for
    /// it to settle before starting the new one. Must be called inside a tokio runtime.
    pub async fn grant(&self, ctx: C) -> Result<u64, GrantError> {
        let mut slot = self.slot.lock().await;
        self.reap_settled(&mut slot).await;

        if let Some(active) = slot.active.as_ref().map(|a| a.grant) {
            match self.policy {
                GrantPolicy::Reject => {
                    let err = GrantError::ConcurrentGrant { active };
                    warn!(task = self.name(), active, "{err}");
                    self.bus.publish(
                        Event::new(EventKind::GrantRejected)
                            .with_task(self.name())
                            .with_grant(active)
                            .with_reason(err.as_label()),
                    );
                    return Err(err);
                }
                GrantPolicy::Replace => {
                    if let Some((grant, settled)) = self.cancel_and_wait(&mut slot, "replace").await
                    {
                        info!(task = self.name(), grant, ?settled, "focus task replaced");
                    }
                }
            }
        }

        let grant = self.next_grant.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();

        info!(task = self.name(), grant, "focus granted");
        self.bus.publish(
            Event::new(EventKind::FocusGranted)
                .with_task(self.name())
                .with_grant(grant),
        );

        // Running must be visible before the task can settle and reset it.
        self.state.send_replace(TaskState::Running {
            grant,
            since: Instant::now(),
        });
        let join = self.spawn_task(ctx, token.clone(), grant);
        slot.active = Some(Active { grant, token, join });
        Ok(grant)
    }

    /// Cancels the active task and waits until it has settled.
    ///
    /// Returns the settled outcome, or `None` when no task occupied the slot or the
    /// task had already settled on its own. Calling it again with nothing to revoke
    /// is harmless.
    pub async fn revoke(&self) -> Option<Settled> {
        let mut slot = self.slot.lock().await;
        self.reap_settled(&mut slot).await;

        let Some((grant, settled)) = self.cancel_and_wait(&mut slot, "revoke").await else {
            debug!(task = self.name(), "revoke without an active focus task");
            return None;
        };

        info!(task = self.name(), grant, ?settled, "focus revoked");
        self.bus.publish(
            Event::new(EventKind::FocusRevoked)
                .with_task(self.name())
                .with_grant(grant),
        );
        Some(settled)
    }

    fn spawn_task(&self, ctx: C, token: CancellationToken, grant: u64) -> JoinHandle<Settled> {
        let task = Arc::clone(&self.task);
        let bus = self.bus.clone();
        let state = Arc::clone(&self.state);
        let handle = Handle::current();

        tokio::task::spawn_blocking(move || {
            let settled = handle.block_on(run_guarded(task, ctx, token, grant, bus));
            state.send_if_modified(|s| {
                if s.grant() == Some(grant) {
                    *s = TaskState::Idle;
                    true
                } else {
                    false
                }
            });
            settled
        })
    }

    /// Clears a task that already settled on its own.
    async fn reap_settled(&self, slot: &mut SlotState) {
        if !slot.is_settled() {
            return;
        }
        if let Some(mut active) = slot.active.take() {
            let settled = join_settled(&mut active.join).await;
            debug!(task = self.name(), grant = active.grant, ?settled, "reaped settled focus task");
        }
    }

    /// Cancels the task occupying the slot and waits for it to settle.
    async fn cancel_and_wait(
        &self,
        slot: &mut SlotState,
        reason: &'static str,
    ) -> Option<(u64, Settled)> {
        let active = slot.active.as_mut()?;
        let grant = active.grant;

        // A wait interrupted earlier already cancelled the token; only wait again.
        if !active.token.is_cancelled() {
            self.state.send_replace(TaskState::Cancelling {
                grant,
                since: Instant::now(),
            });
            active.token.cancel();
            self.bus.publish(
                Event::new(EventKind::CancelRequested)
                    .with_task(self.name())
                    .with_grant(grant)
                    .with_reason(reason),
            );
        }

        let settled = join_settled(&mut active.join).await;
        slot.active = None;
        self.state.send_replace(TaskState::Idle);
        Some((grant, settled))
    }
}

impl<C> Drop for FocusSupervisor<C> {
    fn drop(&mut self) {
        if let Some(active) = self.slot.get_mut().active.as_ref() {
            active.token.cancel();
        }
    }
}

async fn join_settled(join: &mut JoinHandle<Settled>) -> Settled {
    match join.await {
        Ok(settled) => settled,
        Err(e) if e.is_cancelled() => Settled::Cancelled,
        Err(e) => Settled::Failed(TaskError::Panicked {
            info: e.to_string(),
        }),
    }
}
