//! # Run one grant of focus work.
//!
//! Executes the work function of a [`FocusTask`] once, converts whatever happens into a
//! [`Settled`] outcome and publishes lifecycle events to the [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! Success:
//!   task.spawn() → Ok(())            → publish TaskCompleted
//!
//! Cancellation:
//!   task.spawn() → Err(Canceled)     → publish TaskCancelled
//!   task.spawn() → Ok(()) (token set) → publish TaskCancelled
//!
//! Failure:
//!   task.spawn() → Err(Fail)         → publish TaskFailed
//!   panic (spawn or poll)            → publish TaskFailed (Panicked)
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event.
//! - Errors and panics never leave this function; they are logged here.

use std::panic::{AssertUnwindSafe, catch_unwind};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    error::{TaskError, panic_message},
    events::{Bus, Event, EventKind},
    focus::slot::Settled,
    tasks::TaskRef,
};

/// Executes one grant of `task` with `ctx`, returning its settled outcome.
pub(super) async fn run_guarded<C: Send + 'static>(
    task: TaskRef<C>,
    ctx: C,
    token: CancellationToken,
    grant: u64,
    bus: Bus,
) -> Settled {
    bus.publish(
        Event::new(EventKind::TaskStarting)
            .with_task(task.name())
            .with_grant(grant),
    );

    let res = match catch_unwind(AssertUnwindSafe(|| task.spawn(ctx, token.clone()))) {
        Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => Err(TaskError::Panicked {
                info: panic_message(&*panic),
            }),
        },
        Err(panic) => Err(TaskError::Panicked {
            info: panic_message(&*panic),
        }),
    };

    let settled = match res {
        Ok(()) if token.is_cancelled() => Settled::Cancelled,
        Ok(()) => Settled::Completed,
        Err(TaskError::Canceled) => Settled::Cancelled,
        Err(e) => Settled::Failed(e),
    };

    publish_settled(&bus, task.name(), grant, &settled);
    settled
}

fn publish_settled(bus: &Bus, name: &str, grant: u64, settled: &Settled) {
    let ev = match settled {
        Settled::Completed => {
            debug!(task = name, grant, "focus task completed");
            Event::new(EventKind::TaskCompleted)
        }
        Settled::Cancelled => {
            debug!(task = name, grant, "focus task cancelled");
            Event::new(EventKind::TaskCancelled)
        }
        Settled::Failed(e) => {
            error!(task = name, grant, label = e.as_label(), error = %e, "focus task failed");
            Event::new(EventKind::TaskFailed).with_reason(e.to_string())
        }
    };
    bus.publish(ev.with_task(name).with_grant(grant));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskFn;

    async fn settle<F, Fut>(f: F, token: CancellationToken) -> (Settled, EventKind)
    where
        F: Fn((), CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let task: TaskRef<()> = TaskFn::arc("sample", f);
        let settled = run_guarded(task, (), token, 1, bus).await;

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::TaskStarting);
        let last = rx.recv().await.unwrap();
        assert_eq!(last.grant, Some(1));
        (settled, last.kind)
    }

    #[tokio::test]
    async fn test_ok_is_completed() {
        let (settled, kind) =
            settle(|_, _| async { Ok::<(), TaskError>(()) }, CancellationToken::new()).await;
        assert_eq!(settled, Settled::Completed);
        assert_eq!(kind, EventKind::TaskCompleted);
    }

    #[tokio::test]
    async fn test_ok_after_cancel_is_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let (settled, kind) = settle(|_, _| async { Ok::<(), TaskError>(()) }, token).await;
        assert_eq!(settled, Settled::Cancelled);
        assert_eq!(kind, EventKind::TaskCancelled);
    }

    #[tokio::test]
    async fn test_error_is_failed() {
        let (settled, kind) = settle(
            |_, _| async { Err::<(), TaskError>(TaskError::fail("boom")) },
            CancellationToken::new(),
        )
        .await;
        assert_eq!(settled, Settled::Failed(TaskError::fail("boom")));
        assert_eq!(kind, EventKind::TaskFailed);
    }

    #[tokio::test]
    async fn test_panic_while_polling_is_failed() {
        let (settled, kind) = settle(
            |_, _| async {
                if true {
                    panic!("poll panic");
                }
                Ok::<(), TaskError>(())
            },
            CancellationToken::new(),
        )
        .await;
        assert_eq!(
            settled,
            Settled::Failed(TaskError::Panicked {
                info: "poll panic".into()
            })
        );
        assert_eq!(kind, EventKind::TaskFailed);
    }

    #[tokio::test]
    async fn test_panic_while_spawning_is_failed() {
        fn exploding(_: (), _: CancellationToken) -> std::future::Ready<Result<(), TaskError>> {
            panic!("spawn panic");
        }

        let (settled, _) = settle(exploding, CancellationToken::new()).await;
        assert!(settled.is_failed());
    }
}
