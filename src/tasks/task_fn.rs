//! # Function-backed focus work (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(C, CancellationToken) -> Fut`, producing a fresh
//! future per grant. This avoids shared mutable state between grants and needs no `Mutex`.
//!
//! ## Concurrency semantics
//! - Each call to [`FocusTask::spawn`] creates a **new** future owning its state
//!   and the focus context.
//! - No hidden mutation between grants; if shared state is needed, capture an
//!   `Arc<...>` explicitly in the closure.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use focusvisor::{TaskError, TaskFn, TaskRef};
//!
//! let t: TaskRef<String> = TaskFn::arc("patrol", |zone: String, token: CancellationToken| async move {
//!     loop {
//!         tokio::select! {
//!             _ = token.cancelled() => return Err::<(), TaskError>(TaskError::Canceled),
//!             _ = tokio::time::sleep(Duration::from_millis(100)) => {
//!                 println!("patrolling {zone}");
//!             }
//!         }
//!     }
//! });
//!
//! assert_eq!(t.name(), "patrol");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::task::{BoxTaskFuture, FocusTask};

/// Function-backed focus work.
///
/// Wraps a closure that *creates* a new future per grant.
#[derive(Debug)]
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`](crate::TaskRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<C, F, Fut> FocusTask<C> for TaskFn<F>
where
    F: Fn(C, CancellationToken) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(&self, ctx: C, token: CancellationToken) -> BoxTaskFuture {
        Box::pin((self.f)(ctx, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskRef;

    #[tokio::test]
    async fn test_spawn_passes_context_and_token() {
        let t: TaskRef<u32> = TaskFn::arc("double", |n: u32, token: CancellationToken| async move {
            if token.is_cancelled() {
                return Err(TaskError::Canceled);
            }
            if n * 2 == 42 {
                Ok(())
            } else {
                Err(TaskError::fail(format!("unexpected context {n}")))
            }
        });

        assert_eq!(t.name(), "double");
        assert_eq!(t.spawn(21, CancellationToken::new()).await, Ok(()));

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert_eq!(t.spawn(21, cancelled).await, Err(TaskError::Canceled));
    }

    #[tokio::test]
    async fn test_each_spawn_is_a_fresh_future() {
        let t = TaskFn::arc("echo", |s: String, _token: CancellationToken| async move {
            if s.is_empty() {
                Err(TaskError::fail("empty"))
            } else {
                Ok(())
            }
        });

        assert!(t.spawn(String::new(), CancellationToken::new()).await.is_err());
        assert!(t.spawn("x".to_string(), CancellationToken::new()).await.is_ok());
    }
}
