//! # Focus work abstraction.
//!
//! This module defines the [`FocusTask`] trait: an async, cancelable unit of work that runs
//! under a focus context `C`. The common handle type is [`TaskRef`], an
//! `Arc<dyn FocusTask<C>>` suitable for sharing across the runtime.
//!
//! A task receives the focus context by value plus a [`CancellationToken`]; it must
//! observe the token at its own suspension points and return promptly once cancelled.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Boxed future returned by [`FocusTask::spawn`].
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;

/// Shared handle to focus work.
pub type TaskRef<C> = Arc<dyn FocusTask<C>>;

/// # Asynchronous, cancelable focus work.
///
/// A `FocusTask` has a stable [`name`](FocusTask::name) and a [`spawn`](FocusTask::spawn)
/// method that creates a **new** future per grant. The context is never inspected by
/// the supervisor; it is simply moved into the future.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use focusvisor::{BoxTaskFuture, FocusTask, TaskError};
///
/// struct Greeter;
///
/// impl FocusTask<String> for Greeter {
///     fn name(&self) -> &str { "greeter" }
///
///     fn spawn(&self, who: String, token: CancellationToken) -> BoxTaskFuture {
///         Box::pin(async move {
///             if token.is_cancelled() {
///                 return Err(TaskError::Canceled);
///             }
///             println!("hello {who}");
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait FocusTask<C>: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Creates the future executing this work for one grant.
    ///
    /// Implementations should check `token` and exit quickly once it is cancelled,
    /// preferably returning [`TaskError::Canceled`].
    fn spawn(&self, ctx: C, token: CancellationToken) -> BoxTaskFuture;
}
