//! # Focus work abstractions.
//!
//! This module provides the work-function interface consumed by the
//! [`FocusSupervisor`](crate::FocusSupervisor):
//! - [`FocusTask`] - trait for implementing async cancelable focus work
//! - [`TaskFn`] - function-based implementation
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn FocusTask<C>>`)

mod task;
mod task_fn;

pub use task::{BoxTaskFuture, FocusTask, TaskRef};
pub use task_fn::TaskFn;
