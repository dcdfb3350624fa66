use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Final state of one supervised focus task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    /// Work returned `Ok(())` without being cancelled.
    Completed,
    /// Work stopped after its cancellation token was triggered.
    Cancelled,
    /// Work returned an error or panicked.
    Failed(TaskError),
}

impl Settled {
    /// Returns true for [`Settled::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, Settled::Failed(_))
    }
}

/// Observable state of the supervisor's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// No task running, ready to accept a grant.
    Idle,

    /// Task currently running.
    Running {
        /// Grant id of the task.
        grant: u64,
        /// When the task started.
        since: Instant,
    },

    /// Task is being cancelled (waiting for it to settle).
    Cancelling {
        /// Grant id of the task.
        grant: u64,
        /// When cancellation was requested.
        since: Instant,
    },
}

impl TaskState {
    /// Grant id of the task occupying the slot, if any.
    pub fn grant(&self) -> Option<u64> {
        match self {
            TaskState::Idle => None,
            TaskState::Running { grant, .. } | TaskState::Cancelling { grant, .. } => Some(*grant),
        }
    }
}

/// Handle to the task occupying the slot.
pub(super) struct Active {
    pub grant: u64,
    pub token: CancellationToken,
    pub join: JoinHandle<Settled>,
}

/// State of the single focus slot.
///
/// The observable [`TaskState`] lives in the supervisor's watch channel; this holds
/// only the handle of the task occupying the slot.
pub(super) struct SlotState {
    pub active: Option<Active>,
}

impl SlotState {
    /// Creates a new idle slot.
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Returns true if the occupying task has already settled on its own.
    pub fn is_settled(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.join.is_finished())
    }
}
