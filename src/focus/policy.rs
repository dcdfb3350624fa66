//! # Grant admission policy
//!
//! The focus supervisor owns a single **slot**. At any given time at most **one**
//! focus task may occupy it. When a grant arrives while the slot is occupied by a
//! task that has not settled yet, the grant policy decides what to do.
//!
//! ## Variants
//! - `Reject`: refuse the new grant with [`GrantError::ConcurrentGrant`](crate::GrantError).
//! - `Replace`: **cancel** the running task, **await** its settlement, then start the new one.
//!
//! ## Invariants
//! - Focus tasks never run in parallel, whichever policy is chosen.
//! - A grant never silently drops the handle of a task that is still running.

/// Policy controlling how a grant is handled when the slot is busy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GrantPolicy {
    /// Refuse the grant while a task is active.
    ///
    /// Use when:
    /// - The focus source promises strictly alternating grant/revoke calls
    /// - A second grant indicates a bug that should be surfaced
    #[default]
    Reject,

    /// Cancel the active task, wait until it settles, then start the new one.
    ///
    /// Use when:
    /// - A new focus grant invalidates whatever the previous one was doing
    /// - The focus source may miss a focus-lost notification
    Replace,
}

impl GrantPolicy {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            GrantPolicy::Reject => "reject",
            GrantPolicy::Replace => "replace",
        }
    }
}
