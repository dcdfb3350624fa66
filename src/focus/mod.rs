//! Focus supervision: single-flight execution of work bound to a granted focus.
//!
//! The only public entry point is [`FocusSupervisor`]; the remaining types describe
//! its policy and observable state.
//!
//! Internal modules:
//! - `policy`: what a grant does while the slot is busy;
//! - `slot`: slot state and settled outcomes;
//! - `runner`: executes one grant with error/panic containment and event publishing;
//! - `supervisor`: grant/revoke and the single-flight slot.

mod policy;
mod runner;
mod slot;
mod supervisor;

pub use policy::GrantPolicy;
pub use slot::{Settled, TaskState};
pub use supervisor::FocusSupervisor;
