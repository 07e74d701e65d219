//! # Per-task reconciliation state machine.
//!
//! The [`Reconciler`] is the single authority for task lifecycle state.
//! Tasks move through `Pending → Scheduled → Running` and terminate in
//! exactly one of `Succeeded` or `Escalated`; failures route through
//! `Retrying` while the retry budget lasts.

mod reconciler;
mod state;

pub use reconciler::{Reconciler, TaskStatus};
pub use state::{TaskEvent, TaskState};
