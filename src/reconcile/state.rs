//! # Task lifecycle states and transition events.
//!
//! [`TaskState`] enumerates the reconciliation states; [`TaskEvent`] the
//! transitions applied by the runner. The transition table itself lives in
//! [`Reconciler::transition`](crate::reconcile::Reconciler::transition).

use std::fmt;

/// Lifecycle state of one task.
///
/// `Retrying` is a distinct state rather than a flag so the runner can apply
/// backoff while the task is not `Running`. `Escalated` is distinct from a
/// failed `Succeeded` so consumers can tell retry exhaustion apart from a
/// recoverable mid-execution failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Registered, not yet admitted to a batch.
    Pending,
    /// Admitted to the current batch, not yet executing.
    Scheduled,
    /// Steps are executing.
    Running,
    /// All steps completed successfully. Terminal.
    Succeeded,
    /// A step failed and a retry is pending backoff.
    Retrying,
    /// Failed with retries exhausted, cancelled, or timed out. Terminal.
    Escalated,
}

impl TaskState {
    /// Returns the state name as it appears in event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "Pending",
            TaskState::Scheduled => "Scheduled",
            TaskState::Running => "Running",
            TaskState::Succeeded => "Succeeded",
            TaskState::Retrying => "Retrying",
            TaskState::Escalated => "Escalated",
        }
    }

    /// True for the two terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Escalated)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition applied to a task's state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskEvent {
    /// `Pending → Scheduled`.
    Schedule,
    /// `Scheduled → Running`.
    Start,
    /// `Running → Succeeded`.
    Succeed,
    /// `Running → Retrying` while retries remain, else `Running → Escalated`.
    /// Records the error either way.
    Fail {
        /// The failure being recorded.
        error: String,
    },
    /// `Retrying → Running`.
    Retry,
}

impl TaskEvent {
    /// Returns the event name used in `InvalidTransition` reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskEvent::Schedule => "schedule",
            TaskEvent::Start => "start",
            TaskEvent::Succeed => "succeed",
            TaskEvent::Fail { .. } => "fail",
            TaskEvent::Retry => "retry",
        }
    }
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
