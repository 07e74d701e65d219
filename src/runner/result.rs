//! # Workflow run summary.
//!
//! [`WorkflowResult`] is what `run` hands back: per-task final state, retry
//! count, and last error, plus a workflow-level status and the aggregate
//! error list.

use std::collections::BTreeMap;

use crate::reconcile::TaskState;

/// Workflow-level outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowStatus {
    /// Every task reached `Succeeded`.
    Succeeded,
    /// One or more tasks escalated; the run completed all batches.
    Failed,
    /// Fail-fast cancelled the run after the first escalation.
    FailedFast,
    /// The workflow deadline expired.
    TimedOut,
}

impl WorkflowStatus {
    /// Returns the status string used in `workflow.finished` payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Succeeded => "succeeded",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::FailedFast => "failedFast",
            WorkflowStatus::TimedOut => "timedOut",
        }
    }
}

/// Final record of one task.
#[derive(Clone, Debug)]
pub struct TaskReport {
    /// Terminal state (`Succeeded` or `Escalated`).
    pub state: TaskState,
    /// Retries consumed.
    pub retry_count: u32,
    /// Last recorded error, if any.
    pub last_error: Option<String>,
}

/// Summary of a finished workflow run.
#[derive(Clone, Debug)]
pub struct WorkflowResult {
    /// Workflow name.
    pub workflow: String,
    /// Workflow-level outcome.
    pub status: WorkflowStatus,
    /// Per-task reports, ordered by task name.
    pub tasks: BTreeMap<String, TaskReport>,
    /// One entry per escalated task: `"<task>: <error>"`.
    pub errors: Vec<String>,
}

impl WorkflowResult {
    /// True when every task succeeded.
    pub fn succeeded(&self) -> bool {
        self.status == WorkflowStatus::Succeeded
    }
}
