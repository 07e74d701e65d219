//! # Reconciler: the state-machine authority for task lifecycle.
//!
//! One [`TaskStatus`] per registered task, mutated only through
//! [`Reconciler::transition`]. Readers outside the runner observe via
//! [`Reconciler::snapshot`].
//!
//! ## Transition table
//! ```text
//! Pending   --schedule--> Scheduled
//! Scheduled --start-----> Running
//! Running   --succeed---> Succeeded                       (terminal)
//! Running   --fail------> Retrying   retry budget left:   retry_count += 1
//! Running   --fail------> Escalated  budget exhausted     (terminal)
//! Retrying  --retry-----> Running
//! ```
//! Any other pair is [`EngineError::InvalidTransition`]; querying an
//! unregistered task is [`EngineError::UnknownTask`]. Every mutating
//! transition refreshes `updated_at`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use crate::error::EngineError;
use crate::reconcile::state::{TaskEvent, TaskState};

/// Mutable lifecycle record of one task.
#[derive(Clone, Debug)]
pub struct TaskStatus {
    /// Current state.
    pub state: TaskState,
    /// Retries consumed so far; never exceeds the task's retry budget.
    pub retry_count: u32,
    /// Most recent failure, if any.
    pub last_error: Option<String>,
    /// Monotonic timestamp of the last transition.
    pub updated_at: Instant,
}

impl TaskStatus {
    fn new() -> Self {
        Self {
            state: TaskState::Pending,
            retry_count: 0,
            last_error: None,
            updated_at: Instant::now(),
        }
    }
}

struct Entry {
    status: TaskStatus,
    max_retries: u32,
}

/// State-machine authority for task lifecycle transitions.
///
/// Owned by the workflow runner and written only by it; concurrent readers
/// use [`snapshot`](Self::snapshot). One reconciler instance lives exactly
/// as long as its workflow run.
#[derive(Default)]
pub struct Reconciler {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Reconciler {
    /// Creates an empty reconciler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task in `Pending` with the given retry budget.
    ///
    /// Re-registering a name resets it to a fresh `Pending` record.
    pub fn register(&self, name: impl Into<String>, max_retries: u32) {
        let mut entries = self.entries.lock().expect("reconciler lock poisoned");
        entries.insert(
            name.into(),
            Entry {
                status: TaskStatus::new(),
                max_retries,
            },
        );
    }

    /// Applies `event` to the named task and returns the resulting state.
    ///
    /// `Fail` consults the retry budget: it moves the task to `Retrying`
    /// (incrementing `retry_count`) while `retry_count < max_retries`, and
    /// to `Escalated` once the budget is spent. The error is recorded in
    /// both cases.
    pub fn transition(&self, name: &str, event: TaskEvent) -> Result<TaskState, EngineError> {
        let mut entries = self.entries.lock().expect("reconciler lock poisoned");
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownTask {
                name: name.to_string(),
            })?;

        let next = match (entry.status.state, &event) {
            (TaskState::Pending, TaskEvent::Schedule) => TaskState::Scheduled,
            (TaskState::Scheduled, TaskEvent::Start) => TaskState::Running,
            (TaskState::Running, TaskEvent::Succeed) => TaskState::Succeeded,
            (TaskState::Running, TaskEvent::Fail { error }) => {
                entry.status.last_error = Some(error.clone());
                if entry.status.retry_count < entry.max_retries {
                    entry.status.retry_count += 1;
                    TaskState::Retrying
                } else {
                    TaskState::Escalated
                }
            }
            (TaskState::Retrying, TaskEvent::Retry) => TaskState::Running,
            (from, event) => {
                return Err(EngineError::InvalidTransition {
                    task: name.to_string(),
                    from: from.as_str().to_string(),
                    event: event.as_str().to_string(),
                });
            }
        };

        entry.status.state = next;
        entry.status.updated_at = Instant::now();
        Ok(next)
    }

    /// Forces a non-terminal task to `Escalated`, recording `error`.
    ///
    /// This is the cancellation/deadline path: it bypasses the retry budget
    /// because cancelled and timed-out tasks are never retried. Terminal
    /// states are rejected with `InvalidTransition`.
    pub fn escalate(&self, name: &str, error: impl Into<String>) -> Result<TaskState, EngineError> {
        let mut entries = self.entries.lock().expect("reconciler lock poisoned");
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownTask {
                name: name.to_string(),
            })?;

        if entry.status.state.is_terminal() {
            return Err(EngineError::InvalidTransition {
                task: name.to_string(),
                from: entry.status.state.as_str().to_string(),
                event: "escalate".to_string(),
            });
        }

        entry.status.state = TaskState::Escalated;
        entry.status.last_error = Some(error.into());
        entry.status.updated_at = Instant::now();
        Ok(TaskState::Escalated)
    }

    /// Returns the current status of one task.
    pub fn status(&self, name: &str) -> Result<TaskStatus, EngineError> {
        let entries = self.entries.lock().expect("reconciler lock poisoned");
        entries
            .get(name)
            .map(|e| e.status.clone())
            .ok_or_else(|| EngineError::UnknownTask {
                name: name.to_string(),
            })
    }

    /// Returns a point-in-time copy of every task's status.
    pub fn snapshot(&self) -> HashMap<String, TaskStatus> {
        let entries = self.entries.lock().expect("reconciler lock poisoned");
        entries
            .iter()
            .map(|(name, e)| (name.clone(), e.status.clone()))
            .collect()
    }
}
