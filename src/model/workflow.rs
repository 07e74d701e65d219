//! # Workflow and task definitions.
//!
//! [`Workflow`] is the named aggregate fed to the engine: an ordered task
//! list plus a [`WorkflowPolicy`]. [`Workflow::from_json`] parses the wire
//! shape and [`Workflow::validate`] enforces referential integrity of
//! `dependsOn` (acyclicity is the scheduler's job).
//!
//! ## Rules
//! - Task names are unique within a workflow.
//! - Every `dependsOn` entry names a defined sibling task.
//! - Definitions are immutable; run state lives in the reconciler.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::step::Step;

/// Retry behavior of one task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base backoff delay; retry `i` sleeps `backoff_ms * 2^i`.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    /// Returns a policy with no retries and a 100ms base delay.
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 100,
        }
    }
}

/// Where a task's extracted output should be stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    /// Key under which the task's extracted data is published.
    pub store_as: String,
    /// Output format hint (e.g. `"json"`).
    pub format: String,
}

/// One node of the workflow graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDef {
    /// Unique name within the workflow.
    pub name: String,
    /// Names of sibling tasks that must succeed first.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Ordered step sequence.
    pub steps: Vec<Step>,
    /// Retry behavior on step failure.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Optional output destination.
    #[serde(default)]
    pub output: Option<OutputSpec>,
}

/// Workflow-level execution policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowPolicy {
    /// Maximum tasks running concurrently within a batch (0 = unlimited).
    pub max_concurrent_tasks: usize,
    /// Wall-clock deadline for the whole run in milliseconds (0 = none).
    pub timeout_ms: u64,
    /// Cancel all in-flight tasks as soon as any task escalates.
    pub fail_fast: bool,
}

impl Default for WorkflowPolicy {
    /// Returns a policy with unlimited concurrency, no deadline, and
    /// fail-fast disabled.
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 0,
            timeout_ms: 0,
            fail_fast: false,
        }
    }
}

/// A named, acyclic graph of tasks with a shared execution policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow name; used as event correlation source.
    pub name: String,
    /// Tasks in definition order.
    pub tasks: Vec<TaskDef>,
    /// Execution policy.
    #[serde(default)]
    pub policy: WorkflowPolicy,
}

impl Workflow {
    /// Parses a workflow from its JSON wire shape and validates it.
    ///
    /// Unknown step `type` discriminators and `dependsOn` references to
    /// undefined tasks are both reported as [`EngineError::Parse`].
    pub fn from_json(input: &str) -> Result<Self, EngineError> {
        let wf: Workflow = serde_json::from_str(input)?;
        wf.validate()?;
        Ok(wf)
    }

    /// Validates referential integrity of the definition.
    ///
    /// Checks performed:
    /// - non-empty workflow name,
    /// - unique task names,
    /// - every `dependsOn` entry names a defined task.
    ///
    /// Acyclicity is checked by the scheduler when the graph is planned.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.is_empty() {
            return Err(EngineError::parse("workflow name must not be empty"));
        }

        let mut names: HashSet<&str> = HashSet::with_capacity(self.tasks.len());
        for task in &self.tasks {
            if !names.insert(task.name.as_str()) {
                return Err(EngineError::parse(format!(
                    "duplicate task name '{}'",
                    task.name
                )));
            }
        }

        for task in &self.tasks {
            for dep in &task.depends_on {
                if !names.contains(dep.as_str()) {
                    return Err(EngineError::parse(format!(
                        "task '{}' depends on undefined task '{}'",
                        task.name, dep
                    )));
                }
            }
        }

        Ok(())
    }

    /// Looks up a task definition by name.
    pub fn task(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.iter().find(|t| t.name == name)
    }
}
