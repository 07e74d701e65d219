//! # WorkflowRunner: drives a workflow to completion.
//!
//! One [`TaskDriver`] per task, spawned batch by batch. Batches never
//! overlap; inside a batch, drivers run concurrently under the concurrency
//! cap (tokio's FIFO semaphore preserves insertion-order admission).
//!
//! ## Architecture
//! ```text
//! Workflow ──► plan() ──► [batch 0] [batch 1] ...
//!                              │
//!                              ├──► TaskDriver::run()  (JoinSet, capped)
//!                              │        ├─► schedule → start
//!                              │        ├─► steps via StepExecutor
//!                              │        │     probes: BeforeAction / AfterAction
//!                              │        │             OnNavigation / OnError
//!                              │        ├─► fail → backoff → retry (from step 0)
//!                              │        └─► Succeeded | Escalated
//!                              │
//!                              └──► join: first escalation + failFast
//!                                   ⇒ cancel token, abandon later batches
//! ```
//!
//! ## Rules
//! - The deadline, fail-fast, and external cancellation all funnel into one
//!   cancellation token; every sleep and step await races against it.
//! - A cancelled step escalates its task with the canonical `Cancelled`
//!   error and is never retried.
//! - After the drive finishes, tasks still non-terminal (unreached batches,
//!   deadline expiry) are swept to `Escalated` so every task ends terminal.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, StepError};
use crate::events::Event;
use crate::exec::{PageHandle, StepContext, StepExecutor, StepResult};
use crate::model::{Step, TaskDef, Workflow};
use crate::probes::{Embedder, Phase, ProbeContext};
use crate::reconcile::{Reconciler, TaskEvent, TaskState};
use crate::runner::result::{TaskReport, WorkflowResult, WorkflowStatus};
use crate::scheduler::{plan, ExecutionPlan};

/// Source identifier stamped on runner-emitted events.
const SOURCE: &str = "runner";

/// Canonical error recorded on cancelled tasks.
const CANCELLED: &str = "Cancelled";

/// Canonical error recorded on tasks cut off by the workflow deadline.
const TIMEOUT_EXCEEDED: &str = "TimeoutExceeded";

struct DriveOutcome {
    failed_fast: bool,
    timed_out: bool,
}

/// Top-level workflow coordinator.
pub struct WorkflowRunner {
    executor: Arc<dyn StepExecutor>,
    embedder: Arc<Embedder>,
    cfg: EngineConfig,
}

impl WorkflowRunner {
    /// Creates a runner executing steps with `executor` and observing
    /// through `embedder`.
    pub fn new(executor: Arc<dyn StepExecutor>, embedder: Arc<Embedder>, cfg: EngineConfig) -> Self {
        Self {
            executor,
            embedder,
            cfg,
        }
    }

    /// Runs `workflow` against `page` to completion.
    pub async fn run(
        &self,
        workflow: &Workflow,
        page: Arc<dyn PageHandle>,
        session_id: &str,
    ) -> Result<WorkflowResult, EngineError> {
        self.run_with_token(workflow, page, session_id, CancellationToken::new())
            .await
    }

    /// Runs `workflow`, additionally honoring an external cancellation
    /// token supplied by the embedding process.
    pub async fn run_with_token(
        &self,
        workflow: &Workflow,
        page: Arc<dyn PageHandle>,
        session_id: &str,
        external: CancellationToken,
    ) -> Result<WorkflowResult, EngineError> {
        let reconciler = Arc::new(Reconciler::new());
        for task in &workflow.tasks {
            reconciler.register(&task.name, task.retry.max_retries);
        }

        info!(workflow = %workflow.name, tasks = workflow.tasks.len(), "workflow starting");
        self.embedder.emit(
            Event::now("workflow.started", SOURCE, session_id)
                .with_field("workflow", workflow.name.clone())
                .with_field("taskCount", workflow.tasks.len()),
        );

        let execution_plan = match plan(workflow) {
            Ok(p) => p,
            Err(e) => {
                warn!(workflow = %workflow.name, error = %e, "workflow planning failed");
                self.emit_finished(workflow, session_id, "failed", false);
                return Err(e);
            }
        };

        let token = external.child_token();
        let outcome = {
            let drive = self.drive(workflow, &execution_plan, &reconciler, &page, session_id, &token);
            tokio::pin!(drive);

            if workflow.policy.timeout_ms > 0 {
                let deadline = time::sleep(Duration::from_millis(workflow.policy.timeout_ms));
                tokio::pin!(deadline);
                tokio::select! {
                    outcome = &mut drive => outcome,
                    _ = &mut deadline => {
                        warn!(workflow = %workflow.name, "workflow deadline expired");
                        token.cancel();
                        // Let in-flight drivers settle on the cancelled token.
                        let mut outcome = (&mut drive).await;
                        outcome.timed_out = true;
                        outcome
                    }
                }
            } else {
                drive.await
            }
        };

        // Sweep tasks the drive never finished (unreached batches, deadline
        // expiry) so every task ends in a terminal state.
        let sweep_error = if outcome.timed_out {
            TIMEOUT_EXCEEDED
        } else {
            CANCELLED
        };
        for task in &workflow.tasks {
            let state = reconciler
                .status(&task.name)
                .expect("registered task")
                .state;
            if !state.is_terminal() {
                reconciler
                    .escalate(&task.name, sweep_error)
                    .expect("non-terminal task escalates");
                let retry_count = reconciler
                    .status(&task.name)
                    .expect("registered task")
                    .retry_count;
                self.emit_transition(session_id, &task.name, state, TaskState::Escalated, retry_count, Some(sweep_error));
            }
        }

        let snapshot = reconciler.snapshot();
        let any_escalated = snapshot
            .values()
            .any(|s| s.state == TaskState::Escalated);
        let status = if outcome.timed_out {
            WorkflowStatus::TimedOut
        } else if outcome.failed_fast {
            WorkflowStatus::FailedFast
        } else if any_escalated {
            WorkflowStatus::Failed
        } else {
            WorkflowStatus::Succeeded
        };

        let mut tasks = BTreeMap::new();
        let mut errors = Vec::new();
        for (name, s) in snapshot {
            if s.state == TaskState::Escalated {
                if let Some(err) = &s.last_error {
                    errors.push(format!("{name}: {err}"));
                }
            }
            tasks.insert(
                name,
                TaskReport {
                    state: s.state,
                    retry_count: s.retry_count,
                    last_error: s.last_error,
                },
            );
        }
        errors.sort();

        info!(workflow = %workflow.name, status = status.as_str(), "workflow finished");
        self.emit_finished(workflow, session_id, status.as_str(), status == WorkflowStatus::Succeeded);

        Ok(WorkflowResult {
            workflow: workflow.name.clone(),
            status,
            tasks,
            errors,
        })
    }

    async fn drive(
        &self,
        workflow: &Workflow,
        execution_plan: &ExecutionPlan,
        reconciler: &Arc<Reconciler>,
        page: &Arc<dyn PageHandle>,
        session_id: &str,
        token: &CancellationToken,
    ) -> DriveOutcome {
        let cap = if workflow.policy.max_concurrent_tasks > 0 {
            workflow.policy.max_concurrent_tasks
        } else {
            self.cfg.max_concurrent
        };
        let semaphore = match cap {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        let mut failed_fast = false;

        for batch in &execution_plan.batches {
            if token.is_cancelled() {
                break;
            }

            let mut set: JoinSet<TaskState> = JoinSet::new();
            for name in batch {
                let task = workflow.task(name).expect("planned task exists").clone();
                let driver = TaskDriver {
                    task,
                    reconciler: Arc::clone(reconciler),
                    embedder: Arc::clone(&self.embedder),
                    executor: Arc::clone(&self.executor),
                    page: Arc::clone(page),
                    session_id: session_id.to_string(),
                    semaphore: semaphore.clone(),
                };
                set.spawn(driver.run(token.child_token()));
            }

            while let Some(joined) = set.join_next().await {
                let state = joined.expect("task routine panicked");
                if state == TaskState::Escalated
                    && workflow.policy.fail_fast
                    && !token.is_cancelled()
                {
                    debug!(workflow = %workflow.name, "fail-fast: cancelling in-flight tasks");
                    failed_fast = true;
                    token.cancel();
                }
            }
        }

        DriveOutcome {
            failed_fast,
            timed_out: false,
        }
    }

    fn emit_transition(
        &self,
        session_id: &str,
        task: &str,
        from: TaskState,
        to: TaskState,
        retry_count: u32,
        error: Option<&str>,
    ) {
        let mut event = Event::now("task.transition", SOURCE, session_id)
            .with_task(task)
            .with_field("from", from.as_str())
            .with_field("to", to.as_str())
            .with_field("retryCount", retry_count);
        if let Some(error) = error {
            event = event.with_field("error", error);
        }
        self.embedder.emit(event);
    }

    fn emit_finished(&self, workflow: &Workflow, session_id: &str, status: &str, success: bool) {
        self.embedder.emit(
            Event::now("workflow.finished", SOURCE, session_id)
                .with_field("workflow", workflow.name.clone())
                .with_field("status", status)
                .with_field("success", success),
        );
    }
}

enum AttemptOutcome {
    Success,
    Cancelled,
    Failed(StepError),
}

/// Drives one task: admission, state transitions, step execution, retries.
struct TaskDriver {
    task: TaskDef,
    reconciler: Arc<Reconciler>,
    embedder: Arc<Embedder>,
    executor: Arc<dyn StepExecutor>,
    page: Arc<dyn PageHandle>,
    session_id: String,
    semaphore: Option<Arc<Semaphore>>,
}

impl TaskDriver {
    async fn run(self, token: CancellationToken) -> TaskState {
        let _permit = match &self.semaphore {
            Some(sem) => {
                tokio::select! {
                    permit = sem.clone().acquire_owned() => match permit {
                        Ok(p) => Some(p),
                        Err(_closed) => return self.escalate_cancelled(),
                    },
                    _ = token.cancelled() => return self.escalate_cancelled(),
                }
            }
            None => None,
        };
        if token.is_cancelled() {
            return self.escalate_cancelled();
        }

        self.apply(TaskEvent::Schedule);
        self.apply(TaskEvent::Start);

        let ctx = StepContext::new(
            Arc::clone(&self.page),
            self.session_id.clone(),
            token.child_token(),
        );
        let mut attempt: u32 = 0;

        loop {
            match self.attempt_steps(&ctx).await {
                AttemptOutcome::Success => return self.apply(TaskEvent::Succeed),
                AttemptOutcome::Cancelled => return self.escalate_cancelled(),
                AttemptOutcome::Failed(error) => {
                    let next = self.apply(TaskEvent::Fail {
                        error: error.to_string(),
                    });
                    if next == TaskState::Escalated {
                        return TaskState::Escalated;
                    }

                    let delay = backoff_delay(self.task.retry.backoff_ms, attempt);
                    attempt += 1;
                    debug!(task = %self.task.name, delay_ms = delay.as_millis() as u64, "backing off before retry");
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = token.cancelled() => return self.escalate_cancelled(),
                    }
                    self.apply(TaskEvent::Retry);
                }
            }
        }
    }

    /// Runs the step sequence from step 0; stops at the first failure.
    async fn attempt_steps(&self, ctx: &StepContext) -> AttemptOutcome {
        for (index, step) in self.task.steps.iter().enumerate() {
            let probe_ctx = ProbeContext::new(&self.session_id)
                .with_page(Arc::clone(&self.page))
                .with_action(step.kind());

            self.embedder.fire_phase(Phase::BeforeAction, &probe_ctx).await;
            let result = self.executor.execute(step, ctx).await;
            self.emit_step(index, &result);
            self.embedder.fire_phase(Phase::AfterAction, &probe_ctx).await;

            if result.success {
                if matches!(step, Step::Navigate { .. }) {
                    self.embedder.fire_phase(Phase::OnNavigation, &probe_ctx).await;
                }
                continue;
            }

            let error = result
                .error
                .clone()
                .unwrap_or_else(|| StepError::failed("step reported failure without error"));
            self.embedder
                .fire_phase(
                    Phase::OnError,
                    &probe_ctx.clone().with_error(error.to_string()),
                )
                .await;

            return match error {
                StepError::Cancelled => AttemptOutcome::Cancelled,
                other => AttemptOutcome::Failed(other),
            };
        }
        AttemptOutcome::Success
    }

    /// Applies a transition through the reconciler and emits the
    /// corresponding `task.transition` event.
    ///
    /// The transition table is an internal invariant; a rejection here is a
    /// runner bug and aborts the process.
    fn apply(&self, event: TaskEvent) -> TaskState {
        let from = self
            .reconciler
            .status(&self.task.name)
            .expect("registered task")
            .state;
        let to = self
            .reconciler
            .transition(&self.task.name, event)
            .unwrap_or_else(|e| panic!("reconciler invariant violated: {e}"));
        let status = self
            .reconciler
            .status(&self.task.name)
            .expect("registered task");

        let error = match to {
            TaskState::Retrying | TaskState::Escalated => status.last_error.as_deref(),
            _ => None,
        };
        let mut ev = Event::now("task.transition", SOURCE, &self.session_id)
            .with_task(&self.task.name)
            .with_field("from", from.as_str())
            .with_field("to", to.as_str())
            .with_field("retryCount", status.retry_count);
        if let Some(error) = error {
            ev = ev.with_field("error", error);
        }
        self.embedder.emit(ev);
        to
    }

    /// Escalates with the canonical `Cancelled` error, tolerating tasks
    /// that already reached a terminal state.
    fn escalate_cancelled(&self) -> TaskState {
        let from = self
            .reconciler
            .status(&self.task.name)
            .expect("registered task")
            .state;
        if self.reconciler.escalate(&self.task.name, CANCELLED).is_ok() {
            let retry_count = self
                .reconciler
                .status(&self.task.name)
                .expect("registered task")
                .retry_count;
            self.embedder.emit(
                Event::now("task.transition", SOURCE, &self.session_id)
                    .with_task(&self.task.name)
                    .with_field("from", from.as_str())
                    .with_field("to", TaskState::Escalated.as_str())
                    .with_field("retryCount", retry_count)
                    .with_field("error", CANCELLED),
            );
        }
        TaskState::Escalated
    }

    fn emit_step(&self, index: usize, result: &StepResult) {
        let mut ev = Event::now("step.completed", SOURCE, &self.session_id)
            .with_task(&self.task.name)
            .with_field("stepIndex", index)
            .with_field("stepType", result.step_type)
            .with_field("success", result.success)
            .with_field("durationMs", result.duration_ms);
        if let Some(error) = &result.error {
            ev = ev.with_field("error", error.to_string());
        }
        if let Some(data) = &result.data {
            ev = ev.with_field(
                "data",
                serde_json::Value::Object(
                    data.iter()
                        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                        .collect(),
                ),
            );
        }
        self.embedder.emit(ev);
    }
}

/// Exponential backoff: retry `i` sleeps `backoff_ms * 2^i`.
fn backoff_delay(backoff_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(backoff_ms.saturating_mul(2u64.saturating_pow(attempt)))
}
