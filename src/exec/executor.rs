//! # Step executor.
//!
//! Executes one declarative [`Step`] against a [`StepContext`] and reports
//! the outcome in-band via [`StepResult`]. Failures never escape as `Err`;
//! the runner consumes results and applies retry policy.
//!
//! ## Semantics per variant
//! - **Navigate**: complete when the navigation future completes or fails.
//! - **WaitFor**: wait for the selector within its deadline; expiry reports
//!   the canonical `Timeout` error.
//! - **Click**: element-not-found is a failure.
//! - **Extract**: fail if the selector matches nothing; per schema field,
//!   read the same-named attribute, falling back to inner text.
//!
//! Durations are wall-clock from entry to exit of `execute`. Every await is
//! raced against the context's cancellation token; a cancelled step reports
//! the canonical `Cancelled` error.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time;

use crate::error::StepError;
use crate::exec::page::StepContext;
use crate::model::Step;

/// Outcome of one step execution.
#[derive(Clone, Debug)]
pub struct StepResult {
    /// Action-type string of the executed step.
    pub step_type: &'static str,
    /// Whether the step completed successfully.
    pub success: bool,
    /// Wall-clock duration of the execution in milliseconds.
    pub duration_ms: u64,
    /// Extracted data for `extract` steps.
    pub data: Option<BTreeMap<String, String>>,
    /// Failure, if any.
    pub error: Option<StepError>,
}

impl StepResult {
    fn ok(step_type: &'static str, started: Instant, data: Option<BTreeMap<String, String>>) -> Self {
        Self {
            step_type,
            success: true,
            duration_ms: started.elapsed().as_millis() as u64,
            data,
            error: None,
        }
    }

    fn err(step_type: &'static str, started: Instant, error: StepError) -> Self {
        Self {
            step_type,
            success: false,
            duration_ms: started.elapsed().as_millis() as u64,
            data: None,
            error: Some(error),
        }
    }
}

/// Executes declarative steps.
///
/// The engine ships [`BrowserExecutor`]; tests substitute scripted
/// implementations to inject failures deterministically.
#[async_trait]
pub trait StepExecutor: Send + Sync + 'static {
    /// Executes one step. Never fails out-of-band.
    async fn execute(&self, step: &Step, ctx: &StepContext) -> StepResult;
}

/// The engine's step executor over a [`PageHandle`](crate::exec::PageHandle).
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserExecutor;

impl BrowserExecutor {
    /// Creates the executor.
    pub fn new() -> Self {
        Self
    }

    async fn dispatch(
        &self,
        step: &Step,
        ctx: &StepContext,
    ) -> Result<Option<BTreeMap<String, String>>, StepError> {
        match step {
            Step::Navigate { url } => {
                ctx.page.goto(url).await?;
                Ok(None)
            }
            Step::WaitFor {
                selector,
                timeout_ms,
            } => {
                let deadline = Duration::from_millis(*timeout_ms);
                match time::timeout(deadline, ctx.page.wait_for(selector)).await {
                    Ok(res) => res.map(|()| None),
                    Err(_elapsed) => Err(StepError::Timeout),
                }
            }
            Step::Click { selector } => {
                ctx.page.click(selector).await?;
                Ok(None)
            }
            Step::Extract { selector, schema } => {
                // Presence check first so an absent element fails the step
                // rather than yielding an empty record.
                ctx.page.wait_for(selector).await?;

                let mut data = BTreeMap::new();
                for field in &schema.fields {
                    let value = match ctx.page.attribute(selector, &field.name).await? {
                        Some(v) => v,
                        None => ctx.page.inner_text(selector).await?,
                    };
                    data.insert(field.name.clone(), value);
                }
                Ok(Some(data))
            }
        }
    }
}

#[async_trait]
impl StepExecutor for BrowserExecutor {
    async fn execute(&self, step: &Step, ctx: &StepContext) -> StepResult {
        let started = Instant::now();
        let kind = step.kind();

        let outcome = tokio::select! {
            res = self.dispatch(step, ctx) => res,
            _ = ctx.cancel.cancelled() => Err(StepError::Cancelled),
        };

        match outcome {
            Ok(data) => StepResult::ok(kind, started, data),
            Err(e) => StepResult::err(kind, started, e),
        }
    }
}
