//! # Error types used by the flowvisor engine and step execution.
//!
//! This module defines three error enums:
//!
//! - [`EngineError`] errors raised by the orchestration engine itself
//!   (parsing, planning, reconciliation).
//! - [`StepError`] errors raised by individual step executions; these are
//!   consumed by the runner's retry loop and never escape `run`.
//! - [`TransportError`] errors raised by the event-bus transport; these are
//!   local to a flush and observable only through logs and the re-queued
//!   buffer.
//!
//! All types provide `as_label` helpers for logs/metrics.
//! [`StepError`] additionally distinguishes retryable failures from
//! cooperative cancellation via `is_retryable()`.

use thiserror::Error;

/// # Errors produced by the workflow engine.
///
/// These represent failures in the orchestration system itself and are fatal
/// for the workflow run that raised them.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EngineError {
    /// The workflow definition could not be parsed or failed validation.
    #[error("invalid workflow: {reason}")]
    Parse {
        /// Human-readable description of the defect.
        reason: String,
    },

    /// The dependency relation contains a cycle.
    #[error("dependency cycle detected among tasks: {participants:?}")]
    CycleDetected {
        /// Names of every task participating in the cycle, sorted.
        participants: Vec<String>,
    },

    /// A state-machine transition was attempted that the table forbids.
    ///
    /// This indicates a bug in the caller; the runner treats it as a
    /// programming error and panics.
    #[error("invalid transition for task '{task}': {from} does not accept {event}")]
    InvalidTransition {
        /// Task whose status was being mutated.
        task: String,
        /// State the task was in.
        from: String,
        /// The rejected transition event.
        event: String,
    },

    /// A status query or transition referenced a task that was never
    /// registered.
    #[error("unknown task '{name}'")]
    UnknownTask {
        /// The missing task name.
        name: String,
    },
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::Parse { .. } => "engine_parse",
            EngineError::CycleDetected { .. } => "engine_cycle_detected",
            EngineError::InvalidTransition { .. } => "engine_invalid_transition",
            EngineError::UnknownTask { .. } => "engine_unknown_task",
        }
    }

    /// Convenience constructor for parse/validation failures.
    pub fn parse(reason: impl Into<String>) -> Self {
        EngineError::Parse {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Parse {
            reason: e.to_string(),
        }
    }
}

/// # Errors produced by step execution.
///
/// These represent failures of individual browser steps. They are reported
/// in-band through [`StepResult`](crate::exec::StepResult) and consumed by
/// the runner, which applies the task's retry policy.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum StepError {
    /// The step's wait or navigation exceeded its deadline.
    #[error("Timeout")]
    Timeout,

    /// The step was interrupted by cooperative cancellation.
    ///
    /// This is **not an error** in the traditional sense; it signals
    /// intentional termination. A cancelled step escalates its task with
    /// the canonical `Cancelled` string and is never retried.
    #[error("Cancelled")]
    Cancelled,

    /// The step failed against the page (element missing, navigation error,
    /// protocol failure). Wraps the original reason.
    #[error("step failed: {reason}")]
    Failed {
        /// Description from the page handle.
        reason: String,
    },
}

impl StepError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            StepError::Timeout => "step_timeout",
            StepError::Cancelled => "step_cancelled",
            StepError::Failed { .. } => "step_failed",
        }
    }

    /// Indicates whether the runner may retry the step sequence.
    ///
    /// Cancellation is terminal; everything else is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StepError::Cancelled)
    }

    /// Convenience constructor for page-level failures.
    pub fn failed(reason: impl Into<String>) -> Self {
        StepError::Failed {
            reason: reason.into(),
        }
    }
}

/// # Errors produced by the event-bus transport.
///
/// A failed batch transmission re-queues its messages at the head of the
/// producer buffer; the error itself never propagates to event emitters.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// The transport rejected or failed to deliver a batch.
    #[error("batch send failed: {reason}")]
    SendFailed {
        /// Description from the transport.
        reason: String,
    },

    /// The transport is closed and cannot accept batches.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::SendFailed { .. } => "transport_send_failed",
            TransportError::Closed => "transport_closed",
        }
    }
}
