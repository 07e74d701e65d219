//! # Observability probes and the embedder.
//!
//! - [`Probe`] — a measurement function attached to a lifecycle [`Phase`]
//! - [`ProbeFn`] — closure-backed probe, mirroring function-backed tasks
//! - [`ProbeSpec`] — registration bundle: phase, filter, priority, alerts
//! - [`AlertCondition`] — declarative severity escalation rules
//! - [`Embedder`] — the probe registry; fires phases, caches last results,
//!   publishes measurements and alerts as events

mod alert;
mod embedder;
mod probe;

pub use alert::{escalate, AlertCondition, AlertOperator};
pub use embedder::{Embedder, ProbeSpec};
pub use probe::{
    Phase, Probe, ProbeContext, ProbeError, ProbeFn, ProbeRef, ProbeResult, Severity,
};
