//! # Probe abstraction.
//!
//! A probe is an async, isolated measurement unit. Implement [`Probe`]
//! directly or wrap a closure with [`ProbeFn`]. Probes are registered with
//! the [`Embedder`](crate::probes::Embedder) through a
//! [`ProbeSpec`](crate::probes::embedder) bundle that carries phase,
//! action filter, priority, and alert conditions.
//!
//! ## Rules
//! - `measure` receives an opaque [`ProbeContext`]: the browser handle, the
//!   current action type, the triggering error (for `OnError`), and the
//!   probe's previous result for delta computation.
//! - A probe failure is isolated: logged by the embedder, invisible to
//!   peer probes.
//! - `teardown` is guaranteed on embedder shutdown.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::exec::PageHandle;

/// Lifecycle phase a probe is attached to.
///
/// `Continuous` probes fire on every phase invocation regardless of the
/// requested phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Immediately before a step executes.
    BeforeAction,
    /// Immediately after a step reports its result.
    AfterAction,
    /// While the session is idle (driven externally).
    DuringIdle,
    /// After a navigation step.
    OnNavigation,
    /// When a step fails.
    OnError,
    /// Every invocation, any phase.
    Continuous,
}

impl Phase {
    /// Returns the phase name used in lifecycle event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::BeforeAction => "beforeAction",
            Phase::AfterAction => "afterAction",
            Phase::DuringIdle => "duringIdle",
            Phase::OnNavigation => "onNavigation",
            Phase::OnError => "onError",
            Phase::Continuous => "continuous",
        }
    }
}

/// Severity classification of a probe result.
///
/// Strictly ordered: `Trace < Info < Warn < Critical`. Results at `Warn`
/// and above are published as alerts.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Diagnostic detail.
    Trace,
    /// Normal measurement.
    Info,
    /// Needs attention.
    Warn,
    /// Needs immediate attention.
    Critical,
}

impl Severity {
    /// Returns the lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Critical => "critical",
        }
    }
}

/// Immutable record produced by one probe invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Id of the producing probe.
    pub instrument_id: String,
    /// Measurement time.
    pub timestamp: DateTime<Utc>,
    /// Measured values by field name.
    pub values: BTreeMap<String, Value>,
    /// Severity as classified by the probe itself; alert conditions may
    /// escalate it further.
    pub severity: Severity,
    /// Contextual tags.
    pub tags: BTreeMap<String, String>,
}

impl ProbeResult {
    /// Creates an empty `Info` result for `instrument_id` stamped now.
    pub fn new(instrument_id: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            timestamp: Utc::now(),
            values: BTreeMap::new(),
            severity: Severity::Info,
            tags: BTreeMap::new(),
        }
    }

    /// Adds one measured value.
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    /// Sets the probe-classified severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Adds one contextual tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Failure of a probe measurement.
///
/// Isolated by the embedder: logged, never propagated to peers.
#[derive(Error, Debug)]
#[error("probe measurement failed: {reason}")]
pub struct ProbeError {
    /// Description of the failure.
    pub reason: String,
}

impl ProbeError {
    /// Creates an error from any displayable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Opaque context handed to `measure` and `teardown`.
#[derive(Clone)]
pub struct ProbeContext {
    /// Session correlation id.
    pub session_id: String,
    /// Browser handle, when a page is in scope for this phase.
    pub page: Option<Arc<dyn PageHandle>>,
    /// Action type of the surrounding step (`navigate`, `click`, ...).
    pub action: Option<String>,
    /// The triggering error, for `OnError` invocations.
    pub error: Option<String>,
    /// This probe's previous result, for delta computation.
    pub previous: Option<ProbeResult>,
}

impl ProbeContext {
    /// Creates a context for `session_id` with nothing else in scope.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            page: None,
            action: None,
            error: None,
            previous: None,
        }
    }

    /// Attaches the browser handle.
    pub fn with_page(mut self, page: Arc<dyn PageHandle>) -> Self {
        self.page = Some(page);
        self
    }

    /// Attaches the surrounding action type.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Attaches the triggering error.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Shared handle to a probe object.
pub type ProbeRef = Arc<dyn Probe>;

/// Boxed future returned by [`ProbeFn`] closures.
type BoxProbeFuture = Pin<Box<dyn Future<Output = Result<ProbeResult, ProbeError>> + Send + 'static>>;

/// Asynchronous measurement unit.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    /// Stable probe id; keys the last-result cache and command routing.
    fn id(&self) -> &str;

    /// Human-readable name. Defaults to the id.
    fn name(&self) -> &str {
        self.id()
    }

    /// Takes one measurement.
    async fn measure(&self, ctx: &ProbeContext) -> Result<ProbeResult, ProbeError>;

    /// Releases probe resources. Called once on embedder shutdown.
    async fn teardown(&self, _ctx: &ProbeContext) {}
}

/// Closure-backed probe implementation.
///
/// Wraps a closure that creates a fresh measurement future per invocation.
///
/// ## Example
/// ```rust
/// use flowvisor::{ProbeContext, ProbeFn, ProbeRef, ProbeResult};
///
/// let p: ProbeRef = ProbeFn::arc("heap", |_ctx: ProbeContext| async move {
///     Ok(ProbeResult::new("heap").with_value("bytes", 1024))
/// });
/// assert_eq!(p.id(), "heap");
/// ```
pub struct ProbeFn<F> {
    id: String,
    f: F,
}

impl<F> ProbeFn<F> {
    /// Creates a new closure-backed probe.
    pub fn new(id: impl Into<String>, f: F) -> Self {
        Self { id: id.into(), f }
    }

    /// Creates the probe and returns it as a shared handle.
    pub fn arc(id: impl Into<String>, f: F) -> Arc<Self> {
        Arc::new(Self::new(id, f))
    }
}

#[async_trait]
impl<F, Fut> Probe for ProbeFn<F>
where
    F: Fn(ProbeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ProbeResult, ProbeError>> + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn measure(&self, ctx: &ProbeContext) -> Result<ProbeResult, ProbeError> {
        let fut: BoxProbeFuture = Box::pin((self.f)(ctx.clone()));
        fut.await
    }
}
