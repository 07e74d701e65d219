//! # Embedder: probe registry and dispatch.
//!
//! Holds registered probes, fires the eligible ones for a lifecycle phase,
//! caches each probe's last result for delta computation, and publishes
//! results on the event bus — `instrument.alert` at `warn` and above,
//! `instrument.measurement` otherwise.
//!
//! ## Rules
//! - `fire_phase` iterates a **snapshot** of the registry; concurrent
//!   `register`/`unregister` never disrupt an in-flight invocation.
//! - Probes fire in ascending priority order; registration order breaks
//!   ties.
//! - A probe failure is logged and isolated from its peers.
//! - `teardown_all` tears down every probe, clears the last-result cache,
//!   and empties the registry.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::events::{CommandAction, Event, EventProducer, InstrumentCommand};
use crate::probes::alert::{escalate, AlertCondition};
use crate::probes::probe::{Phase, ProbeContext, ProbeRef, ProbeResult, Severity};

/// Session id stamped on registry lifecycle events, which have no
/// originating browser session.
const SYSTEM_SESSION: &str = "system";

/// Registration bundle for one probe.
///
/// Bundles the probe itself with its dispatch metadata: lifecycle phase,
/// action-type filter, priority, initial enablement, and alert conditions.
#[derive(Clone)]
pub struct ProbeSpec {
    probe: ProbeRef,
    kind: String,
    phase: Phase,
    action_filter: HashSet<String>,
    enabled: Option<bool>,
    priority: i32,
    alert_conditions: Vec<AlertCondition>,
}

impl ProbeSpec {
    /// Creates a spec attaching `probe` to `phase` with default metadata:
    /// kind `"measurement"`, no action filter, priority `100`, enablement
    /// inherited from the engine's `auto_enable_instruments`.
    pub fn new(probe: ProbeRef, phase: Phase) -> Self {
        Self {
            probe,
            kind: "measurement".to_string(),
            phase,
            action_filter: HashSet::new(),
            enabled: None,
            priority: 100,
            alert_conditions: Vec::new(),
        }
    }

    /// Sets the classification kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Restricts the probe to the given action types (empty = all).
    pub fn with_action_filter<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action_filter = actions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the dispatch priority (lower fires first).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Overrides the initial enablement.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Attaches severity escalation rules.
    pub fn with_alerts(mut self, conditions: Vec<AlertCondition>) -> Self {
        self.alert_conditions = conditions;
        self
    }

    /// Returns the probe id.
    pub fn id(&self) -> &str {
        self.probe.id()
    }
}

struct ProbeEntry {
    spec: ProbeSpec,
    enabled: AtomicBool,
}

impl ProbeEntry {
    fn eligible_for(&self, phase: Phase, action: Option<&str>) -> bool {
        if !self.enabled.load(Ordering::SeqCst) {
            return false;
        }
        if self.spec.phase != phase && self.spec.phase != Phase::Continuous {
            return false;
        }
        if self.spec.action_filter.is_empty() {
            return true;
        }
        action.is_some_and(|a| self.spec.action_filter.contains(a))
    }
}

/// Probe registry and phase dispatcher.
///
/// Shared across task routines; every mutable piece of state (registry,
/// last-result cache) sits behind its own lock, and dispatch works on a
/// snapshot of the registry.
pub struct Embedder {
    registry: Mutex<Vec<Arc<ProbeEntry>>>,
    last: Mutex<HashMap<String, ProbeResult>>,
    producer: EventProducer,
    auto_enable: bool,
    max_continuous: usize,
}

impl Embedder {
    /// Creates an embedder publishing through `producer`.
    pub fn new(producer: EventProducer, cfg: &EngineConfig) -> Self {
        Self {
            registry: Mutex::new(Vec::new()),
            last: Mutex::new(HashMap::new()),
            producer,
            auto_enable: cfg.auto_enable_instruments,
            max_continuous: cfg.max_continuous,
        }
    }

    /// Publishes an engine lifecycle event through the embedder's producer.
    ///
    /// The runner funnels `workflow.*`, `task.*`, and `step.*` events here
    /// so the embedder remains the single observability egress.
    pub fn emit(&self, event: Event) {
        self.producer.emit(event);
    }

    /// Registers a probe. The spec's explicit enablement wins over the
    /// engine's `auto_enable_instruments` default.
    pub fn register(&self, spec: ProbeSpec) {
        let enabled = spec.enabled.unwrap_or(self.auto_enable);
        let id = spec.id().to_string();
        let kind = spec.kind.clone();
        let phase = spec.phase;

        let entry = Arc::new(ProbeEntry {
            spec,
            enabled: AtomicBool::new(enabled),
        });
        self.registry
            .lock()
            .expect("probe registry poisoned")
            .push(entry);

        debug!(probe = %id, kind = %kind, phase = phase.as_str(), "probe registered");
        self.emit_lifecycle(&id, "registered");
    }

    /// Removes a probe and its cached result. Returns `false` for unknown
    /// ids.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = {
            let mut registry = self.registry.lock().expect("probe registry poisoned");
            let before = registry.len();
            registry.retain(|e| e.spec.id() != id);
            registry.len() < before
        };
        if removed {
            self.last.lock().expect("probe cache poisoned").remove(id);
            self.emit_lifecycle(id, "unregistered");
        }
        removed
    }

    /// Enables a probe. Returns `false` for unknown ids.
    pub fn enable(&self, id: &str) -> bool {
        self.set_enabled(id, true, "enabled")
    }

    /// Disables a probe. Returns `false` for unknown ids.
    pub fn disable(&self, id: &str) -> bool {
        self.set_enabled(id, false, "disabled")
    }

    /// Fires every eligible probe for `phase` in ascending priority order.
    ///
    /// Eligible means: enabled, phase equal to `phase` or `Continuous`, and
    /// — when the probe declares an action filter — the context's action
    /// present in it. Each probe receives its previous result through the
    /// context; each success is cached and published.
    pub async fn fire_phase(&self, phase: Phase, ctx: &ProbeContext) {
        let snapshot: Vec<Arc<ProbeEntry>> = {
            let registry = self.registry.lock().expect("probe registry poisoned");
            registry.clone()
        };

        let mut eligible: Vec<Arc<ProbeEntry>> = snapshot
            .into_iter()
            .filter(|e| e.eligible_for(phase, ctx.action.as_deref()))
            .collect();
        eligible.sort_by_key(|e| e.spec.priority);

        if self.max_continuous > 0 {
            let mut continuous_seen = 0usize;
            eligible.retain(|e| {
                if e.spec.phase != Phase::Continuous {
                    return true;
                }
                continuous_seen += 1;
                continuous_seen <= self.max_continuous
            });
        }

        for entry in eligible {
            let id = entry.spec.id().to_string();
            let mut probe_ctx = ctx.clone();
            probe_ctx.previous = {
                let last = self.last.lock().expect("probe cache poisoned");
                last.get(&id).cloned()
            };

            let measured = std::panic::AssertUnwindSafe(entry.spec.probe.measure(&probe_ctx))
                .catch_unwind()
                .await;
            match measured {
                Err(panic) => {
                    warn!(probe = %id, ?panic, "probe panicked during measurement");
                }
                Ok(Err(e)) => {
                    warn!(probe = %id, error = %e, "probe measurement failed");
                }
                Ok(Ok(mut result)) => {
                    result.severity =
                        escalate(result.severity, &entry.spec.alert_conditions, &result.values);
                    self.last
                        .lock()
                        .expect("probe cache poisoned")
                        .insert(id.clone(), result.clone());
                    self.publish(phase, ctx, &entry.spec, &result);
                }
            }
        }
    }

    /// Applies a parsed instrument command.
    ///
    /// Unknown actions and unknown probe ids are logged and ignored.
    pub fn handle_command(&self, cmd: &InstrumentCommand) {
        match cmd.action {
            CommandAction::Enable => {
                if !self.enable(&cmd.instrument_id) {
                    warn!(probe = %cmd.instrument_id, "enable command for unknown probe");
                }
            }
            CommandAction::Disable => {
                if !self.disable(&cmd.instrument_id) {
                    warn!(probe = %cmd.instrument_id, "disable command for unknown probe");
                }
            }
            CommandAction::Reload => {
                self.last
                    .lock()
                    .expect("probe cache poisoned")
                    .remove(&cmd.instrument_id);
                info!(probe = %cmd.instrument_id, "probe state reloaded");
            }
            CommandAction::UpdateConfig => {
                info!(
                    probe = %cmd.instrument_id,
                    payload = ?cmd.payload,
                    "probe config update acknowledged"
                );
            }
            CommandAction::Unknown => {
                warn!(probe = %cmd.instrument_id, "unknown instrument command action; ignoring");
            }
        }
    }

    /// Tears down every probe, clears the cache, and empties the registry.
    pub async fn teardown_all(&self, ctx: &ProbeContext) {
        let drained: Vec<Arc<ProbeEntry>> = {
            let mut registry = self.registry.lock().expect("probe registry poisoned");
            std::mem::take(&mut *registry)
        };
        for entry in &drained {
            entry.spec.probe.teardown(ctx).await;
        }
        self.last.lock().expect("probe cache poisoned").clear();
        debug!(count = drained.len(), "all probes torn down");
    }

    /// Returns the cached last result of a probe.
    pub fn last_result(&self, id: &str) -> Option<ProbeResult> {
        self.last
            .lock()
            .expect("probe cache poisoned")
            .get(id)
            .cloned()
    }

    /// Number of cached results; zero after [`teardown_all`](Self::teardown_all).
    pub fn cache_size(&self) -> usize {
        self.last.lock().expect("probe cache poisoned").len()
    }

    /// Number of registered probes.
    pub fn probe_count(&self) -> usize {
        self.registry.lock().expect("probe registry poisoned").len()
    }

    fn set_enabled(&self, id: &str, enabled: bool, action: &str) -> bool {
        let registry = self.registry.lock().expect("probe registry poisoned");
        match registry.iter().find(|e| e.spec.id() == id) {
            Some(entry) => {
                entry.enabled.store(enabled, Ordering::SeqCst);
                drop(registry);
                self.emit_lifecycle(id, action);
                true
            }
            None => false,
        }
    }

    fn emit_lifecycle(&self, id: &str, action: &str) {
        self.producer.emit(
            Event::now("instrument.lifecycle", "embedder", SYSTEM_SESSION)
                .with_field("instrumentId", id)
                .with_field("action", action),
        );
    }

    fn publish(&self, phase: Phase, ctx: &ProbeContext, spec: &ProbeSpec, result: &ProbeResult) {
        let event_type = if result.severity >= Severity::Warn {
            "instrument.alert"
        } else {
            "instrument.measurement"
        };

        let mut event = Event::now(event_type, "embedder", &ctx.session_id)
            .with_field("instrumentId", result.instrument_id.clone())
            .with_field("kind", spec.kind.clone())
            .with_field("phase", phase.as_str())
            .with_field("severity", result.severity.as_str())
            .with_field(
                "values",
                Value::Object(result.values.clone().into_iter().collect()),
            )
            .with_field(
                "tags",
                Value::Object(
                    result
                        .tags
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect(),
                ),
            );
        if let Some(action) = &ctx.action {
            event = event.with_field("action", action.clone());
        }
        self.producer.emit(event);
    }
}
