//! # Observability event record.
//!
//! [`Event`] is the immutable unit shipped over the event bus. Every event
//! carries a unique id, a dotted `type` discriminator (which drives topic
//! routing), correlation ids (session, task), a wall-clock timestamp, a
//! free-form payload, and an optional trace context.
//!
//! Ordering within a `(topic, session)` partition is preserved because the
//! transport key of every message is the session id.
//!
//! ## Example
//! ```rust
//! use flowvisor::Event;
//!
//! let ev = Event::now("task.transition", "runner", "session-1")
//!     .with_task("fetch-page")
//!     .with_field("from", "Running")
//!     .with_field("to", "Succeeded");
//!
//! assert_eq!(ev.event_type, "task.transition");
//! assert_eq!(ev.task_id.as_deref(), Some("fetch-page"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Distributed-trace correlation carried on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    /// Trace id of the span that produced the event.
    pub trace_id: String,
    /// Span id of the span that produced the event.
    pub span_id: String,
}

/// Immutable observability record routed to a topic by `type` prefix.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event id.
    pub id: Uuid,
    /// Dotted type discriminator, e.g. `task.transition`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Component that produced the event.
    pub source: String,
    /// Session correlation id; doubles as the transport partition key.
    pub session_id: String,
    /// Task correlation id, if the event concerns one task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Wall-clock production time.
    pub timestamp: DateTime<Utc>,
    /// Free-form payload.
    pub payload: Map<String, Value>,
    /// Optional trace correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_context: Option<TraceContext>,
}

impl Event {
    /// Creates an event of the given type with a fresh id and the current
    /// timestamp.
    pub fn now(
        event_type: impl Into<String>,
        source: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            source: source.into(),
            session_id: session_id.into(),
            task_id: None,
            timestamp: Utc::now(),
            payload: Map::new(),
            trace_context: None,
        }
    }

    /// Attaches a task correlation id.
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Inserts one payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Replaces the whole payload.
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Attaches trace correlation.
    pub fn with_trace(mut self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.trace_context = Some(TraceContext {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
        });
        self
    }
}
