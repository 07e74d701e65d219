//! # Type-prefix → topic routing.
//!
//! Every event type maps to a logical topic by its dotted prefix; the
//! [`TopicRouter`] then qualifies the logical name with a configurable
//! prefix to form the full topic.
//!
//! ## Table
//! ```text
//! instrument.measurement  → measurements
//! instrument.alert        → alerts
//! instrument.lifecycle    → instrument-commands
//! action.*                → actions
//! task.*                  → tasks
//! workflow.*              → tasks
//! session.*               → sessions
//! detection.*             → detections
//! behavioral.*            → anomalies
//! anything else           → measurements
//! ```

/// Resolves the logical topic for an event type.
pub fn route(event_type: &str) -> &'static str {
    if event_type.starts_with("instrument.measurement") {
        "measurements"
    } else if event_type.starts_with("instrument.alert") {
        "alerts"
    } else if event_type.starts_with("instrument.lifecycle") {
        "instrument-commands"
    } else if event_type.starts_with("action.") {
        "actions"
    } else if event_type.starts_with("task.") || event_type.starts_with("workflow.") {
        "tasks"
    } else if event_type.starts_with("session.") {
        "sessions"
    } else if event_type.starts_with("detection.") {
        "detections"
    } else if event_type.starts_with("behavioral.") {
        "anomalies"
    } else {
        "measurements"
    }
}

/// Qualifies logical topics with a configured prefix.
#[derive(Clone, Debug)]
pub struct TopicRouter {
    prefix: String,
}

impl TopicRouter {
    /// Creates a router with the given topic prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the fully-qualified topic for an event type.
    ///
    /// An empty prefix yields the bare logical topic.
    pub fn topic_for(&self, event_type: &str) -> String {
        let logical = route(event_type);
        if self.prefix.is_empty() {
            logical.to_string()
        } else {
            format!("{}.{}", self.prefix, logical)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_specified_routes() {
        let cases = [
            ("instrument.measurement", "measurements"),
            ("instrument.alert", "alerts"),
            ("instrument.lifecycle", "instrument-commands"),
            ("action.click", "actions"),
            ("task.transition", "tasks"),
            ("workflow.started", "tasks"),
            ("workflow.finished", "tasks"),
            ("session.created", "sessions"),
            ("detection.headless", "detections"),
            ("behavioral.drift", "anomalies"),
            ("something.else", "measurements"),
        ];
        for (event_type, topic) in cases {
            assert_eq!(route(event_type), topic, "event type {event_type}");
        }
    }

    #[test]
    fn router_applies_prefix() {
        let router = TopicRouter::new("prod");
        assert_eq!(router.topic_for("instrument.alert"), "prod.alerts");
        assert_eq!(router.topic_for("workflow.started"), "prod.tasks");
    }

    #[test]
    fn empty_prefix_yields_bare_topic() {
        let router = TopicRouter::new("");
        assert_eq!(router.topic_for("session.closed"), "sessions");
    }
}
