//! # Event bus transport abstraction.
//!
//! The producer's buffering and routing logic is decoupled from the concrete
//! broker client behind [`Transport`]: two operations, `send_batch` and
//! `close`. [`MemoryTransport`] is the in-process implementation used by
//! tests and embedded runs; it records every delivered batch and can be
//! scripted to reject sends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::events::event::Event;

/// One message on the wire: partition key, headers, and JSON payload.
#[derive(Clone, Debug)]
pub struct EventMessage {
    /// Partition key; always the originating session id.
    pub key: String,
    /// Transport headers: `event-type`, `source`, and when tracing is
    /// present, `trace-id` / `span-id`.
    pub headers: Vec<(String, String)>,
    /// Serialized [`Event`] JSON.
    pub payload: Vec<u8>,
}

impl EventMessage {
    /// Encodes an event into its transport message.
    pub fn from_event(event: &Event) -> Self {
        let mut headers = vec![
            ("event-type".to_string(), event.event_type.clone()),
            ("source".to_string(), event.source.clone()),
        ];
        if let Some(trace) = &event.trace_context {
            headers.push(("trace-id".to_string(), trace.trace_id.clone()));
            headers.push(("span-id".to_string(), trace.span_id.clone()));
        }
        Self {
            key: event.session_id.clone(),
            headers,
            // Serialization of an Event cannot fail: all fields are plain
            // data and payload keys are strings.
            payload: serde_json::to_vec(event).unwrap_or_default(),
        }
    }
}

/// Messages destined for one fully-qualified topic.
#[derive(Clone, Debug)]
pub struct TopicBatch {
    /// Fully-qualified topic name.
    pub topic: String,
    /// Messages in emission order.
    pub messages: Vec<EventMessage>,
}

/// Broker client abstraction used by the producer.
///
/// Implementations deliver whole batches atomically from the producer's
/// perspective: an `Err` from `send_batch` means none of the batch is
/// considered delivered and the producer re-queues it.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Delivers one flush worth of messages, grouped by topic.
    async fn send_batch(&self, batches: Vec<TopicBatch>) -> Result<(), TransportError>;

    /// Releases the transport. Called once from `disconnect`.
    async fn close(&self) -> Result<(), TransportError>;
}

/// In-process transport that records delivered batches.
///
/// `fail_next(n)` scripts the next `n` sends to be rejected, which the
/// producer recovery tests use to exercise re-queuing.
#[derive(Default)]
pub struct MemoryTransport {
    delivered: Mutex<Vec<TopicBatch>>,
    reject: AtomicUsize,
    closed: AtomicUsize,
}

impl MemoryTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next `n` `send_batch` calls to fail.
    pub fn fail_next(&self, n: usize) {
        self.reject.store(n, Ordering::SeqCst);
    }

    /// Returns every batch delivered so far, in delivery order.
    pub fn delivered(&self) -> Vec<TopicBatch> {
        self.delivered.lock().expect("transport lock poisoned").clone()
    }

    /// Total number of messages delivered across all batches.
    pub fn message_count(&self) -> usize {
        self.delivered()
            .iter()
            .map(|b| b.messages.len())
            .sum()
    }

    /// True once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) > 0
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_batch(&self, batches: Vec<TopicBatch>) -> Result<(), TransportError> {
        let remaining = self.reject.load(Ordering::SeqCst);
        if remaining > 0 {
            self.reject.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::SendFailed {
                reason: "scripted rejection".to_string(),
            });
        }
        self.delivered
            .lock()
            .expect("transport lock poisoned")
            .extend(batches);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
