//! # Buffering event bus producer.
//!
//! [`EventProducer`] accepts events synchronously, buffers them keyed by
//! resolved topic, and flushes either when the buffer reaches
//! `batch_size` or when the linger timer elapses. Both triggers converge on
//! the same flush routine, which is serialized so at most one flush is in
//! flight.
//!
//! ## Architecture
//! ```text
//! emit(Event) ──► [buffer: VecDeque<(topic, message)>]
//!                     │            ▲
//!        size ≥ batch │ notify     │ re-queue on send failure
//!                     ▼            │
//!            worker: select! ──► flush() ──► Transport::send_batch
//!              ├─ kick (batch threshold)
//!              ├─ linger elapsed
//!              └─ shutdown token
//! ```
//!
//! ## Rules
//! - `emit` never blocks and never fails; transport problems surface on
//!   flush only.
//! - A failed send returns the drained messages to the **head** of the
//!   buffer in original order, so per-(topic, key) ordering holds across
//!   retries.
//! - `flush` is idempotent; flushing an empty buffer is a no-op.
//! - `disconnect` stops the linger worker, performs a final flush, and
//!   closes the transport. Buffered events are never dropped on graceful
//!   shutdown.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ProducerConfig;
use crate::error::TransportError;
use crate::events::event::Event;
use crate::events::routing::TopicRouter;
use crate::events::transport::{EventMessage, TopicBatch, Transport};

struct Inner {
    cfg: ProducerConfig,
    router: TopicRouter,
    transport: Arc<dyn Transport>,
    buffer: Mutex<VecDeque<(String, EventMessage)>>,
    flush_gate: tokio::sync::Mutex<()>,
    kick: Notify,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Batching producer for the observability event bus.
///
/// Cheap to clone; all clones share one buffer and one worker.
#[derive(Clone)]
pub struct EventProducer {
    inner: Arc<Inner>,
}

impl EventProducer {
    /// Creates a producer over `transport` with the given settings.
    ///
    /// The producer buffers immediately; call [`connect`](Self::connect) to
    /// arm the linger timer and background flushing.
    pub fn new(cfg: ProducerConfig, transport: Arc<dyn Transport>) -> Self {
        let router = TopicRouter::new(cfg.topic_prefix.clone());
        Self {
            inner: Arc::new(Inner {
                cfg,
                router,
                transport,
                buffer: Mutex::new(VecDeque::new()),
                flush_gate: tokio::sync::Mutex::new(()),
                kick: Notify::new(),
                shutdown: CancellationToken::new(),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Appends an event to the buffer. Non-blocking.
    ///
    /// When the buffer reaches `batch_size` the background worker is kicked;
    /// the caller never waits on the transport.
    pub fn emit(&self, event: Event) {
        let topic = self.inner.router.topic_for(&event.event_type);
        let message = EventMessage::from_event(&event);

        let len = {
            let mut buffer = self.inner.buffer.lock().expect("producer buffer poisoned");
            buffer.push_back((topic, message));
            buffer.len()
        };
        if len >= self.inner.cfg.batch_size {
            self.inner.kick.notify_one();
        }
    }

    /// Spawns the background worker servicing the batch-threshold kick and
    /// the linger timer. Idempotent.
    pub fn connect(&self) {
        let mut worker = self.inner.worker.lock().expect("producer worker poisoned");
        if worker.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *worker = Some(tokio::spawn(async move {
            loop {
                let linger = tokio::time::sleep(inner.cfg.linger);
                tokio::pin!(linger);
                tokio::select! {
                    _ = inner.shutdown.cancelled() => break,
                    _ = inner.kick.notified() => {}
                    _ = &mut linger => {}
                }
                if let Err(e) = Inner::flush(&inner).await {
                    warn!(error = %e, "event flush failed; batch re-queued");
                }
            }
        }));
    }

    /// Drains the buffer through the transport.
    ///
    /// Serialized: concurrent callers queue on the flush gate and each run
    /// observes the buffer fresh, so flushing twice is harmless. On a send
    /// failure the drained chunk is returned to the buffer head in original
    /// order and the error is reported to the caller.
    pub async fn flush(&self) -> Result<(), TransportError> {
        Inner::flush(&self.inner).await
    }

    /// Stops the linger worker, performs a final flush, and closes the
    /// transport.
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        self.inner.shutdown.cancel();
        let handle = {
            let mut worker = self.inner.worker.lock().expect("producer worker poisoned");
            worker.take()
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        let flushed = Inner::flush(&self.inner).await;
        self.inner.transport.close().await?;
        flushed
    }

    /// Number of buffered, unflushed messages.
    pub fn pending(&self) -> usize {
        self.inner.buffer.lock().expect("producer buffer poisoned").len()
    }
}

impl Inner {
    async fn flush(inner: &Arc<Inner>) -> Result<(), TransportError> {
        let _gate = inner.flush_gate.lock().await;

        loop {
            let drained: Vec<(String, EventMessage)> = {
                let mut buffer = inner.buffer.lock().expect("producer buffer poisoned");
                if buffer.is_empty() {
                    return Ok(());
                }
                let n = buffer.len().min(inner.cfg.batch_size.max(1));
                buffer.drain(..n).collect()
            };

            let mut batches: Vec<TopicBatch> = Vec::new();
            for (topic, message) in &drained {
                match batches.iter_mut().find(|b| &b.topic == topic) {
                    Some(batch) => batch.messages.push(message.clone()),
                    None => batches.push(TopicBatch {
                        topic: topic.clone(),
                        messages: vec![message.clone()],
                    }),
                }
            }

            debug!(messages = drained.len(), topics = batches.len(), "flushing event batch");
            if let Err(e) = inner.transport.send_batch(batches).await {
                let mut buffer = inner.buffer.lock().expect("producer buffer poisoned");
                for entry in drained.into_iter().rev() {
                    buffer.push_front(entry);
                }
                return Err(e);
            }
        }
    }
}
