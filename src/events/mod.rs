//! # Observability events and the event bus producer.
//!
//! - [`Event`] — a typed, correlated record routed by type prefix to a topic
//! - [`TopicRouter`] — the prefix → topic table with configurable prefix
//! - [`Transport`] — the broker abstraction ([`MemoryTransport`] in-process)
//! - [`EventProducer`] — buffering, batching, linger-flushing producer
//! - [`InstrumentCommand`] — command input consumed from the
//!   `instrument-commands` topic

mod command;
mod event;
mod producer;
mod routing;
mod transport;

pub use command::{parse_command, CommandAction, InstrumentCommand};
pub use event::{Event, TraceContext};
pub use producer::EventProducer;
pub use routing::{route, TopicRouter};
pub use transport::{EventMessage, MemoryTransport, TopicBatch, Transport};
