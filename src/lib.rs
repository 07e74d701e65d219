//! # flowvisor
//!
//! **Flowvisor** is a dependency-aware browser-automation workflow engine
//! with an embedded observability pipeline.
//!
//! It plans a workflow's task graph into dependency-ordered batches, drives
//! tasks concurrently under a bounded cap with retry/backoff and
//! cancellation, executes declarative browser steps against an opaque page
//! handle, and streams structured events (lifecycle, measurements, alerts)
//! through a batching producer onto a pluggable transport.
//!
//! ## Features
//!
//! | Area               | Description                                                       | Key types / traits                        |
//! |--------------------|-------------------------------------------------------------------|-------------------------------------------|
//! | **Model**          | Declarative workflows, tasks, and steps parsed from JSON.         | [`Workflow`], [`TaskDef`], [`Step`]       |
//! | **Scheduling**     | Dependency-ordered batch planning with cycle detection.           | [`plan`], [`ExecutionPlan`]               |
//! | **Reconciliation** | Per-task lifecycle state machine with retry accounting.           | [`Reconciler`], [`TaskState`]             |
//! | **Execution**      | Step execution against an opaque browser page.                    | [`StepExecutor`], [`PageHandle`]          |
//! | **Probes**         | Phase-attached measurements with alert escalation.                | [`Embedder`], [`Probe`], [`ProbeSpec`]    |
//! | **Events**         | Batching producer with topic routing and failure recovery.        | [`EventProducer`], [`Transport`]          |
//! | **Running**        | Batch-driven concurrent execution with deadlines and fail-fast.   | [`WorkflowRunner`], [`WorkflowResult`]    |
//!
//! ```no_run
//! use std::sync::Arc;
//! use flowvisor::{
//!     BrowserExecutor, Embedder, EngineConfig, EventProducer, MemoryTransport, PageHandle,
//!     Workflow, WorkflowRunner,
//! };
//!
//! # async fn demo(page: Arc<dyn PageHandle>) -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = EngineConfig::from_env();
//! let producer = EventProducer::new(cfg.producer.clone(), Arc::new(MemoryTransport::new()));
//! producer.connect();
//!
//! let embedder = Arc::new(Embedder::new(producer.clone(), &cfg));
//! let runner = WorkflowRunner::new(Arc::new(BrowserExecutor::new()), embedder, cfg);
//!
//! let workflow = Workflow::from_json(r#"{"name": "demo", "tasks": []}"#)?;
//! let result = runner.run(&workflow, page, "session-1").await?;
//! assert!(result.succeeded());
//!
//! producer.disconnect().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;
mod exec;
mod model;
mod probes;
mod reconcile;
mod runner;
mod scheduler;

// ---- Public re-exports ----

pub use config::{Compression, EngineConfig, ProducerConfig};
pub use error::{EngineError, StepError, TransportError};
pub use events::{
    parse_command, route, CommandAction, Event, EventMessage, EventProducer, InstrumentCommand,
    MemoryTransport, TopicBatch, TopicRouter, TraceContext, Transport,
};
pub use exec::{BrowserExecutor, PageHandle, StepContext, StepExecutor, StepResult};
pub use model::{FieldSpec, OutputSpec, RetryPolicy, Schema, Step, TaskDef, Workflow, WorkflowPolicy};
pub use probes::{
    escalate, AlertCondition, AlertOperator, Embedder, Phase, Probe, ProbeContext, ProbeError,
    ProbeFn, ProbeRef, ProbeResult, ProbeSpec, Severity,
};
pub use reconcile::{Reconciler, TaskEvent, TaskState, TaskStatus};
pub use runner::{TaskReport, WorkflowResult, WorkflowRunner, WorkflowStatus};
pub use scheduler::{plan, Batch, ExecutionPlan};
