//! Runs a workflow definition from the command line.
//!
//! Loads a workflow JSON file, executes it against a stub page (every
//! browser operation succeeds), and maps the outcome to exit codes:
//!
//! - `0` — workflow succeeded (all tasks `Succeeded`)
//! - `1` — one or more tasks `Escalated`, or the task graph has a cycle
//! - `2` — configuration or parse error
//! - `3` — internal failure
//!
//! Real deployments embed the library and supply a protocol-backed
//! [`PageHandle`]; this binary exists to validate definitions and exercise
//! the pipeline end to end.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use flowvisor::{
    BrowserExecutor, Embedder, EngineConfig, EngineError, EventProducer, MemoryTransport,
    PageHandle, StepError, Workflow, WorkflowRunner,
};

#[derive(Parser)]
#[command(name = "flowvisor-run", about = "Run a flowvisor workflow definition")]
struct Args {
    /// Path to the workflow JSON file.
    workflow: PathBuf,

    /// Session correlation id stamped on every emitted event.
    #[arg(long, default_value = "local")]
    session_id: String,
}

/// Page stub: navigation and clicks succeed, extraction yields empty text.
struct StubPage;

#[async_trait]
impl PageHandle for StubPage {
    async fn goto(&self, _url: &str) -> Result<(), StepError> {
        Ok(())
    }

    async fn wait_for(&self, _selector: &str) -> Result<(), StepError> {
        Ok(())
    }

    async fn click(&self, _selector: &str) -> Result<(), StepError> {
        Ok(())
    }

    async fn attribute(&self, _selector: &str, _name: &str) -> Result<Option<String>, StepError> {
        Ok(None)
    }

    async fn inner_text(&self, _selector: &str) -> Result<String, StepError> {
        Ok(String::new())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let cfg = EngineConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.clone())),
        )
        .init();

    let input = match std::fs::read_to_string(&args.workflow) {
        Ok(input) => input,
        Err(e) => {
            error!(path = %args.workflow.display(), error = %e, "cannot read workflow file");
            return ExitCode::from(2);
        }
    };
    let workflow = match Workflow::from_json(&input) {
        Ok(wf) => wf,
        Err(e) => {
            error!(error = %e, "workflow rejected");
            return ExitCode::from(2);
        }
    };

    let producer = EventProducer::new(cfg.producer.clone(), Arc::new(MemoryTransport::new()));
    producer.connect();
    let embedder = Arc::new(Embedder::new(producer.clone(), &cfg));
    let runner = WorkflowRunner::new(Arc::new(BrowserExecutor::new()), embedder, cfg);

    let outcome = runner
        .run(&workflow, Arc::new(StubPage), &args.session_id)
        .await;

    if let Err(e) = producer.disconnect().await {
        error!(error = %e, "final event flush failed");
    }

    match outcome {
        Ok(result) => {
            info!(
                workflow = %result.workflow,
                status = result.status.as_str(),
                "run complete"
            );
            for err in &result.errors {
                error!("{err}");
            }
            if result.succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(EngineError::CycleDetected { participants }) => {
            error!(?participants, "dependency cycle");
            ExitCode::from(1)
        }
        Err(e @ EngineError::Parse { .. }) => {
            error!(error = %e, "workflow rejected");
            ExitCode::from(2)
        }
        Err(e) => {
            error!(error = %e, "internal failure");
            ExitCode::from(3)
        }
    }
}
