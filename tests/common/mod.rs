//! Shared fixtures for the end-to-end tests: a scripted step executor, a
//! fake page, workflow builders, and event-log helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use flowvisor::{
    Embedder, EngineConfig, Event, EventProducer, MemoryTransport, PageHandle, ProducerConfig,
    RetryPolicy, Step, StepContext, StepError, StepExecutor, StepResult, TaskDef, Workflow,
    WorkflowPolicy, WorkflowRunner,
};

/// Step executor scripted by step key (the selector or URL of the step).
///
/// `fail_first(key, n)` makes the first `n` executions of that step fail;
/// `slow(key, d)` adds a cancellable delay. Tracks the peak number of
/// concurrent executions for concurrency-bound assertions.
#[derive(Default)]
pub struct ScriptedExecutor {
    fail_first: Mutex<HashMap<String, usize>>,
    slow: Mutex<HashMap<String, Duration>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_first(self, key: &str, n: usize) -> Self {
        self.fail_first.lock().unwrap().insert(key.to_string(), n);
        self
    }

    pub fn slow(self, key: &str, delay: Duration) -> Self {
        self.slow.lock().unwrap().insert(key.to_string(), delay);
        self
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn step_key(step: &Step) -> &str {
        match step {
            Step::Navigate { url } => url,
            Step::WaitFor { selector, .. } => selector,
            Step::Click { selector } => selector,
            Step::Extract { selector, .. } => selector,
        }
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute(&self, step: &Step, ctx: &StepContext) -> StepResult {
        let started = Instant::now();
        let key = Self::step_key(step).to_string();

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        let delay = self.slow.lock().unwrap().get(&key).copied();
        let mut error = None;
        if let Some(delay) = delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.cancel.cancelled() => {
                    error = Some(StepError::Cancelled);
                }
            }
        }

        if error.is_none() {
            let mut fail_first = self.fail_first.lock().unwrap();
            if let Some(remaining) = fail_first.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    error = Some(StepError::failed("scripted failure"));
                }
            }
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        let success = error.is_none();
        StepResult {
            step_type: step.kind(),
            success,
            duration_ms: started.elapsed().as_millis() as u64,
            data: None,
            error,
        }
    }
}

/// Page whose elements are scripted up front; used with the real
/// `BrowserExecutor`.
#[derive(Default)]
pub struct FakePage {
    elements: HashMap<String, (HashMap<String, String>, String)>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(mut self, selector: &str, attrs: &[(&str, &str)], text: &str) -> Self {
        self.elements.insert(
            selector.to_string(),
            (
                attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                text.to_string(),
            ),
        );
        self
    }

    fn find(&self, selector: &str) -> Result<&(HashMap<String, String>, String), StepError> {
        self.elements
            .get(selector)
            .ok_or_else(|| StepError::failed(format!("no element matches '{selector}'")))
    }
}

#[async_trait]
impl PageHandle for FakePage {
    async fn goto(&self, _url: &str) -> Result<(), StepError> {
        Ok(())
    }

    async fn wait_for(&self, selector: &str) -> Result<(), StepError> {
        self.find(selector).map(|_| ())
    }

    async fn click(&self, selector: &str) -> Result<(), StepError> {
        self.find(selector).map(|_| ())
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, StepError> {
        Ok(self.find(selector)?.0.get(name).cloned())
    }

    async fn inner_text(&self, selector: &str) -> Result<String, StepError> {
        Ok(self.find(selector)?.1.clone())
    }
}

/// One engine wired over a recording transport.
pub struct Harness {
    pub runner: WorkflowRunner,
    pub producer: EventProducer,
    pub transport: Arc<MemoryTransport>,
    pub executor: Arc<ScriptedExecutor>,
}

impl Harness {
    /// Builds a harness around `executor` with a large batch size and a
    /// long linger, so the event log is observed only through explicit
    /// flushes.
    pub fn new(executor: ScriptedExecutor) -> Self {
        let transport = Arc::new(MemoryTransport::new());
        let producer = EventProducer::new(
            ProducerConfig {
                batch_size: 10_000,
                linger: Duration::from_secs(60),
                topic_prefix: String::new(),
                ..Default::default()
            },
            transport.clone(),
        );
        let executor = Arc::new(executor);
        let embedder = Arc::new(Embedder::new(producer.clone(), &EngineConfig::default()));
        let runner = WorkflowRunner::new(executor.clone(), embedder, EngineConfig::default());
        Self {
            runner,
            producer,
            transport,
            executor,
        }
    }

    /// Flushes the producer and decodes every delivered event on `topic`.
    pub async fn events_on(&self, topic: &str) -> Vec<Event> {
        self.producer.flush().await.unwrap();
        self.transport
            .delivered()
            .iter()
            .filter(|b| b.topic == topic)
            .flat_map(|b| &b.messages)
            .map(|m| serde_json::from_slice(&m.payload).unwrap())
            .collect()
    }
}

/// Builds a task whose steps are clicks on the given selectors.
pub fn click_task(name: &str, deps: &[&str], selectors: &[&str], retry: RetryPolicy) -> TaskDef {
    TaskDef {
        name: name.to_string(),
        depends_on: deps.iter().map(ToString::to_string).collect(),
        steps: selectors
            .iter()
            .map(|s| Step::Click {
                selector: s.to_string(),
            })
            .collect(),
        retry,
        output: None,
    }
}

pub fn workflow(name: &str, tasks: Vec<TaskDef>, policy: WorkflowPolicy) -> Workflow {
    Workflow {
        name: name.to_string(),
        tasks,
        policy,
    }
}

pub fn no_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 0,
        backoff_ms: 1,
    }
}
