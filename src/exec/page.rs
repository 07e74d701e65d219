//! # Opaque browser page abstraction.
//!
//! The engine drives a page through [`PageHandle`]; the concrete automation
//! protocol (CDP, WebDriver, a remote pool session) is a property of the
//! runtime environment, not of the engine. Tests script a fake handle.
//!
//! ## Rules
//! - Element-not-found is reported as [`StepError::Failed`]; deadlines are
//!   applied by the executor, not the page.
//! - Implementations must be safe to call from multiple tasks; each task of
//!   a workflow typically owns its own page, but the trait does not require
//!   it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;

/// Async handle to one browser page.
#[async_trait]
pub trait PageHandle: Send + Sync + 'static {
    /// Navigates to `url`, resolving when the navigation completes.
    async fn goto(&self, url: &str) -> Result<(), StepError>;

    /// Resolves once `selector` is present in the page.
    ///
    /// Deadlines are enforced by the caller; implementations may poll or
    /// subscribe but must return promptly once the element appears.
    async fn wait_for(&self, selector: &str) -> Result<(), StepError>;

    /// Dispatches a click to the element matched by `selector`.
    async fn click(&self, selector: &str) -> Result<(), StepError>;

    /// Reads attribute `name` from the element matched by `selector`.
    ///
    /// Returns `Ok(None)` when the element exists but lacks the attribute;
    /// a missing element is an `Err`.
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, StepError>;

    /// Reads the inner text of the element matched by `selector`.
    async fn inner_text(&self, selector: &str) -> Result<String, StepError>;
}

/// Execution context handed to the step executor.
///
/// Carries the opaque page handle, the session correlation id, and the
/// cancellation token every blocking operation must observe.
#[derive(Clone)]
pub struct StepContext {
    /// The page this task drives.
    pub page: Arc<dyn PageHandle>,
    /// Session correlation id; becomes the partition key of emitted events.
    pub session_id: String,
    /// Cooperative cancellation signal.
    pub cancel: CancellationToken,
}

impl StepContext {
    /// Creates a context over `page` for `session_id`.
    pub fn new(
        page: Arc<dyn PageHandle>,
        session_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            page,
            session_id: session_id.into(),
            cancel,
        }
    }
}
