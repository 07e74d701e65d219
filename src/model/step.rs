//! # Declarative browser steps.
//!
//! [`Step`] is a tagged variant dispatched by its `type` discriminator.
//! A step carries no state; it is purely a definition consumed by the
//! [`StepExecutor`](crate::exec::StepExecutor). Unknown discriminators are
//! rejected at parse time.
//!
//! ## Wire shape
//! ```json
//! {"type": "navigate", "url": "https://example.com"}
//! {"type": "waitFor", "selector": "#list", "timeoutMs": 5000}
//! {"type": "click", "selector": "#next"}
//! {"type": "extract", "selector": ".row", "schema": {"fields": [{"name": "title", "type": "string"}]}}
//! ```

use serde::{Deserialize, Serialize};

/// One field of an extraction schema: output name and declared type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name; also the attribute looked up on the matched element.
    pub name: String,
    /// Declared value type (informational, e.g. `"string"`).
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Ordered list of fields to extract from a matched element.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Fields in extraction order.
    pub fields: Vec<FieldSpec>,
}

/// An atomic browser operation.
///
/// Dispatch over the variants is exhaustive in the executor; adding a
/// variant is a compile-time prompt to handle it there.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Step {
    /// Navigate the page to `url`.
    Navigate {
        /// Absolute target URL.
        url: String,
    },
    /// Wait for `selector` to become present within `timeout_ms`.
    WaitFor {
        /// CSS selector to await.
        selector: String,
        /// Deadline in milliseconds; expiry is a `Timeout` step error.
        timeout_ms: u64,
    },
    /// Dispatch a click to `selector`.
    Click {
        /// CSS selector of the click target.
        selector: String,
    },
    /// Extract schema fields from the element matched by `selector`.
    Extract {
        /// CSS selector of the source element.
        selector: String,
        /// Fields to read (attribute first, inner text fallback).
        schema: Schema,
    },
}

impl Step {
    /// Returns the step's action-type string, as used in event payloads and
    /// probe action filters.
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Navigate { .. } => "navigate",
            Step::WaitFor { .. } => "waitFor",
            Step::Click { .. } => "click",
            Step::Extract { .. } => "extract",
        }
    }
}
