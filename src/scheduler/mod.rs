//! # Dependency scheduler.
//!
//! Turns a workflow's task graph into an ordered sequence of batches where
//! each batch contains only tasks whose dependencies are satisfied by
//! earlier batches. See [`plan`].

mod plan;

pub use plan::{plan, Batch, ExecutionPlan};
