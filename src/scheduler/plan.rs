//! # Batch planning over the task dependency graph.
//!
//! [`plan`] produces an [`ExecutionPlan`]: an ordered sequence of batches
//! such that
//!
//! 1. every task in batch *i* has all of its dependencies in batches `< i`,
//! 2. the concatenation of batches contains every task exactly once,
//! 3. tasks within one batch are mutually independent.
//!
//! ## Algorithm
//! Iterate until the undone set is empty. Each round scans the undone set in
//! definition order and selects every task whose dependencies are all
//! completed; the selection forms the next batch. A round that selects
//! nothing while tasks remain means the remainder participates in a cycle,
//! which fails with [`EngineError::CycleDetected`] naming all participants.
//!
//! Definition order is preserved within a batch so plans are deterministic.

use std::collections::HashSet;

use crate::error::EngineError;
use crate::model::Workflow;

/// One scheduling batch: task names in definition order.
pub type Batch = Vec<String>;

/// Ordered batches covering every task of a workflow exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Batches in execution order.
    pub batches: Vec<Batch>,
}

impl ExecutionPlan {
    /// Total number of tasks across all batches.
    pub fn task_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

/// Plans the batch sequence for `workflow`.
///
/// Validates the definition first, so `dependsOn` references to undefined
/// tasks surface as [`EngineError::Parse`] rather than a bogus cycle report.
pub fn plan(workflow: &Workflow) -> Result<ExecutionPlan, EngineError> {
    workflow.validate()?;

    let mut completed: HashSet<&str> = HashSet::with_capacity(workflow.tasks.len());
    let mut undone: Vec<&crate::model::TaskDef> = workflow.tasks.iter().collect();
    let mut batches = Vec::new();

    while !undone.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = undone
            .into_iter()
            .partition(|t| t.depends_on.iter().all(|d| completed.contains(d.as_str())));

        if ready.is_empty() {
            let mut participants: Vec<String> =
                blocked.iter().map(|t| t.name.clone()).collect();
            participants.sort();
            return Err(EngineError::CycleDetected { participants });
        }

        for task in &ready {
            completed.insert(task.name.as_str());
        }
        batches.push(ready.into_iter().map(|t| t.name.clone()).collect());
        undone = blocked;
    }

    Ok(ExecutionPlan { batches })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskDef, Workflow, WorkflowPolicy};

    fn task(name: &str, deps: &[&str]) -> TaskDef {
        TaskDef {
            name: name.to_string(),
            depends_on: deps.iter().map(ToString::to_string).collect(),
            steps: Vec::new(),
            retry: Default::default(),
            output: None,
        }
    }

    fn workflow(tasks: Vec<TaskDef>) -> Workflow {
        Workflow {
            name: "test".to_string(),
            tasks,
            policy: WorkflowPolicy::default(),
        }
    }

    #[test]
    fn diamond_yields_three_batches() {
        let wf = workflow(vec![
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["a"]),
            task("d", &["b", "c"]),
        ]);
        let plan = plan(&wf).unwrap();
        assert_eq!(
            plan.batches,
            vec![
                vec!["a".to_string()],
                vec!["b".to_string(), "c".to_string()],
                vec!["d".to_string()],
            ]
        );
    }

    #[test]
    fn independent_tasks_share_one_batch() {
        let wf = workflow(vec![task("a", &[]), task("b", &[]), task("c", &[])]);
        let plan = plan(&wf).unwrap();
        assert_eq!(plan.batches.len(), 1);
        assert_eq!(plan.batches[0], vec!["a", "b", "c"]);
    }

    #[test]
    fn every_task_appears_exactly_once() {
        let wf = workflow(vec![
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["b"]),
            task("d", &["a"]),
        ]);
        let plan = plan(&wf).unwrap();
        assert_eq!(plan.task_count(), 4);

        let mut seen: Vec<&str> = plan
            .batches
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn dependencies_land_in_earlier_batches() {
        let wf = workflow(vec![
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["a", "b"]),
        ]);
        let plan = plan(&wf).unwrap();

        let batch_of = |name: &str| {
            plan.batches
                .iter()
                .position(|b| b.iter().any(|t| t == name))
                .unwrap()
        };
        assert!(batch_of("a") < batch_of("b"));
        assert!(batch_of("b") < batch_of("c"));
    }

    #[test]
    fn two_node_cycle_is_reported_with_all_participants() {
        let wf = workflow(vec![task("a", &["b"]), task("b", &["a"])]);
        match plan(&wf).unwrap_err() {
            EngineError::CycleDetected { participants } => {
                assert_eq!(participants, vec!["a", "b"]);
            }
            other => panic!("expected CycleDetected, got {other}"),
        }
    }

    #[test]
    fn cycle_report_excludes_schedulable_prefix() {
        let wf = workflow(vec![
            task("root", &[]),
            task("x", &["root", "z"]),
            task("y", &["x"]),
            task("z", &["y"]),
        ]);
        match plan(&wf).unwrap_err() {
            EngineError::CycleDetected { participants } => {
                assert_eq!(participants, vec!["x", "y", "z"]);
            }
            other => panic!("expected CycleDetected, got {other}"),
        }
    }

    #[test]
    fn empty_workflow_plans_to_no_batches() {
        let plan = plan(&workflow(Vec::new())).unwrap();
        assert!(plan.batches.is_empty());
    }
}
