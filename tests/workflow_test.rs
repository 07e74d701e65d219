//! End-to-end workflow execution scenarios: scheduling, retries, fail-fast
//! cancellation, deadlines, and the emitted event log.

mod common;

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use common::{click_task, no_retry, workflow, Harness, ScriptedExecutor};
use flowvisor::{EngineError, RetryPolicy, TaskState, WorkflowPolicy, WorkflowStatus};

fn stub_page() -> std::sync::Arc<common::FakePage> {
    std::sync::Arc::new(common::FakePage::new())
}

#[tokio::test]
async fn diamond_completes_every_task_once() {
    let harness = Harness::new(ScriptedExecutor::new());
    let wf = workflow(
        "diamond",
        vec![
            click_task("a", &[], &["#a"], no_retry()),
            click_task("b", &["a"], &["#b"], no_retry()),
            click_task("c", &["a"], &["#c"], no_retry()),
            click_task("d", &["b", "c"], &["#d"], no_retry()),
        ],
        WorkflowPolicy {
            max_concurrent_tasks: 2,
            ..Default::default()
        },
    );

    let result = harness.runner.run(&wf, stub_page(), "sess").await.unwrap();
    assert_eq!(result.status, WorkflowStatus::Succeeded);
    assert!(result
        .tasks
        .values()
        .all(|t| t.state == TaskState::Succeeded));

    // Exactly one transition to Succeeded per task.
    let events = harness.events_on("tasks").await;
    for name in ["a", "b", "c", "d"] {
        let count = events
            .iter()
            .filter(|e| {
                e.event_type == "task.transition"
                    && e.task_id.as_deref() == Some(name)
                    && e.payload["to"] == "Succeeded"
            })
            .count();
        assert_eq!(count, 1, "task {name}");
    }
}

#[tokio::test]
async fn retry_then_succeed_consumes_one_retry_and_backs_off() {
    let harness = Harness::new(
        ScriptedExecutor::new().fail_first("#two", 1),
    );
    let wf = workflow(
        "retry",
        vec![click_task(
            "only",
            &[],
            &["#one", "#two", "#three"],
            RetryPolicy {
                max_retries: 1,
                backoff_ms: 10,
            },
        )],
        WorkflowPolicy::default(),
    );

    let started = Instant::now();
    let result = harness.runner.run(&wf, stub_page(), "sess").await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(10));

    assert_eq!(result.status, WorkflowStatus::Succeeded);
    let report = &result.tasks["only"];
    assert_eq!(report.state, TaskState::Succeeded);
    assert_eq!(report.retry_count, 1);

    // The retry restarted the sequence from step 0.
    let transitions: Vec<String> = harness
        .events_on("tasks")
        .await
        .into_iter()
        .filter(|e| e.event_type == "task.transition")
        .map(|e| e.payload["to"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        transitions,
        vec!["Scheduled", "Running", "Retrying", "Running", "Succeeded"]
    );
}

#[tokio::test]
async fn retries_exhausted_escalates_with_three_failed_steps() {
    let harness = Harness::new(ScriptedExecutor::new().fail_first("#broken", 100));
    let wf = workflow(
        "exhausted",
        vec![click_task(
            "only",
            &[],
            &["#broken"],
            RetryPolicy {
                max_retries: 2,
                backoff_ms: 1,
            },
        )],
        WorkflowPolicy::default(),
    );

    let result = harness.runner.run(&wf, stub_page(), "sess").await.unwrap();
    assert_eq!(result.status, WorkflowStatus::Failed);
    let report = &result.tasks["only"];
    assert_eq!(report.state, TaskState::Escalated);
    assert_eq!(report.retry_count, 2);
    assert!(report.last_error.as_deref().unwrap().contains("scripted failure"));

    // One failed step.completed per attempt: initial + two retries.
    let failed_steps = harness
        .events_on("measurements")
        .await
        .into_iter()
        .filter(|e| e.event_type == "step.completed" && e.payload["success"] == false)
        .count();
    assert_eq!(failed_steps, 3);
}

#[tokio::test]
async fn retry_law_succeeds_when_failures_equal_budget() {
    let harness = Harness::new(ScriptedExecutor::new().fail_first("#flaky", 2));
    let wf = workflow(
        "law",
        vec![click_task(
            "only",
            &[],
            &["#flaky"],
            RetryPolicy {
                max_retries: 2,
                backoff_ms: 1,
            },
        )],
        WorkflowPolicy::default(),
    );

    let result = harness.runner.run(&wf, stub_page(), "sess").await.unwrap();
    let report = &result.tasks["only"];
    assert_eq!(report.state, TaskState::Succeeded);
    assert_eq!(report.retry_count, 2);
}

#[tokio::test]
async fn fail_fast_cancels_the_sibling() {
    let harness = Harness::new(
        ScriptedExecutor::new()
            .fail_first("#doomed", 1)
            .slow("#slow", Duration::from_secs(5)),
    );
    let wf = workflow(
        "failfast",
        vec![
            click_task("a", &[], &["#doomed"], no_retry()),
            click_task("b", &[], &["#slow"], no_retry()),
        ],
        WorkflowPolicy {
            fail_fast: true,
            ..Default::default()
        },
    );

    let started = Instant::now();
    let result = harness.runner.run(&wf, stub_page(), "sess").await.unwrap();
    // Cancellation must preempt the five-second step.
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(result.status, WorkflowStatus::FailedFast);
    assert_eq!(result.tasks["a"].state, TaskState::Escalated);
    assert_eq!(result.tasks["b"].state, TaskState::Escalated);
    assert_eq!(result.tasks["b"].last_error.as_deref(), Some("Cancelled"));
}

#[tokio::test]
async fn cycle_fails_planning_and_emits_only_workflow_events() {
    let harness = Harness::new(ScriptedExecutor::new());
    let wf = workflow(
        "cyclic",
        vec![
            click_task("a", &["b"], &["#a"], no_retry()),
            click_task("b", &["a"], &["#b"], no_retry()),
        ],
        WorkflowPolicy::default(),
    );

    let err = harness.runner.run(&wf, stub_page(), "sess").await.unwrap_err();
    match err {
        EngineError::CycleDetected { participants } => {
            assert_eq!(participants, vec!["a", "b"]);
        }
        other => panic!("expected CycleDetected, got {other}"),
    }

    let events = harness.events_on("tasks").await;
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["workflow.started", "workflow.finished"]);
    assert_eq!(events[1].payload["success"], false);
}

#[tokio::test]
async fn concurrency_never_exceeds_the_cap() {
    let selectors: Vec<String> = (0..6).map(|i| format!("#t{i}")).collect();
    let mut executor = ScriptedExecutor::new();
    for s in &selectors {
        executor = executor.slow(s, Duration::from_millis(50));
    }
    let harness = Harness::new(executor);

    let tasks = selectors
        .iter()
        .enumerate()
        .map(|(i, s)| click_task(&format!("t{i}"), &[], &[s], no_retry()))
        .collect();
    let wf = workflow(
        "capped",
        tasks,
        WorkflowPolicy {
            max_concurrent_tasks: 2,
            ..Default::default()
        },
    );

    let result = harness.runner.run(&wf, stub_page(), "sess").await.unwrap();
    assert_eq!(result.status, WorkflowStatus::Succeeded);
    assert!(
        harness.executor.peak_concurrency() <= 2,
        "peak concurrency {} exceeded cap",
        harness.executor.peak_concurrency()
    );
}

#[tokio::test]
async fn dependent_task_is_scheduled_only_after_dependency_succeeds() {
    let harness = Harness::new(
        ScriptedExecutor::new().slow("#a", Duration::from_millis(50)),
    );
    let wf = workflow(
        "barrier",
        vec![
            click_task("a", &[], &["#a"], no_retry()),
            click_task("b", &["a"], &["#b"], no_retry()),
        ],
        WorkflowPolicy::default(),
    );

    harness.runner.run(&wf, stub_page(), "sess").await.unwrap();

    let events = harness.events_on("tasks").await;
    let position = |task: &str, to: &str| {
        events
            .iter()
            .position(|e| {
                e.event_type == "task.transition"
                    && e.task_id.as_deref() == Some(task)
                    && e.payload["to"] == to
            })
            .unwrap()
    };
    assert!(position("a", "Succeeded") < position("b", "Scheduled"));
}

#[tokio::test]
async fn deadline_times_out_and_escalates_incomplete_tasks() {
    let harness = Harness::new(
        ScriptedExecutor::new().slow("#slow", Duration::from_secs(5)),
    );
    let wf = workflow(
        "deadline",
        vec![
            click_task("a", &[], &["#slow"], no_retry()),
            click_task("b", &["a"], &["#b"], no_retry()),
        ],
        WorkflowPolicy {
            timeout_ms: 100,
            ..Default::default()
        },
    );

    let started = Instant::now();
    let result = harness.runner.run(&wf, stub_page(), "sess").await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(result.status, WorkflowStatus::TimedOut);
    // The in-flight task was cancelled mid-step; the unreached dependent is
    // swept with the deadline error.
    assert_eq!(result.tasks["a"].state, TaskState::Escalated);
    assert_eq!(result.tasks["a"].last_error.as_deref(), Some("Cancelled"));
    assert_eq!(result.tasks["b"].state, TaskState::Escalated);
    assert_eq!(result.tasks["b"].last_error.as_deref(), Some("TimeoutExceeded"));
}

#[tokio::test]
async fn external_cancellation_escalates_in_flight_tasks() {
    let harness = Harness::new(
        ScriptedExecutor::new().slow("#slow", Duration::from_secs(5)),
    );
    let wf = workflow(
        "external",
        vec![click_task("a", &[], &["#slow"], no_retry())],
        WorkflowPolicy::default(),
    );

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let result = harness
        .runner
        .run_with_token(&wf, stub_page(), "sess", token)
        .await
        .unwrap();
    assert_eq!(result.tasks["a"].state, TaskState::Escalated);
    assert_eq!(result.tasks["a"].last_error.as_deref(), Some("Cancelled"));
    assert_eq!(result.status, WorkflowStatus::Failed);
}
