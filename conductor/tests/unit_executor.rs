//! Unit tests for the single-agent executor

mod common;

use std::time::{Duration, Instant};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::ScriptedAgent;
use conductor::runtime::{AgentExecutor, ExecutionStatus, CANCELLED_MESSAGE};

#[tokio::test]
async fn test_success_single_attempt() {
    let (agent, probe) = ScriptedAgent::new("ok").build();
    let result = AgentExecutor::new().execute(agent, json!({"x": 1})).await;

    assert_eq!(result.status, ExecutionStatus::Succeeded);
    assert_eq!(result.attempt_count, 1);
    assert!(result.error.is_none());
    assert_eq!(result.data.as_ref().unwrap()["params"]["x"], 1);
    assert!(result.finished_at >= result.started_at);
    assert_eq!(probe.executes(), 1);
    assert_eq!(probe.cleanups(), 1);
}

#[tokio::test]
async fn test_invalid_params_never_executes() {
    let (agent, probe) = ScriptedAgent::new("picky").rejecting_params().retries(5).build();
    let result = AgentExecutor::new().execute(agent, json!({})).await;

    assert_eq!(result.status, ExecutionStatus::InvalidParams);
    assert_eq!(result.attempt_count, 1);
    assert!(result.data.is_none());
    assert!(result.error.is_some());
    assert_eq!(probe.executes(), 0);
    assert_eq!(probe.initializes(), 0);
}

#[tokio::test]
async fn test_retry_then_succeed_reports_true_attempts() {
    let (agent, probe) = ScriptedAgent::new("flaky").fail_first(2).retries(2).build();
    let result = AgentExecutor::new().execute(agent, json!({})).await;

    assert_eq!(result.status, ExecutionStatus::Succeeded);
    assert_eq!(result.attempt_count, 3);
    assert_eq!(probe.executes(), 3);
    assert_eq!(probe.initializes(), 3);
    assert_eq!(probe.cleanups(), 1);
}

#[tokio::test]
async fn test_retry_delay_elapses_between_attempts() {
    let (agent, probe) = ScriptedAgent::new("patient")
        .fail_first(1)
        .retries(1)
        .retry_delay_seconds(1)
        .build();

    let start = Instant::now();
    let result = AgentExecutor::new().execute(agent, json!({})).await;

    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(result.status, ExecutionStatus::Succeeded);
    assert_eq!(result.attempt_count, 2);
    assert!(result.duration_seconds >= 1.0);
    assert_eq!(probe.executes(), 2);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let (agent, probe) = ScriptedAgent::new("broken").failing().retries(1).build();
    let result = AgentExecutor::new().execute(agent, json!({})).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.attempt_count, 2);
    assert_eq!(result.error.as_deref(), Some("Task execution failed: scripted failure #2"));
    assert_eq!(probe.executes(), 2);
    assert_eq!(probe.cleanups(), 1);
}

#[tokio::test]
async fn test_zero_retries_means_one_attempt() {
    let (agent, probe) = ScriptedAgent::new("once").failing().build();
    let result = AgentExecutor::new().execute(agent, json!({})).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.attempt_count, 1);
    assert_eq!(probe.executes(), 1);
}

#[tokio::test]
async fn test_timeout_enforced() {
    let (agent, probe) = ScriptedAgent::new("slow").delay_ms(3_000).timeout_seconds(1).build();

    let start = Instant::now();
    let result = AgentExecutor::new().execute(agent, json!({})).await;
    let elapsed = start.elapsed();

    assert_eq!(result.status, ExecutionStatus::Timeout);
    assert_eq!(result.attempt_count, 1);
    assert!(elapsed >= Duration::from_millis(900), "returned early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1_500), "returned late: {:?}", elapsed);
    assert!(result.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(probe.cleanups(), 1);
    assert_eq!(probe.completions(), 0);
}

#[tokio::test]
async fn test_zero_timeout_disables_timer() {
    let (agent, _probe) = ScriptedAgent::new("unbounded").delay_ms(50).timeout_seconds(0).build();
    let result = AgentExecutor::new().execute(agent, json!({})).await;

    assert_eq!(result.status, ExecutionStatus::Succeeded);
}

#[tokio::test]
async fn test_panic_captured_as_failure() {
    let (agent, probe) = ScriptedAgent::new("explodes").panicking().build();
    let result = AgentExecutor::new().execute(agent, json!({})).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(result.error.as_deref().unwrap().contains("scripted panic"));
    assert_eq!(probe.cleanups(), 1);
}

#[tokio::test]
async fn test_initialize_failure_counts_as_attempt() {
    let (agent, probe) = ScriptedAgent::new("noinit").failing_initialize().retries(1).build();
    let result = AgentExecutor::new().execute(agent, json!({})).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.attempt_count, 2);
    assert!(result.error.as_deref().unwrap().contains("initialize failed"));
    assert_eq!(probe.executes(), 0);
    assert_eq!(probe.cleanups(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start_is_skipped() {
    let (agent, probe) = ScriptedAgent::new("late").build();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = AgentExecutor::new()
        .execute_with_cancel(agent, json!({}), &cancel)
        .await;

    assert_eq!(result.status, ExecutionStatus::Skipped);
    assert_eq!(result.attempt_count, 0);
    assert_eq!(probe.executes(), 0);
    assert_eq!(probe.cleanups(), 0);
}

#[tokio::test]
async fn test_cancel_detaches_running_body_and_defers_cleanup() {
    let (agent, probe) = ScriptedAgent::new("busy").delay_ms(300).build();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let result = AgentExecutor::new()
        .execute_with_cancel(agent, json!({}), &cancel)
        .await;

    assert!(start.elapsed() < Duration::from_millis(250));
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.error.as_deref(), Some(CANCELLED_MESSAGE));
    assert_eq!(result.attempt_count, 1);
    assert_eq!(probe.cleanups(), 0);

    // the body keeps running, then cleanup follows
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(probe.completions(), 1);
    assert_eq!(probe.cleanups(), 1);
}

#[tokio::test]
async fn test_dropped_caller_still_cleans_up() {
    let (agent, probe) = ScriptedAgent::new("abandoned").delay_ms(200).build();
    let executor = AgentExecutor::new();
    let cancel = CancellationToken::new();

    // cancel on drop, the way an HTTP handler guards its request
    let guard = cancel.clone().drop_guard();
    let call = async {
        let _guard = guard;
        executor.execute_with_cancel(agent, json!({}), &cancel).await
    };
    assert!(tokio::time::timeout(Duration::from_millis(50), call).await.is_err());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(probe.completions(), 1);
    assert_eq!(probe.cleanups(), 1);

    let stats = executor.statistics().await;
    assert_eq!(stats.total_invocations, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_cancel_interrupts_retry_delay() {
    let (agent, probe) = ScriptedAgent::new("waiting")
        .failing()
        .retries(3)
        .retry_delay_seconds(10)
        .build();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let result = AgentExecutor::new()
        .execute_with_cancel(agent, json!({}), &cancel)
        .await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.error.as_deref(), Some(CANCELLED_MESSAGE));
    assert_eq!(result.attempt_count, 1);
    assert_eq!(probe.executes(), 1);
    assert_eq!(probe.cleanups(), 1);
}

#[tokio::test]
async fn test_statistics_accumulate() {
    let executor = AgentExecutor::new();

    let (ok, _) = ScriptedAgent::new("ok").build();
    let (bad, _) = ScriptedAgent::new("bad").failing().retries(1).build();
    let (picky, _) = ScriptedAgent::new("picky").rejecting_params().build();

    executor.execute(ok, json!({})).await;
    executor.execute(bad, json!({})).await;
    executor.execute(picky, json!({})).await;

    let stats = executor.statistics().await;
    assert_eq!(stats.total_invocations, 3);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.invalid_params, 1);
    assert_eq!(stats.total_attempts, 4);
}
