//! Plan execution engine
//!
//! Drives resolved plan entries through the [`AgentExecutor`]. Sequential
//! plans run on the caller's task. Parallel and DAG plans share one pooled
//! driver: a semaphore caps in-flight agents, the [`TaskScheduler`] decides
//! admission order, and results are slotted back by plan position.

use std::sync::Arc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::agents::{Agent, Params};
use crate::runtime::{AgentExecutor, ExecutionResult, CANCELLED_MESSAGE};

use super::dag::DependencyGraph;
use super::scheduler::TaskScheduler;

/// Skip reason for entries left unstarted by `stop_on_error`
pub const STOPPED_MESSAGE: &str = "not run: an earlier agent did not succeed";

/// One resolved plan entry
pub struct PlanEntry {
    /// Name as listed in the plan
    pub name: String,
    /// Resolved agent
    pub agent: Arc<dyn Agent>,
    /// Parameters after overrides
    pub params: Params,
}

/// Executes resolved plans
#[derive(Debug, Clone)]
pub struct PlanExecutor {
    executor: Arc<AgentExecutor>,
}

impl PlanExecutor {
    /// Run plans on `executor`
    pub fn new(executor: Arc<AgentExecutor>) -> Self {
        Self { executor }
    }

    /// Run entries one at a time in order
    pub async fn run_sequential(
        &self,
        entries: Vec<PlanEntry>,
        stop_on_error: bool,
        cancel: &CancellationToken,
    ) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(entries.len());
        let mut halted = false;

        for entry in entries {
            if halted {
                results.push(ExecutionResult::skipped(entry.name, STOPPED_MESSAGE));
                continue;
            }
            if cancel.is_cancelled() {
                results.push(ExecutionResult::skipped(entry.name, CANCELLED_MESSAGE));
                continue;
            }

            let result = self
                .executor
                .execute_with_cancel(entry.agent, entry.params, &cancel.child_token())
                .await;

            if stop_on_error && !result.is_success() {
                info!(agent = %entry.name, "stop_on_error: skipping remaining agents");
                halted = true;
            }
            results.push(result);
        }

        results
    }

    /// Run entries on a bounded worker pool, respecting `graph` edges
    pub async fn run_pooled(
        &self,
        entries: Vec<PlanEntry>,
        graph: DependencyGraph,
        max_concurrency: usize,
        stop_on_error: bool,
        cancel: &CancellationToken,
    ) -> Vec<ExecutionResult> {
        let names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
        let mut pending: Vec<Option<PlanEntry>> = entries.into_iter().map(Some).collect();
        let mut slots: Vec<Option<ExecutionResult>> = names.iter().map(|_| None).collect();

        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let mut scheduler = TaskScheduler::new(graph);
        let mut in_flight = FuturesUnordered::new();
        let mut halted = false;

        loop {
            // admission: plan order among eligible entries, while permits last
            while !halted && !cancel.is_cancelled() && scheduler.has_ready() {
                let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                    break;
                };
                let Some(position) = scheduler.next_ready() else {
                    break;
                };
                let Some(entry) = pending[position].take() else {
                    continue;
                };

                debug!(agent = %entry.name, position, "admitted");

                let executor = Arc::clone(&self.executor);
                let token = cancel.child_token();
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    executor
                        .execute_with_cancel(entry.agent, entry.params, &token)
                        .await
                });
                in_flight.push(async move { (position, handle.await) });
            }

            let Some((position, joined)) = in_flight.next().await else {
                break;
            };

            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(agent = %names[position], error = %e, "worker task failed");
                    ExecutionResult::failed(names[position].clone(), format!("worker task failed: {}", e))
                }
            };

            let succeeded = result.is_success();
            for dependent in scheduler.complete(position, succeeded) {
                debug!(agent = %names[dependent], dependency = %names[position], "skipping dependent");
                slots[dependent] = Some(ExecutionResult::skipped(
                    names[dependent].clone(),
                    format!("dependency `{}` did not succeed", names[position]),
                ));
            }

            if !succeeded && stop_on_error && !halted {
                info!(agent = %names[position], "stop_on_error: no further admissions");
                halted = true;
            }

            slots[position] = Some(result);
        }

        let reason = if halted { STOPPED_MESSAGE } else { CANCELLED_MESSAGE };
        for position in scheduler.skip_unstarted() {
            slots[position] = Some(ExecutionResult::skipped(names[position].clone(), reason));
        }

        slots
            .into_iter()
            .zip(names)
            .map(|(slot, name)| slot.unwrap_or_else(|| ExecutionResult::skipped(name, CANCELLED_MESSAGE)))
            .collect()
    }
}
