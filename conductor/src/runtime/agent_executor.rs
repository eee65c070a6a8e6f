//! Agent Executor - Single Agent Invocation
//!
//! Runs one agent to a terminal outcome, enforcing parameter validation,
//! lifecycle hooks, the per-attempt timeout and the retry policy declared in
//! the agent's metadata. Every invocation yields an [`ExecutionResult`]; agent
//! failures never surface as errors to the caller.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agents::{Agent, Params};

/// Error message recorded when a plan cancellation interrupts an invocation
pub const CANCELLED_MESSAGE: &str = "execution cancelled";

// ============================================================================
// Execution Result
// ============================================================================

/// Terminal status of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The agent returned a value
    Succeeded,

    /// The agent returned an error (or panicked) on its last attempt
    Failed,

    /// The last attempt exceeded `timeout_seconds`
    Timeout,

    /// `validate` rejected the parameters; never retried
    InvalidParams,

    /// Never run (stop-on-error, failed dependency or cancellation)
    Skipped,
}

impl ExecutionStatus {
    /// Whether this is the `succeeded` status
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Whether the agent ran (or tried to) and did not succeed
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Timeout | Self::InvalidParams)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecutionStatus::Succeeded => "succeeded",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Timeout => "timeout",
            ExecutionStatus::InvalidParams => "invalid_params",
            ExecutionStatus::Skipped => "skipped",
        };
        write!(f, "{}", label)
    }
}

/// Record of one agent invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Agent that was invoked
    pub agent_name: String,

    /// Unique per invocation
    pub execution_id: Uuid,

    /// Terminal status
    pub status: ExecutionStatus,

    /// Success payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Failure message, present iff status is not `succeeded`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Attempts made (0 for skipped invocations)
    pub attempt_count: u32,

    /// Wall clock across all attempts, including retry delays
    pub duration_seconds: f64,

    /// When the invocation started
    pub started_at: DateTime<Utc>,

    /// When the invocation reached its terminal status
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// Result for an agent that was never run
    pub fn skipped(agent_name: impl Into<String>, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            agent_name: agent_name.into(),
            execution_id: Uuid::new_v4(),
            status: ExecutionStatus::Skipped,
            data: None,
            error: Some(reason.into()),
            attempt_count: 0,
            duration_seconds: 0.0,
            started_at: now,
            finished_at: now,
        }
    }

    /// Result for an invocation whose supervising task was lost
    pub fn failed(agent_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            attempt_count: 1,
            ..Self::skipped(agent_name, error)
        }
    }

    /// Whether the invocation succeeded
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Executor statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorStatistics {
    /// Total invocations that ran (skips excluded)
    pub total_invocations: u64,

    /// Invocations ending in `succeeded`
    pub succeeded: u64,

    /// Invocations ending in `failed`
    pub failed: u64,

    /// Invocations ending in `timeout`
    pub timed_out: u64,

    /// Invocations rejected by `validate`
    pub invalid_params: u64,

    /// Attempts across all invocations
    pub total_attempts: u64,

    /// Cumulative invocation wall clock (ms)
    pub total_execution_time_ms: u64,

    /// Average invocation wall clock (ms)
    pub avg_execution_time_ms: u64,
}

impl ExecutorStatistics {
    fn record(&mut self, result: &ExecutionResult) {
        match result.status {
            ExecutionStatus::Succeeded => self.succeeded += 1,
            ExecutionStatus::Failed => self.failed += 1,
            ExecutionStatus::Timeout => self.timed_out += 1,
            ExecutionStatus::InvalidParams => self.invalid_params += 1,
            ExecutionStatus::Skipped => return,
        }

        self.total_invocations += 1;
        self.total_attempts += u64::from(result.attempt_count);
        self.total_execution_time_ms += (result.duration_seconds * 1000.0) as u64;
        self.avg_execution_time_ms = self.total_execution_time_ms / self.total_invocations;
    }
}

// ============================================================================
// Invocation State Machine
// ============================================================================

/// Why an attempt did not succeed
#[derive(Debug)]
enum AttemptFailure {
    Error(String),
    Timeout(Duration),
}

impl AttemptFailure {
    fn message(&self, agent_name: &str) -> String {
        match self {
            Self::Error(msg) => msg.clone(),
            Self::Timeout(limit) => {
                format!("Agent `{}` timed out after {}s", agent_name, limit.as_secs())
            }
        }
    }
}

/// Outcome of a single attempt
enum AttemptOutcome {
    Succeeded(Value),
    Failed(AttemptFailure),
    /// Supervision stopped; the body may still be running on its task
    Cancelled(Option<JoinHandle<crate::agents::Result<Value>>>),
}

/// Terminal outcome of an invocation
enum Terminal {
    Succeeded(Value),
    Exhausted(AttemptFailure),
    Cancelled,
}

/// Invocation states; each transition moves strictly forward except
/// `Backoff -> Running`, which starts a new attempt
enum InvocationState {
    Pending,
    Running { attempt: u32 },
    Backoff { attempt: u32, failure: AttemptFailure },
    Finished { attempts: u32, terminal: Terminal },
}

// ============================================================================
// Agent Executor
// ============================================================================

/// Agent executor for running single invocations
#[derive(Debug, Default)]
pub struct AgentExecutor {
    /// Execution statistics
    stats: Arc<RwLock<ExecutorStatistics>>,
}

impl AgentExecutor {
    /// Create a new agent executor
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute `agent` with `params` to a terminal outcome
    pub async fn execute(&self, agent: Arc<dyn Agent>, params: Params) -> ExecutionResult {
        self.execute_with_cancel(agent, params, &CancellationToken::new())
            .await
    }

    /// Execute `agent`, stopping supervision when `cancel` fires.
    ///
    /// Cancellation interrupts the timer and any retry delay. An attempt that
    /// is already running is not aborted: it finishes on its own task and the
    /// `cleanup` hook runs after it.
    ///
    /// The invocation is supervised on its own task, so dropping the returned
    /// future does not abandon it: pair the drop with cancelling `cancel`
    /// (for example through a `DropGuard`) and the invocation still runs
    /// `cleanup` and records its statistics.
    pub async fn execute_with_cancel(
        &self,
        agent: Arc<dyn Agent>,
        params: Params,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let agent_name = agent.name().to_string();

        if cancel.is_cancelled() {
            debug!(agent = %agent_name, "invocation cancelled before start");
            return ExecutionResult::skipped(agent_name, CANCELLED_MESSAGE);
        }

        let supervisor = tokio::spawn(supervise(
            Arc::clone(&self.stats),
            agent,
            params,
            cancel.clone(),
        ));

        match supervisor.await {
            Ok(result) => result,
            Err(e) => {
                error!(agent = %agent_name, "invocation supervisor failed");
                ExecutionResult::failed(agent_name, join_error_message(e))
            }
        }
    }

    /// Snapshot of the running statistics
    pub async fn statistics(&self) -> ExecutorStatistics {
        self.stats.read().await.clone()
    }
}

/// Drive one invocation to its terminal result and record it
async fn supervise(
    stats: Arc<RwLock<ExecutorStatistics>>,
    agent: Arc<dyn Agent>,
    params: Params,
    cancel: CancellationToken,
) -> ExecutionResult {
    let agent_name = agent.name().to_string();
    let execution_id = Uuid::new_v4();
    let started_at = Utc::now();
    let start = Instant::now();

    info!(agent = %agent_name, %execution_id, "executing agent");

    if !agent.validate(&params) {
        warn!(agent = %agent_name, %execution_id, "parameter validation failed");
        let result = ExecutionResult {
            agent_name: agent_name.clone(),
            execution_id,
            status: ExecutionStatus::InvalidParams,
            data: None,
            error: Some(format!("Invalid parameters for agent `{}`", agent_name)),
            attempt_count: 1,
            duration_seconds: start.elapsed().as_secs_f64(),
            started_at,
            finished_at: Utc::now(),
        };
        stats.write().await.record(&result);
        return result;
    }

    let max_attempts = agent.metadata().max_attempts();
    let retry_delay = agent.metadata().retry_delay();
    let mut detached = None;
    let mut state = InvocationState::Pending;

    let (attempts, terminal) = loop {
        state = match state {
            InvocationState::Pending => InvocationState::Running { attempt: 1 },

            InvocationState::Running { attempt } => {
                debug!(agent = %agent_name, attempt, "attempt started");
                match run_attempt(&agent, &params, &cancel).await {
                    AttemptOutcome::Succeeded(value) => InvocationState::Finished {
                        attempts: attempt,
                        terminal: Terminal::Succeeded(value),
                    },
                    AttemptOutcome::Failed(failure) if attempt < max_attempts => {
                        warn!(
                            agent = %agent_name,
                            attempt,
                            error = %failure.message(&agent_name),
                            "attempt failed, retrying"
                        );
                        InvocationState::Backoff { attempt, failure }
                    }
                    AttemptOutcome::Failed(failure) => InvocationState::Finished {
                        attempts: attempt,
                        terminal: Terminal::Exhausted(failure),
                    },
                    AttemptOutcome::Cancelled(handle) => {
                        detached = handle;
                        InvocationState::Finished {
                            attempts: attempt,
                            terminal: Terminal::Cancelled,
                        }
                    }
                }
            }

            InvocationState::Backoff { attempt, failure } => {
                debug!(agent = %agent_name, attempt, delay = ?retry_delay, "backing off");
                tokio::select! {
                    _ = tokio::time::sleep(retry_delay) => {
                        InvocationState::Running { attempt: attempt + 1 }
                    }
                    _ = cancel.cancelled() => {
                        debug!(agent = %agent_name, last_error = %failure.message(&agent_name), "retry delay cancelled");
                        InvocationState::Finished { attempts: attempt, terminal: Terminal::Cancelled }
                    }
                }
            }

            InvocationState::Finished { attempts, terminal } => break (attempts, terminal),
        };
    };

    // cleanup: once per invocation, after the body is done
    match detached {
        Some(handle) => {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move {
                let _ = handle.await;
                agent.cleanup().await;
            });
        }
        None => agent.cleanup().await,
    }

    let (status, data, error) = match terminal {
        Terminal::Succeeded(value) => (ExecutionStatus::Succeeded, Some(value), None),
        Terminal::Exhausted(failure) => {
            let status = match failure {
                AttemptFailure::Timeout(_) => ExecutionStatus::Timeout,
                AttemptFailure::Error(_) => ExecutionStatus::Failed,
            };
            (status, None, Some(failure.message(&agent_name)))
        }
        Terminal::Cancelled => (ExecutionStatus::Failed, None, Some(CANCELLED_MESSAGE.to_string())),
    };

    let result = ExecutionResult {
        agent_name,
        execution_id,
        status,
        data,
        error,
        attempt_count: attempts,
        duration_seconds: start.elapsed().as_secs_f64(),
        started_at,
        finished_at: Utc::now(),
    };

    if result.is_success() {
        info!(
            agent = %result.agent_name,
            %execution_id,
            attempts,
            duration_s = result.duration_seconds,
            "agent succeeded"
        );
    } else {
        error!(
            agent = %result.agent_name,
            %execution_id,
            status = %result.status,
            attempts,
            error = result.error.as_deref().unwrap_or_default(),
            "agent did not succeed"
        );
    }

    stats.write().await.record(&result);
    result
}

/// Run `initialize` then the agent body under the metadata timeout
async fn run_attempt(
    agent: &Arc<dyn Agent>,
    params: &Params,
    cancel: &CancellationToken,
) -> AttemptOutcome {
    if let Err(e) = agent.initialize().await {
        return AttemptOutcome::Failed(AttemptFailure::Error(format!(
            "initialize failed: {}",
            e
        )));
    }

    if cancel.is_cancelled() {
        return AttemptOutcome::Cancelled(None);
    }

    let body_agent = Arc::clone(agent);
    let body_params = params.clone();
    let mut handle = tokio::spawn(async move { body_agent.execute(body_params).await });

    let limit = agent.metadata().timeout();
    let timer = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;

        joined = &mut handle => match joined {
            Ok(Ok(value)) => AttemptOutcome::Succeeded(value),
            Ok(Err(e)) => AttemptOutcome::Failed(AttemptFailure::Error(e.to_string())),
            Err(e) => AttemptOutcome::Failed(AttemptFailure::Error(join_error_message(e))),
        },
        _ = cancel.cancelled() => AttemptOutcome::Cancelled(Some(handle)),
        _ = timer => {
            handle.abort();
            // limit is always Some here: the unbounded timer never completes
            AttemptOutcome::Failed(AttemptFailure::Timeout(limit.unwrap_or_default()))
        }
    }
}

fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        format!("agent panicked: {}", detail)
    } else {
        "agent task was cancelled".to_string()
    }
}
