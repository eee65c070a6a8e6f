//! Orchestration Engine
//!
//! Multi-agent plan execution on top of the single-invocation executor.
//!
//! # Features
//!
//! - Sequential, parallel and dependency-ordered (DAG) plans
//! - Bounded worker pool with plan-order admission
//! - Stop-on-error and dependency-failure skipping
//! - Cycle detection before anything runs
//! - Cooperative cancellation through `CancellationToken`
//!
//! Structural problems (unknown agents, cycles, invalid settings) are
//! reported as [`OrchestrationError`] before any agent starts. Runtime
//! failures of individual agents are captured in their results.

use std::sync::Arc;
use std::time::Instant;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::{AgentRegistry, Params};
use crate::runtime::{AgentExecutor, ExecutionResult};

pub mod dag;
pub mod scheduler;
pub mod executor;
pub mod execution_plan;

pub use dag::{DagValidator, DependencyGraph};
pub use scheduler::{NodeState, TaskScheduler};
pub use executor::{PlanEntry, PlanExecutor, STOPPED_MESSAGE};
pub use execution_plan::*;

/// Main orchestrator for running agents and plans against a registry
#[derive(Debug, Clone)]
pub struct Orchestrator {
    /// Agent catalog
    registry: Arc<AgentRegistry>,

    /// Single-invocation executor (shared statistics)
    executor: Arc<AgentExecutor>,

    /// Plan driver
    plans: PlanExecutor,
}

impl Orchestrator {
    /// Create an orchestrator with a fresh executor
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self::with_executor(registry, Arc::new(AgentExecutor::new()))
    }

    /// Create an orchestrator sharing an existing executor
    pub fn with_executor(registry: Arc<AgentRegistry>, executor: Arc<AgentExecutor>) -> Self {
        Self {
            registry,
            plans: PlanExecutor::new(Arc::clone(&executor)),
            executor,
        }
    }

    /// Registry the orchestrator resolves names against
    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Executor shared by every invocation
    pub fn executor(&self) -> &Arc<AgentExecutor> {
        &self.executor
    }

    /// Execute a single registered agent
    pub async fn execute_agent(&self, name: &str, params: Params) -> Result<ExecutionResult> {
        self.execute_agent_with_cancel(name, params, &CancellationToken::new())
            .await
    }

    /// Execute a single registered agent under `cancel`
    pub async fn execute_agent_with_cancel(
        &self,
        name: &str,
        params: Params,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let agent = self
            .registry
            .get(name)
            .ok_or_else(|| OrchestrationError::UnknownAgent { name: name.to_string() })?;

        Ok(self.executor.execute_with_cancel(agent, params, cancel).await)
    }

    /// Execute a plan
    pub async fn run_plan(&self, plan: ExecutionPlan) -> Result<PlanResult> {
        self.run_plan_with_cancel(plan, &CancellationToken::new()).await
    }

    /// Execute a plan under `cancel`.
    ///
    /// Cancelling stops new admissions and interrupts timers and retry
    /// delays; entries that never started are reported as skipped.
    pub async fn run_plan_with_cancel(
        &self,
        plan: ExecutionPlan,
        cancel: &CancellationToken,
    ) -> Result<PlanResult> {
        let (entries, graph) = self.prepare(&plan)?;

        let plan_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            %plan_id,
            mode = %plan.mode,
            agents = entries.len(),
            max_concurrency = plan.max_concurrency,
            stop_on_error = plan.stop_on_error,
            "starting plan"
        );

        let results = match graph {
            None => {
                self.plans
                    .run_sequential(entries, plan.stop_on_error, cancel)
                    .await
            }
            Some(graph) => {
                self.plans
                    .run_pooled(entries, graph, plan.max_concurrency, plan.stop_on_error, cancel)
                    .await
            }
        };

        let result = PlanResult::from_results(
            plan_id,
            plan.mode,
            started_at,
            start.elapsed().as_secs_f64(),
            results,
        );

        info!(
            plan_id = %result.plan_id,
            status = %result.status,
            succeeded = result.succeeded_count,
            failed = result.failed_count,
            skipped = result.skipped_count,
            duration_s = result.total_duration_seconds,
            "plan finished"
        );

        Ok(result)
    }

    /// Resolve and check a plan; nothing runs if this fails.
    ///
    /// Returns the entries in plan order and, for pooled modes, the graph
    /// that governs admission.
    fn prepare(&self, plan: &ExecutionPlan) -> Result<(Vec<PlanEntry>, Option<DependencyGraph>)> {
        let mut entries = Vec::with_capacity(plan.agent_names.len());
        for name in &plan.agent_names {
            let agent = self.registry.get(name).ok_or_else(|| {
                warn!(agent = %name, "plan references unknown agent");
                OrchestrationError::UnknownAgent { name: name.clone() }
            })?;
            entries.push(PlanEntry {
                name: name.clone(),
                params: plan.params_for(name),
                agent,
            });
        }

        plan.validate()
            .map_err(|reason| OrchestrationError::InvalidPlan { reason })?;

        let graph = match plan.mode {
            ExecutionMode::Sequential => None,
            ExecutionMode::Parallel => Some(DependencyGraph::independent(plan.agent_names.clone())),
            ExecutionMode::Dag => {
                let declared: Vec<(String, Vec<String>)> = entries
                    .iter()
                    .map(|e| (e.name.clone(), e.agent.metadata().dependencies.clone()))
                    .collect();
                let graph = DependencyGraph::build(&declared)?;
                DagValidator::new().validate(&graph)?;
                Some(graph)
            }
        };

        Ok((entries, graph))
    }
}

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

/// Orchestration errors
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// A plan or request named an agent the registry does not hold
    #[error("Agent not found: {name}")]
    UnknownAgent {
        /// The unresolved name
        name: String,
    },

    /// A dag plan's dependencies loop back on themselves
    #[error("Cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency {
        /// Names along the cycle, the first repeated at the end
        cycle: Vec<String>,
    },

    /// Plan settings or entries that cannot run
    #[error("Invalid plan: {reason}")]
    InvalidPlan {
        /// What was wrong
        reason: String,
    },
}
