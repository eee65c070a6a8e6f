//! Execution Plan - Multi-Agent Composition
//!
//! An [`ExecutionPlan`] names the agents to run, how to run them (sequential,
//! parallel or DAG), the concurrency cap and the failure policy. A
//! [`PlanResult`] reports one [`ExecutionResult`] per named agent, in plan
//! order, whatever order they completed in.

use std::collections::HashMap;
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::Params;
use crate::runtime::{ExecutionResult, ExecutionStatus};

/// Concurrency used when a plan does not specify one
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

// ============================================================================
// Execution Mode
// ============================================================================

/// Strategy used to run a plan's agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One after another, in list order
    #[default]
    Sequential,

    /// Bounded worker pool, admission in list order
    Parallel,

    /// Bounded worker pool, ordered by declared dependencies
    Dag,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::Dag => "dag",
        };
        write!(f, "{}", label)
    }
}

// ============================================================================
// Execution Plan
// ============================================================================

/// Blueprint for a multi-agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Agents to run, referencing registry names
    pub agent_names: Vec<String>,

    /// Execution strategy
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Worker pool size (parallel and dag modes)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Stop admitting agents after the first non-succeeded result
    #[serde(default)]
    pub stop_on_error: bool,

    /// Shared input for every agent
    #[serde(default)]
    pub params: Params,

    /// Per-agent input, merged over `params`
    #[serde(default)]
    pub overrides: HashMap<String, Params>,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl ExecutionPlan {
    /// Create a plan with the given mode and default settings
    pub fn new(agent_names: Vec<String>, mode: ExecutionMode) -> Self {
        Self {
            agent_names,
            mode,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            stop_on_error: false,
            params: Value::Object(Default::default()),
            overrides: HashMap::new(),
        }
    }

    /// Sequential plan
    pub fn sequential(agent_names: Vec<String>) -> Self {
        Self::new(agent_names, ExecutionMode::Sequential)
    }

    /// Parallel plan
    pub fn parallel(agent_names: Vec<String>) -> Self {
        Self::new(agent_names, ExecutionMode::Parallel)
    }

    /// Dependency-ordered plan
    pub fn dag(agent_names: Vec<String>) -> Self {
        Self::new(agent_names, ExecutionMode::Dag)
    }

    /// Set the worker pool size
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the failure policy
    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    /// Set the shared parameters
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Override the parameters of one agent
    pub fn with_override(mut self, agent_name: impl Into<String>, params: Params) -> Self {
        self.overrides.insert(agent_name.into(), params);
        self
    }

    /// Parameters for `agent_name`.
    ///
    /// When both the shared params and the override are JSON objects the
    /// override's keys win; otherwise the override replaces the shared params.
    pub fn params_for(&self, agent_name: &str) -> Params {
        match (self.overrides.get(agent_name), &self.params) {
            (None, shared) => shared.clone(),
            (Some(Value::Object(extra)), Value::Object(base)) => {
                let mut merged = base.clone();
                for (key, value) in extra {
                    merged.insert(key.clone(), value.clone());
                }
                Value::Object(merged)
            }
            (Some(replacement), _) => replacement.clone(),
        }
    }

    /// Validate plan-level settings that do not need the registry
    pub fn validate(&self) -> Result<(), String> {
        if self.mode != ExecutionMode::Sequential && self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Plan Result
// ============================================================================

/// Aggregate status of a plan run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Every agent succeeded
    Succeeded,

    /// Some agents succeeded, some did not
    Partial,

    /// No agent succeeded
    Failed,
}

impl PlanStatus {
    /// Derive the plan status from per-agent results
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();

        if succeeded == results.len() {
            PlanStatus::Succeeded
        } else if succeeded == 0 {
            PlanStatus::Failed
        } else {
            PlanStatus::Partial
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlanStatus::Succeeded => "succeeded",
            PlanStatus::Partial => "partial",
            PlanStatus::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Outcome of a plan run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    /// Unique plan run identifier
    pub plan_id: String,

    /// Strategy that was used
    pub mode: ExecutionMode,

    /// Aggregate status
    pub status: PlanStatus,

    /// Results with status `succeeded`
    pub succeeded_count: usize,

    /// Results with status `failed`, `timeout` or `invalid_params`
    pub failed_count: usize,

    /// Results with status `skipped`
    pub skipped_count: usize,

    /// Wall clock of the whole plan
    pub total_duration_seconds: f64,

    /// When the plan started
    pub started_at: DateTime<Utc>,

    /// One result per plan entry, in plan order
    pub results: Vec<ExecutionResult>,
}

impl PlanResult {
    /// Assemble a plan result from ordered per-agent results
    pub fn from_results(
        plan_id: String,
        mode: ExecutionMode,
        started_at: DateTime<Utc>,
        total_duration_seconds: f64,
        results: Vec<ExecutionResult>,
    ) -> Self {
        let count = |pred: fn(&ExecutionStatus) -> bool| {
            results.iter().filter(|r| pred(&r.status)).count()
        };

        Self {
            plan_id,
            mode,
            status: PlanStatus::from_results(&results),
            succeeded_count: count(ExecutionStatus::is_success),
            failed_count: count(ExecutionStatus::is_failure),
            skipped_count: count(|s| *s == ExecutionStatus::Skipped),
            total_duration_seconds,
            started_at,
            results,
        }
    }

    /// Statuses in plan order
    pub fn statuses(&self) -> Vec<ExecutionStatus> {
        self.results.iter().map(|r| r.status).collect()
    }
}
