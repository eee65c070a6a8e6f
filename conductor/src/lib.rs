//! Conductor - Agent Execution Engine
//!
//! Conductor registers executable units of work ("agents"), runs them one at a
//! time with timeout and retry discipline, and runs groups of them as
//! sequential, bounded-parallel or dependency-ordered (DAG) plans.
//!
//! # Architecture
//!
//! - `agents` - the `Agent` contract, agent metadata, the registry and a few built-in agents
//! - `runtime` - the single-agent executor (validation, hooks, timeout, retry)
//! - `orchestration` - execution plans and the orchestrator driving the executor
//! - `commands` - configuration loading and the HTTP API served by the binary
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use conductor::agents::AgentRegistry;
//! use conductor::orchestration::{ExecutionPlan, Orchestrator};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = Arc::new(AgentRegistry::with_builtin_agents()?);
//! let orchestrator = Orchestrator::new(registry);
//!
//! let plan = ExecutionPlan::parallel(vec!["echo".into(), "word_count".into()])
//!     .with_max_concurrency(2)
//!     .with_params(serde_json::json!({"text": "hello conductor"}));
//!
//! let result = orchestrator.run_plan(plan).await?;
//! println!("{:?}", result.status);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod agents;
pub mod runtime;
pub mod orchestration;
pub mod commands;

pub use agents::{Agent, AgentError, AgentMetadata, AgentRegistry};
pub use orchestration::{ExecutionMode, ExecutionPlan, Orchestrator, PlanResult, PlanStatus};
pub use runtime::{AgentExecutor, ExecutionResult, ExecutionStatus};

/// Conductor version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
