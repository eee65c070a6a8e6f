//! API routes

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ApiError;
use crate::agents::{Agent, AgentManifest, AgentMetadata, Params, RegistryStats};
use crate::commands::config::ConductorConfig;
use crate::orchestration::{ExecutionMode, ExecutionPlan, Orchestrator, PlanResult};
use crate::runtime::{ExecutionResult, ExecutorStatistics};

/// Application state shared across routes
#[derive(Clone)]
pub struct AppState {
    /// Registry and executor behind every route
    pub orchestrator: Arc<Orchestrator>,
    /// Loaded configuration (concurrency defaults and limits)
    pub config: Arc<ConductorConfig>,
    /// Cancelled on server shutdown; every request runs under a child token
    pub shutdown: CancellationToken,
    /// Server start, for uptime
    pub started_at: Instant,
}

impl AppState {
    /// State for a freshly started server
    pub fn new(orchestrator: Arc<Orchestrator>, config: Arc<ConductorConfig>) -> Self {
        Self {
            orchestrator,
            config,
            shutdown: CancellationToken::new(),
            started_at: Instant::now(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the server answers
    pub status: String,
    /// Crate version
    pub version: String,
    /// Seconds since the server started
    pub uptime_seconds: u64,
    /// Registry size
    pub registered_agents: usize,
    /// Executor totals so far
    pub executor: ExecutorStatistics,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
}

#[derive(Debug, Deserialize)]
struct ExecuteAgentRequest {
    #[serde(default)]
    params: Params,
}

/// Plan submission; `max_concurrency` falls back to the configured default
#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    /// Agents to run, in plan order
    pub agent_names: Vec<String>,
    /// Defaults to sequential
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Worker pool size for parallel and DAG plans
    pub max_concurrency: Option<usize>,
    /// Stop admitting agents after the first non-success
    #[serde(default)]
    pub stop_on_error: bool,
    /// Parameters shared by every agent
    #[serde(default)]
    pub params: Params,
    /// Per-agent parameters merged over `params`
    #[serde(default)]
    pub overrides: HashMap<String, Params>,
}

impl PlanRequest {
    /// Build the plan, applying configured concurrency defaults and limits
    pub fn into_plan(self, config: &ConductorConfig) -> ExecutionPlan {
        let max_concurrency = config.execution.effective_concurrency(self.max_concurrency);
        let mut plan = ExecutionPlan::new(self.agent_names, self.mode)
            .with_max_concurrency(max_concurrency)
            .with_stop_on_error(self.stop_on_error);
        if !self.params.is_null() {
            plan = plan.with_params(self.params);
        }
        plan.overrides = self.overrides;
        plan
    }
}

/// Create all API routes
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))

        // Registry queries
        .route("/agents", get(list_agents))
        .route("/agents/categories", get(list_categories))
        .route("/agents/stats", get(registry_stats))
        .route("/agents/search", get(search_agents))
        .route("/agents/manifest", get(export_manifest))
        .route("/agents/{name}", get(get_agent))

        // Execution
        .route("/agents/{name}/execute", post(execute_agent))
        .route("/plans/execute", post(execute_plan))

        .with_state(state)
}

fn metadata_of(agents: Vec<Arc<dyn Agent>>) -> Vec<AgentMetadata> {
    agents.iter().map(|a| a.metadata().clone()).collect()
}

/// Health check
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        registered_agents: state.orchestrator.registry().len(),
        executor: state.orchestrator.executor().statistics().await,
    })
}

/// List agents, optionally within one category
async fn list_agents(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<AgentMetadata>>, ApiError> {
    let Query(query) = query?;
    let agents = state
        .orchestrator
        .registry()
        .list_agents(query.category.as_deref());
    Ok(Json(metadata_of(agents)))
}

async fn list_categories(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.orchestrator.registry().list_categories())
}

async fn registry_stats(State(state): State<AppState>) -> Json<RegistryStats> {
    Json(state.orchestrator.registry().stats())
}

async fn search_agents(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<AgentMetadata>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(metadata_of(state.orchestrator.registry().search(&query.q))))
}

async fn export_manifest(State(state): State<AppState>) -> Json<AgentManifest> {
    Json(state.orchestrator.registry().export_manifest())
}

/// Get one agent's metadata
async fn get_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AgentMetadata>, ApiError> {
    state
        .orchestrator
        .registry()
        .get(&name)
        .map(|agent| Json(agent.metadata().clone()))
        .ok_or_else(|| ApiError::NotFound(format!("Agent not found: {}", name)))
}

/// Execute one agent.
///
/// The invocation is cancelled if the client goes away before it finishes.
async fn execute_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<ExecuteAgentRequest>, JsonRejection>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let Json(req) = body?;
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    debug!(agent = %name, "execute request");
    let result = state
        .orchestrator
        .execute_agent_with_cancel(&name, req.params, &cancel)
        .await?;
    Ok(Json(result))
}

/// Execute a plan.
///
/// The plan is cancelled if the client goes away before it finishes.
async fn execute_plan(
    State(state): State<AppState>,
    body: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<PlanResult>, ApiError> {
    let Json(req) = body?;
    let plan = req.into_plan(&state.config);
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    debug!(mode = %plan.mode, agents = plan.agent_names.len(), "plan request");
    let result = state.orchestrator.run_plan_with_cancel(plan, &cancel).await?;
    Ok(Json(result))
}
