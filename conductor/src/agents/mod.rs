//! Agent Contract and Catalog
//!
//! This module defines what the engine requires from every unit of work it runs,
//! and the catalog those units are registered into at startup.
//!
//! # Architecture
//!
//! - Agents are trait objects shared as `Arc<dyn Agent>`; the registry, the
//!   executor and the orchestrator only ever hold shared handles
//! - Each agent owns an immutable [`AgentMetadata`] describing its name,
//!   category, dependencies and timeout/retry policy
//! - `validate` is pure and synchronous, `execute` is async and may fail
//! - `initialize` / `cleanup` are optional lifecycle hooks driven by the executor
//!
//! # Built-in Agents
//!
//! - `EchoAgent` - returns its parameters unchanged
//! - `DelayAgent` - sleeps for a requested number of milliseconds
//! - `WordCountAgent` - counts words, lines and characters of a text

use async_trait::async_trait;
use serde_json::Value;

pub mod metadata;
pub mod registry;
pub mod builtin;

pub use metadata::{AgentMetadata, AgentStatus};
pub use registry::{AgentManifest, AgentRegistry, RegistryError, RegistryStats};
pub use builtin::{DelayAgent, EchoAgent, WordCountAgent};

/// Parameters handed to an agent: an opaque JSON document
pub type Params = Value;

/// Core Agent trait that every executable unit implements
///
/// Only `metadata`, `validate` and `execute` are required. The executor calls
/// `initialize` before every attempt and `cleanup` once per invocation.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Descriptive record for this agent
    fn metadata(&self) -> &AgentMetadata;

    /// Unique name (registry key)
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Check whether `params` are acceptable. Must not panic or have side effects.
    fn validate(&self, params: &Params) -> bool;

    /// Run the agent
    async fn execute(&self, params: Params) -> Result<Value>;

    /// Pre-execution hook, called before each attempt
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Post-execution hook, called once per invocation on every exit path
    async fn cleanup(&self) {}
}

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent-specific errors
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The agent body reported a failure
    #[error("Task execution failed: {0}")]
    ExecutionFailed(String),

    /// `initialize` could not prepare the agent
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Parameters were unusable once inside the body
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// JSON conversion failed
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    /// Shorthand for [`AgentError::ExecutionFailed`]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed(message.into())
    }
}
