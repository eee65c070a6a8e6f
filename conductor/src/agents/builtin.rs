//! Built-in Agents
//!
//! Small general-purpose agents registered by [`AgentRegistry::with_builtin_agents`].
//! They give the CLI and the HTTP server something runnable out of the box and
//! double as reference implementations of the [`Agent`] contract.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{Agent, AgentError, AgentMetadata, AgentRegistry, Params, Result};

/// Register every built-in agent into `registry`
pub fn register_builtin_agents(registry: &mut AgentRegistry) -> super::registry::Result<()> {
    registry.register_all([
        Arc::new(EchoAgent::new()) as Arc<dyn Agent>,
        Arc::new(DelayAgent::new()),
        Arc::new(WordCountAgent::new()),
    ])
}

// ============================================================================
// Echo
// ============================================================================

/// Returns its parameters unchanged
pub struct EchoAgent {
    metadata: AgentMetadata,
}

impl EchoAgent {
    /// Create the agent
    pub fn new() -> Self {
        Self {
            metadata: AgentMetadata::new("echo", "utility")
                .with_description("Returns the parameters it was given")
                .with_author("conductor")
                .with_tags(["debug", "passthrough"])
                .with_timeout_seconds(5),
        }
    }
}

impl Default for EchoAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn metadata(&self) -> &AgentMetadata {
        &self.metadata
    }

    fn validate(&self, _params: &Params) -> bool {
        true
    }

    async fn execute(&self, params: Params) -> Result<Value> {
        Ok(json!({ "echo": params }))
    }
}

// ============================================================================
// Delay
// ============================================================================

/// Sleeps for `ms` milliseconds, then reports how long it slept
pub struct DelayAgent {
    metadata: AgentMetadata,
}

impl DelayAgent {
    /// Create the agent
    pub fn new() -> Self {
        Self {
            metadata: AgentMetadata::new("delay", "utility")
                .with_description("Waits for the requested number of milliseconds")
                .with_author("conductor")
                .with_tags(["debug", "timing"])
                .with_timeout_seconds(60),
        }
    }
}

impl Default for DelayAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for DelayAgent {
    fn metadata(&self) -> &AgentMetadata {
        &self.metadata
    }

    fn validate(&self, params: &Params) -> bool {
        params.get("ms").is_some_and(Value::is_u64)
    }

    async fn execute(&self, params: Params) -> Result<Value> {
        let ms = params
            .get("ms")
            .and_then(Value::as_u64)
            .ok_or_else(|| AgentError::InvalidParams("`ms` must be a non-negative integer".into()))?;

        debug!(ms, "delay agent sleeping");
        tokio::time::sleep(Duration::from_millis(ms)).await;

        Ok(json!({ "slept_ms": ms }))
    }
}

// ============================================================================
// Word Count
// ============================================================================

/// Counts words, lines and characters of `text`
pub struct WordCountAgent {
    metadata: AgentMetadata,
}

impl WordCountAgent {
    /// Create the agent
    pub fn new() -> Self {
        Self {
            metadata: AgentMetadata::new("word_count", "text")
                .with_description("Counts words, lines and characters in a text")
                .with_author("conductor")
                .with_tags(["text", "analysis"])
                .with_timeout_seconds(10),
        }
    }
}

impl Default for WordCountAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for WordCountAgent {
    fn metadata(&self) -> &AgentMetadata {
        &self.metadata
    }

    fn validate(&self, params: &Params) -> bool {
        params.get("text").is_some_and(Value::is_string)
    }

    async fn execute(&self, params: Params) -> Result<Value> {
        let text = params
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::InvalidParams("`text` must be a string".into()))?;

        Ok(json!({
            "words": text.split_whitespace().count(),
            "lines": text.lines().count(),
            "chars": text.chars().count(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registration() {
        let registry = AgentRegistry::with_builtin_agents().unwrap();
        assert_eq!(registry.names(), vec!["echo", "delay", "word_count"]);
        assert_eq!(registry.list_categories(), vec!["utility", "text"]);
    }

    #[test]
    fn test_delay_validation() {
        let agent = DelayAgent::new();
        assert!(agent.validate(&json!({"ms": 10})));
        assert!(!agent.validate(&json!({"ms": -1})));
        assert!(!agent.validate(&json!({"ms": "10"})));
        assert!(!agent.validate(&json!({})));
    }

    #[tokio::test]
    async fn test_word_count() {
        let agent = WordCountAgent::new();
        let params = json!({"text": "one two\nthree"});
        assert!(agent.validate(&params));

        let out = agent.execute(params).await.unwrap();
        assert_eq!(out["words"], 3);
        assert_eq!(out["lines"], 2);
        assert_eq!(out["chars"], 13);
    }

    #[tokio::test]
    async fn test_echo_wraps_params() {
        let out = EchoAgent::new().execute(json!({"k": "v"})).await.unwrap();
        assert_eq!(out["echo"]["k"], "v");
    }
}
