//! Agent Metadata
//!
//! Descriptive record attached to every agent: identity, classification,
//! declared dependencies and the timeout/retry policy the executor enforces.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Default per-attempt timeout applied by [`AgentMetadata::new`]
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// Default delay between attempts applied by [`AgentMetadata::new`]
pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 1;

/// Lifecycle status of an agent definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Supported and recommended
    #[default]
    Active,
    /// Still runnable, scheduled for removal
    Deprecated,
    /// Runnable, behaviour may change
    Experimental,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AgentStatus::Active => "active",
            AgentStatus::Deprecated => "deprecated",
            AgentStatus::Experimental => "experimental",
        };
        write!(f, "{}", label)
    }
}

/// Descriptive record of an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Globally unique name, used as the registry key
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Category used for listing and statistics
    pub category: String,

    /// Semantic version string
    #[serde(default = "default_version")]
    pub version: String,

    /// Author or owning team
    #[serde(default)]
    pub author: String,

    /// Free-form tags, matched by search
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Names of agents that must finish first (DAG mode only)
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Per-attempt timeout; 0 disables the timer
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Additional attempts after the first failure
    #[serde(default)]
    pub retry_count: u32,

    /// Delay between attempts
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,

    /// Lifecycle status
    #[serde(default)]
    pub status: AgentStatus,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_retry_delay() -> u64 {
    DEFAULT_RETRY_DELAY_SECONDS
}

impl AgentMetadata {
    /// Create metadata with default policy: 300s timeout, no retries
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: category.into(),
            version: default_version(),
            author: String::new(),
            tags: BTreeSet::new(),
            dependencies: Vec::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            retry_count: 0,
            retry_delay_seconds: DEFAULT_RETRY_DELAY_SECONDS,
            status: AgentStatus::Active,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the author
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Add tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Declare dependencies, in order
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-attempt timeout (0 = unbounded)
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry_count: u32, retry_delay_seconds: u64) -> Self {
        self.retry_count = retry_count;
        self.retry_delay_seconds = retry_delay_seconds;
        self
    }

    /// Set the lifecycle status
    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    /// Per-attempt timeout, `None` when unbounded
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    /// Delay between attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    /// Maximum number of attempts an invocation may make
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Validate metadata fields
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Agent name must not be empty".to_string());
        }

        if self.category.trim().is_empty() {
            return Err(format!("Agent `{}` has an empty category", self.name));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let meta = AgentMetadata::new("echo", "utility");
        assert_eq!(meta.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(meta.retry_count, 0);
        assert_eq!(meta.max_attempts(), 1);
        assert_eq!(meta.status, AgentStatus::Active);
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_is_unbounded() {
        let meta = AgentMetadata::new("slow", "utility").with_timeout_seconds(0);
        assert!(meta.timeout().is_none());

        let meta = meta.with_timeout_seconds(2);
        assert_eq!(meta.timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_self_dependency_left_to_plan_validation() {
        let meta = AgentMetadata::new("loop", "utility").with_dependencies(["loop"]);
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert!(AgentMetadata::new("", "utility").validate().is_err());
        assert!(AgentMetadata::new("x", "  ").validate().is_err());
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let meta: AgentMetadata =
            serde_json::from_str(r#"{"name": "a", "category": "c", "status": "experimental"}"#)
                .unwrap();

        assert_eq!(meta.version, "0.1.0");
        assert_eq!(meta.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(meta.retry_delay_seconds, DEFAULT_RETRY_DELAY_SECONDS);
        assert_eq!(meta.status, AgentStatus::Experimental);
        assert!(meta.tags.is_empty());
    }
}
