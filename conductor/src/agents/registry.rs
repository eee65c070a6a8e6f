//! Agent Registry - Catalog of Executable Agents
//!
//! The registry is built once at process start and then shared read-only
//! (`Arc<AgentRegistry>`) with the orchestrator and the API layer. Lookups
//! never lock: mutation requires `&mut self` and is expected only during
//! startup.
//!
//! # Features
//!
//! - Exact-name lookup
//! - Category listing in insertion order
//! - Ranked free-text search over name, description and tags
//! - On-demand statistics and metadata manifest export

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Agent, AgentMetadata};

// ============================================================================
// Errors
// ============================================================================

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registration errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// An agent with this name is already registered
    #[error("Duplicate agent name: `{0}`")]
    DuplicateName(String),

    /// Empty name or category
    #[error("Invalid agent metadata: {0}")]
    InvalidMetadata(String),
}

// ============================================================================
// Snapshots
// ============================================================================

/// Aggregated registry statistics, computed on demand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Number of registered agents
    pub total_agents: usize,

    /// Number of distinct categories
    pub total_categories: usize,

    /// Agent count per category
    pub per_category_counts: BTreeMap<String, usize>,
}

/// Metadata dump for external tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentManifest {
    /// Engine version that produced the manifest
    pub version: String,

    /// Generation timestamp
    pub generated_at: DateTime<Utc>,

    /// Metadata of every agent, insertion order
    pub agents: Vec<AgentMetadata>,

    /// Distinct categories, order of first appearance
    pub categories: Vec<String>,
}

// ============================================================================
// Agent Registry
// ============================================================================

/// Catalog of registered agents
#[derive(Default)]
pub struct AgentRegistry {
    /// Agents in registration order
    agents: Vec<Arc<dyn Agent>>,

    /// Name index into `agents`
    index: HashMap<String, usize>,
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in agents
    pub fn with_builtin_agents() -> Result<Self> {
        let mut registry = Self::new();
        super::builtin::register_builtin_agents(&mut registry)?;
        Ok(registry)
    }

    /// Register an agent. Fails if the name is already taken.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Result<()> {
        let metadata = agent.metadata();
        metadata.validate().map_err(RegistryError::InvalidMetadata)?;

        let name = metadata.name.clone();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }

        debug!(name = %name, category = %metadata.category, "registered agent");
        self.index.insert(name, self.agents.len());
        self.agents.push(agent);
        Ok(())
    }

    /// Register several agents, stopping at the first error
    pub fn register_all<I>(&mut self, agents: I) -> Result<()>
    where
        I: IntoIterator<Item = Arc<dyn Agent>>,
    {
        for agent in agents {
            self.register(agent)?;
        }
        info!(total = self.len(), "agent registry populated");
        Ok(())
    }

    /// Exact-name lookup
    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.index.get(name).map(|&i| Arc::clone(&self.agents[i]))
    }

    /// Whether an agent with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of registered agents
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Registered names, insertion order
    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    /// All agents, or only those in `category`, insertion order
    pub fn list_agents(&self, category: Option<&str>) -> Vec<Arc<dyn Agent>> {
        self.agents
            .iter()
            .filter(|a| category.is_none_or(|c| a.metadata().category == c))
            .cloned()
            .collect()
    }

    /// Distinct categories, order of first appearance
    pub fn list_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for agent in &self.agents {
            let category = &agent.metadata().category;
            if !categories.contains(category) {
                categories.push(category.clone());
            }
        }
        categories
    }

    /// Case-insensitive search over name, description and tags.
    ///
    /// Results are ranked by the number of matching fields; ties keep
    /// insertion order. Agents matching no field are left out.
    pub fn search(&self, query: &str) -> Vec<Arc<dyn Agent>> {
        let needle = query.to_lowercase();

        let mut scored: Vec<(usize, &Arc<dyn Agent>)> = self
            .agents
            .iter()
            .map(|agent| (match_score(agent.metadata(), &needle), agent))
            .filter(|(score, _)| *score > 0)
            .collect();

        // stable: equal scores keep registration order
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored.into_iter().map(|(_, agent)| Arc::clone(agent)).collect()
    }

    /// Aggregate statistics over the current registration set
    pub fn stats(&self) -> RegistryStats {
        let mut per_category_counts = BTreeMap::new();
        for agent in &self.agents {
            *per_category_counts
                .entry(agent.metadata().category.clone())
                .or_insert(0) += 1;
        }

        RegistryStats {
            total_agents: self.agents.len(),
            total_categories: per_category_counts.len(),
            per_category_counts,
        }
    }

    /// Export every agent's metadata plus the category list
    pub fn export_manifest(&self) -> AgentManifest {
        AgentManifest {
            version: crate::VERSION.to_string(),
            generated_at: Utc::now(),
            agents: self.agents.iter().map(|a| a.metadata().clone()).collect(),
            categories: self.list_categories(),
        }
    }
}

/// Number of fields (name, description, tag set) containing `needle`
fn match_score(metadata: &AgentMetadata, needle: &str) -> usize {
    let name = metadata.name.to_lowercase().contains(needle);
    let description = metadata.description.to_lowercase().contains(needle);
    let tags = metadata
        .tags
        .iter()
        .any(|tag| tag.to_lowercase().contains(needle));

    [name, description, tags].into_iter().filter(|m| *m).count()
}
