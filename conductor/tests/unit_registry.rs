//! Unit tests for the agent registry

mod common;

use std::sync::Arc;
use proptest::prelude::*;

use common::ScriptedAgent;
use conductor::agents::{Agent, AgentMetadata, AgentRegistry, RegistryError};

fn agent(name: &str, category: &str) -> Arc<dyn Agent> {
    ScriptedAgent::new(name).category(category).build().0
}

#[test]
fn test_register_then_get() {
    let mut registry = AgentRegistry::new();
    registry.register(agent("alpha", "text")).unwrap();

    let found = registry.get("alpha").unwrap();
    assert_eq!(found.name(), "alpha");
    assert!(registry.get("beta").is_none());
    assert!(registry.contains("alpha"));
}

#[test]
fn test_duplicate_name_rejected_and_original_kept() {
    let mut registry = AgentRegistry::new();
    registry.register(agent("alpha", "text")).unwrap();

    let err = registry.register(agent("alpha", "other")).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateName(ref n) if n == "alpha"));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("alpha").unwrap().metadata().category, "text");
}

#[test]
fn test_categories_in_first_appearance_order() {
    let mut registry = AgentRegistry::new();
    for (name, category) in [("a", "zeta"), ("b", "alpha"), ("c", "zeta"), ("d", "mid")] {
        registry.register(agent(name, category)).unwrap();
    }

    assert_eq!(registry.list_categories(), vec!["zeta", "alpha", "mid"]);

    let zeta: Vec<String> = registry
        .list_agents(Some("zeta"))
        .iter()
        .map(|a| a.name().to_string())
        .collect();
    assert_eq!(zeta, vec!["a", "c"]);
    assert!(registry.list_agents(Some("missing")).is_empty());
    assert_eq!(registry.list_agents(None).len(), 4);
}

#[test]
fn test_stats() {
    let mut registry = AgentRegistry::new();
    for (name, category) in [("a", "x"), ("b", "y"), ("c", "x")] {
        registry.register(agent(name, category)).unwrap();
    }

    let stats = registry.stats();
    assert_eq!(stats.total_agents, 3);
    assert_eq!(stats.total_categories, 2);
    assert_eq!(stats.per_category_counts["x"], 2);
    assert_eq!(stats.per_category_counts["y"], 1);
}

#[test]
fn test_search_ranks_by_matching_fields() {
    struct Described(AgentMetadata);

    #[async_trait::async_trait]
    impl Agent for Described {
        fn metadata(&self) -> &AgentMetadata {
            &self.0
        }
        fn validate(&self, _params: &serde_json::Value) -> bool {
            true
        }
        async fn execute(&self, params: serde_json::Value) -> conductor::agents::Result<serde_json::Value> {
            Ok(params)
        }
    }

    let mut registry = AgentRegistry::new();
    registry
        .register(Arc::new(Described(
            AgentMetadata::new("summarizer", "text").with_description("Condenses a document"),
        )))
        .unwrap();
    registry
        .register(Arc::new(Described(
            AgentMetadata::new("parser", "text").with_tags(["Parse"]),
        )))
        .unwrap();
    registry
        .register(Arc::new(Described(
            AgentMetadata::new("parse_tree", "code")
                .with_description("Parses source into a tree")
                .with_tags(["parse-tree"]),
        )))
        .unwrap();

    let names: Vec<String> = registry
        .search("PARSE")
        .iter()
        .map(|a| a.name().to_string())
        .collect();
    // parse_tree matches three fields, parser two
    assert_eq!(names, vec!["parse_tree", "parser"]);

    assert!(registry.search("nothing-like-this").is_empty());
}

#[test]
fn test_manifest_lists_everything() {
    let registry = AgentRegistry::with_builtin_agents().unwrap();
    let manifest = registry.export_manifest();

    assert_eq!(manifest.agents.len(), registry.len());
    assert_eq!(manifest.categories, registry.list_categories());

    let json = serde_json::to_value(&manifest).unwrap();
    assert!(json["agents"].is_array());
    assert!(json["categories"].is_array());
}

proptest! {
    #[test]
    fn prop_category_listing_is_subset(categories in prop::collection::vec(0u8..4, 0..20), probe in 0u8..5) {
        let mut registry = AgentRegistry::new();
        for (i, c) in categories.iter().enumerate() {
            registry.register(agent(&format!("agent_{}", i), &format!("cat{}", c))).unwrap();
        }

        let wanted = format!("cat{}", probe);
        let listed = registry.list_agents(Some(&wanted));

        prop_assert!(listed.len() <= registry.len());
        prop_assert!(listed.iter().all(|a| a.metadata().category == wanted));
        prop_assert_eq!(listed.len(), categories.iter().filter(|&&c| c == probe).count());
    }
}
