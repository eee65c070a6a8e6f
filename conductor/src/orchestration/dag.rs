//! DAG validation and analysis

use std::collections::{HashMap, HashSet};

use super::{OrchestrationError, Result};

/// Dependency graph over the entries of a plan.
///
/// Nodes are plan positions. Edges come from each agent's declared
/// dependencies, restricted to agents present in the same plan.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    names: Vec<String>,
    /// `dependencies[i]`: positions `i` waits for, in declaration order
    dependencies: Vec<Vec<usize>>,
    /// `dependents[i]`: positions waiting for `i`, in plan order
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Graph with no edges; every node is immediately eligible
    pub fn independent(names: Vec<String>) -> Self {
        let n = names.len();
        Self {
            names,
            dependencies: vec![Vec::new(); n],
            dependents: vec![Vec::new(); n],
        }
    }

    /// Build the graph from `(name, declared dependencies)` pairs in plan order.
    ///
    /// Names must be unique. Dependencies on names outside the plan are ignored.
    pub fn build(entries: &[(String, Vec<String>)]) -> Result<Self> {
        let mut position = HashMap::with_capacity(entries.len());
        for (i, (name, _)) in entries.iter().enumerate() {
            if position.insert(name.as_str(), i).is_some() {
                return Err(OrchestrationError::InvalidPlan {
                    reason: format!("agent `{}` appears more than once in a dag plan", name),
                });
            }
        }

        let mut graph = Self::independent(entries.iter().map(|(n, _)| n.clone()).collect());

        for (i, (_, declared)) in entries.iter().enumerate() {
            let mut seen = HashSet::new();
            for dep in declared {
                if let Some(&d) = position.get(dep.as_str()) {
                    if seen.insert(d) {
                        graph.dependencies[i].push(d);
                        graph.dependents[d].push(i);
                    }
                }
            }
        }

        for dependents in &mut graph.dependents {
            dependents.sort_unstable();
        }

        Ok(graph)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name at position `i`
    pub fn name(&self, i: usize) -> &str {
        &self.names[i]
    }

    /// Positions that `i` depends on
    pub fn dependencies(&self, i: usize) -> &[usize] {
        &self.dependencies[i]
    }

    /// Positions that depend on `i`
    pub fn dependents(&self, i: usize) -> &[usize] {
        &self.dependents[i]
    }

    /// All direct and transitive dependents of `i`, ascending
    pub fn transitive_dependents(&self, i: usize) -> Vec<usize> {
        let mut seen = vec![false; self.len()];
        let mut stack = self.dependents[i].clone();
        let mut out = Vec::new();

        while let Some(node) = stack.pop() {
            if seen[node] {
                continue;
            }
            seen[node] = true;
            out.push(node);
            stack.extend(self.dependents[node].iter().copied());
        }

        out.sort_unstable();
        out
    }

    /// Find a dependency cycle, returned as the names along it with the first
    /// name repeated at the end (`a -> b -> a`)
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks = vec![Mark::Unvisited; self.len()];
        let mut path = Vec::new();

        for start in 0..self.len() {
            if marks[start] == Mark::Unvisited {
                if let Some(cycle) = self.visit(start, &mut marks, &mut path) {
                    return Some(cycle.into_iter().map(|i| self.names[i].clone()).collect());
                }
            }
        }

        None
    }

    fn visit(&self, node: usize, marks: &mut [Mark], path: &mut Vec<usize>) -> Option<Vec<usize>> {
        marks[node] = Mark::OnPath;
        path.push(node);

        for &dep in &self.dependencies[node] {
            match marks[dep] {
                Mark::Unvisited => {
                    if let Some(cycle) = self.visit(dep, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::OnPath => {
                    let from = path.iter().position(|&p| p == dep).unwrap_or(0);
                    let mut cycle = path[from..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                Mark::Done => {}
            }
        }

        path.pop();
        marks[node] = Mark::Done;
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Structural checks run before a dag plan starts
#[derive(Debug, Default)]
pub struct DagValidator;

impl DagValidator {
    /// Create a validator
    pub fn new() -> Self {
        Self
    }

    /// Reject graphs that contain a cycle
    pub fn validate(&self, graph: &DependencyGraph) -> Result<()> {
        if let Some(cycle) = graph.find_cycle() {
            return Err(OrchestrationError::CyclicDependency { cycle });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(name: &str, deps: &[&str]) -> (String, Vec<String>) {
        (name.to_string(), deps.iter().map(|d| d.to_string()).collect())
    }

    #[test]
    fn test_edges_restricted_to_plan() {
        let graph = DependencyGraph::build(&[
            entry("a", &["outside"]),
            entry("b", &["a"]),
            entry("c", &["a", "b", "a"]),
        ])
        .unwrap();

        assert!(graph.dependencies(0).is_empty());
        assert_eq!(graph.dependencies(2), &[0, 1]);
        assert_eq!(graph.dependents(0), &[1, 2]);
        assert_eq!(graph.transitive_dependents(0), vec![1, 2]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = DependencyGraph::build(&[entry("a", &[]), entry("a", &[])]).unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidPlan { .. }));
    }

    #[test]
    fn test_two_node_cycle() {
        let graph = DependencyGraph::build(&[entry("a", &["b"]), entry("b", &["a"])]).unwrap();
        assert_eq!(graph.find_cycle(), Some(vec!["a".into(), "b".into(), "a".into()]));

        let err = DagValidator::new().validate(&graph).unwrap_err();
        assert!(matches!(err, OrchestrationError::CyclicDependency { .. }));
    }

    #[test]
    fn test_cycle_not_through_first_node() {
        let graph = DependencyGraph::build(&[
            entry("root", &[]),
            entry("x", &["root", "z"]),
            entry("y", &["x"]),
            entry("z", &["y"]),
        ])
        .unwrap();

        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert!(!cycle.contains(&"root".to_string()));
    }

    #[test]
    fn test_diamond_is_acyclic() {
        let graph = DependencyGraph::build(&[
            entry("a", &[]),
            entry("b", &["a"]),
            entry("c", &["a"]),
            entry("d", &["b", "c"]),
        ])
        .unwrap();

        assert!(DagValidator::new().validate(&graph).is_ok());
    }

    proptest! {
        #[test]
        fn prop_forward_edges_never_cycle(edges in prop::collection::vec((0usize..12, 0usize..12), 0..40)) {
            let names: Vec<String> = (0..12).map(|i| format!("n{}", i)).collect();
            let mut entries: Vec<(String, Vec<String>)> =
                names.iter().map(|n| (n.clone(), Vec::new())).collect();

            // only edges from a later node to an earlier one
            for (a, b) in edges {
                if a > b {
                    entries[a].1.push(names[b].clone());
                }
            }

            let graph = DependencyGraph::build(&entries).unwrap();
            prop_assert!(graph.find_cycle().is_none());
        }

        #[test]
        fn prop_back_edge_on_chain_cycles(len in 2usize..10, back_from in 0usize..10) {
            let back_from = back_from % len;
            let names: Vec<String> = (0..len).map(|i| format!("n{}", i)).collect();
            let mut entries: Vec<(String, Vec<String>)> = names
                .iter()
                .enumerate()
                .map(|(i, n)| (n.clone(), if i > 0 { vec![names[i - 1].clone()] } else { Vec::new() }))
                .collect();

            // n0 waits for a node that (transitively) waits for n0
            entries[0].1.push(names[back_from.max(1)].clone());

            let graph = DependencyGraph::build(&entries).unwrap();
            prop_assert!(graph.find_cycle().is_some());
        }
    }
}
