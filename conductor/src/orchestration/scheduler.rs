//! Admission scheduling for pooled plans
//!
//! Tracks which plan entries are eligible to start, which are running and
//! which have reached a terminal state. Parallel plans use a graph without
//! edges, so every entry is eligible from the start.

use std::collections::BTreeSet;

use super::dag::DependencyGraph;

/// Per-entry scheduling state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Waiting on at least one dependency
    Waiting,
    /// All dependencies succeeded; not yet admitted
    Ready,
    /// Admitted to the worker pool
    Running,
    /// Finished, successfully or not
    Done,
    /// Will never run
    Skipped,
}

impl NodeState {
    /// Whether the entry has a final result
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }
}

/// Ready-set scheduler over a [`DependencyGraph`]
#[derive(Debug)]
pub struct TaskScheduler {
    graph: DependencyGraph,
    states: Vec<NodeState>,
    /// Unsatisfied dependency count per entry
    remaining: Vec<usize>,
    /// Eligible entries ordered by plan position
    ready: BTreeSet<usize>,
}

impl TaskScheduler {
    /// Entries without dependencies start out ready
    pub fn new(graph: DependencyGraph) -> Self {
        let remaining: Vec<usize> = (0..graph.len()).map(|i| graph.dependencies(i).len()).collect();
        let ready = remaining
            .iter()
            .enumerate()
            .filter(|&(_, &n)| n == 0)
            .map(|(i, _)| i)
            .collect::<BTreeSet<_>>();
        let states = remaining
            .iter()
            .map(|&n| if n == 0 { NodeState::Ready } else { NodeState::Waiting })
            .collect();

        Self {
            graph,
            states,
            remaining,
            ready,
        }
    }

    /// Current state of entry `i`
    pub fn state(&self, i: usize) -> NodeState {
        self.states[i]
    }

    /// Whether any entry is waiting to be admitted
    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Take the eligible entry earliest in the plan and mark it running
    pub fn next_ready(&mut self) -> Option<usize> {
        let next = self.ready.pop_first()?;
        self.states[next] = NodeState::Running;
        Some(next)
    }

    /// Record a finished entry.
    ///
    /// On success, dependents whose last dependency this was become ready.
    /// Otherwise every transitive dependent is skipped; those positions are
    /// returned in ascending order.
    pub fn complete(&mut self, i: usize, succeeded: bool) -> Vec<usize> {
        self.states[i] = NodeState::Done;

        if succeeded {
            for &dependent in self.graph.dependents(i) {
                self.remaining[dependent] -= 1;
                if self.remaining[dependent] == 0 && self.states[dependent] == NodeState::Waiting {
                    self.states[dependent] = NodeState::Ready;
                    self.ready.insert(dependent);
                }
            }
            return Vec::new();
        }

        let mut skipped = Vec::new();
        for dependent in self.graph.transitive_dependents(i) {
            if !self.states[dependent].is_terminal() {
                self.states[dependent] = NodeState::Skipped;
                self.ready.remove(&dependent);
                skipped.push(dependent);
            }
        }
        skipped
    }

    /// Skip every entry that has not been admitted, ascending
    pub fn skip_unstarted(&mut self) -> Vec<usize> {
        self.ready.clear();
        let mut skipped = Vec::new();
        for (i, state) in self.states.iter_mut().enumerate() {
            if matches!(state, NodeState::Waiting | NodeState::Ready) {
                *state = NodeState::Skipped;
                skipped.push(i);
            }
        }
        skipped
    }

    /// Whether every entry is terminal
    pub fn is_finished(&self) -> bool {
        self.states.iter().all(NodeState::is_terminal)
    }
}
