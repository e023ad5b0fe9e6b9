// src/dag/state_manager.rs

//! Failure propagation for a resolution in progress.

use std::collections::VecDeque;

use petgraph::stable_graph::NodeIndex;
use tracing::{debug, warn};

use crate::dag::Graph;
use crate::dag::node::{NodeKey, NodeState};
use crate::errors::{NodeError, NodeFailure};

/// Applies failure transitions to the graph and records them.
pub struct StateManager<'a, V> {
    graph: &'a mut Graph<V>,
    failures: &'a mut Vec<NodeFailure>,
}

impl<'a, V> StateManager<'a, V> {
    pub fn new(graph: &'a mut Graph<V>, failures: &'a mut Vec<NodeFailure>) -> Self {
        Self { graph, failures }
    }

    /// Mark `ix` as `Failed` with `error`, then short-circuit every
    /// transitive dependent that has not started.
    ///
    /// Returns the newly failed keys: `ix` first, then its dependents in
    /// breadth-first, insertion order.
    pub fn fail_node(&mut self, ix: NodeIndex, error: NodeError) -> Vec<NodeKey> {
        let node = self.graph.node_at_mut(ix);
        if node.state.is_terminal() {
            debug!(node = %node.key, "node already terminal; not failing it again");
            return Vec::new();
        }

        let key = node.key.clone();
        warn!(node = %key, error = %error, "node failed");
        node.state = NodeState::Failed;
        node.error = Some(error.clone());
        self.failures.push(NodeFailure {
            key: key.clone(),
            error: error.clone(),
        });

        let cause = NodeError::dependency_failed(&key, &error);
        let mut newly_failed = vec![key];
        newly_failed.extend(self.short_circuit_dependents(ix, &cause));
        newly_failed
    }

    fn short_circuit_dependents(&mut self, root: NodeIndex, cause: &NodeError) -> Vec<NodeKey> {
        let mut queue: VecDeque<NodeIndex> = self.graph.dependents(root).into();
        let mut newly_failed = Vec::new();

        while let Some(ix) = queue.pop_front() {
            let node = self.graph.node_at_mut(ix);
            if !node.state.is_unstarted() {
                continue;
            }

            node.state = NodeState::Failed;
            node.error = Some(cause.clone());
            debug!(
                node = %node.key,
                origin = cause.origin().unwrap_or_default(),
                "short-circuiting dependent of failed node"
            );
            self.failures.push(NodeFailure {
                key: node.key.clone(),
                error: cause.clone(),
            });
            newly_failed.push(node.key.clone());
            queue.extend(self.graph.dependents(ix));
        }

        newly_failed
    }
}
