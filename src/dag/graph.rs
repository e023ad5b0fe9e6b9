// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use tracing::debug;

use crate::dag::node::{Node, NodeKey, NodeSpec, NodeState};
use crate::errors::{GraphError, NodeError};

/// Arena of nodes keyed by [`NodeKey`].
///
/// Nodes live in a `petgraph` stable graph so handles stay valid when other
/// nodes are pruned. Edges point from a dependency to its dependent; both
/// the "depends on" and the "required by" views are read from the same
/// edge. The dependency relation is kept acyclic at all times: an edge that
/// would close a cycle is rejected before it is inserted.
pub struct Graph<V> {
    dag: StableDiGraph<Node<V>, ()>,
    index: HashMap<NodeKey, NodeIndex>,
    /// Node handles in insertion order.
    order: Vec<NodeIndex>,
    next_ordinal: u64,
}

impl<V> Default for Graph<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Graph<V> {
    pub fn new() -> Self {
        Self {
            dag: StableDiGraph::new(),
            index: HashMap::new(),
            order: Vec::new(),
            next_ordinal: 0,
        }
    }

    /// Add a node. Fails if a node with the same key is already present.
    pub fn add_node(&mut self, spec: NodeSpec<V>) -> Result<(), GraphError> {
        if self.index.contains_key(&spec.key) {
            return Err(GraphError::DuplicateKey(spec.key));
        }
        self.insert(spec);
        Ok(())
    }

    /// Add a node unless one with the same key exists, in which case the
    /// existing node is kept and shared by every dependent that names it.
    ///
    /// Returns `true` if the node was inserted.
    pub fn add_or_reuse(&mut self, spec: NodeSpec<V>) -> bool {
        if self.index.contains_key(&spec.key) {
            debug!(node = %spec.key, "node already present; reusing it");
            return false;
        }
        self.insert(spec);
        true
    }

    /// Declare that `from` requires `to` to complete first.
    ///
    /// On error the graph is left exactly as it was. Declaring an edge that
    /// already exists is a no-op.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let from_ix = self.index_of(from)?;
        let to_ix = self.index_of(to)?;

        // A path from -> ... -> to along dependent edges means `to` already
        // (transitively) depends on `from`.
        if from_ix == to_ix || has_path_connecting(&self.dag, from_ix, to_ix, None) {
            return Err(GraphError::Cycle {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        if !self.dag[from_ix].state.is_unstarted() {
            return Err(GraphError::AlreadyStarted(from.to_string()));
        }

        if self.dag.find_edge(to_ix, from_ix).is_some() {
            return Ok(());
        }

        self.dag.add_edge(to_ix, from_ix, ());
        self.refresh_readiness(from_ix);
        debug!(node = %from, dependency = %to, "dependency added");
        Ok(())
    }

    /// Keys of the nodes currently `Ready`, in insertion order.
    pub fn ready_nodes(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().filter_map(|&ix| {
            let node = &self.dag[ix];
            (node.state == NodeState::Ready).then_some(node.key.as_str())
        })
    }

    /// Remove a `Completed` node whose dependents have all consumed its
    /// result, returning that result.
    pub fn remove_completed(&mut self, key: &str) -> Result<V, GraphError> {
        let ix = self.index_of(key)?;

        if let Some(reason) = self.removal_blocker(ix) {
            return Err(GraphError::NotRemovable {
                key: key.to_string(),
                reason,
            });
        }

        self.remove_index(ix)
            .and_then(|node| node.result)
            .ok_or_else(|| GraphError::UnknownKey(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn node(&self, key: &str) -> Option<&Node<V>> {
        self.index.get(key).map(|&ix| &self.dag[ix])
    }

    pub fn state_of(&self, key: &str) -> Option<NodeState> {
        self.node(key).map(|n| n.state)
    }

    pub fn result_of(&self, key: &str) -> Option<&V> {
        self.node(key).and_then(|n| n.result.as_ref())
    }

    pub fn error_of(&self, key: &str) -> Option<&NodeError> {
        self.node(key).and_then(|n| n.error.as_ref())
    }

    /// All keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(|&ix| self.dag[ix].key.as_str())
    }

    /// Direct dependencies of `key`, in insertion order.
    pub fn dependencies_of(&self, key: &str) -> Vec<&str> {
        self.neighbour_keys(key, Direction::Incoming)
    }

    /// Direct dependents of `key`, in insertion order.
    pub fn dependents_of(&self, key: &str) -> Vec<&str> {
        self.neighbour_keys(key, Direction::Outgoing)
    }

    /// One valid execution order of all nodes (dependencies first).
    pub fn topological_order(&self) -> Vec<&str> {
        match toposort(&self.dag, None) {
            Ok(order) => order.into_iter().map(|ix| self.dag[ix].key.as_str()).collect(),
            // add_dependency never admits a cycle.
            Err(_) => Vec::new(),
        }
    }

    pub(crate) fn index_of(&self, key: &str) -> Result<NodeIndex, GraphError> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| GraphError::UnknownKey(key.to_string()))
    }

    pub(crate) fn node_at(&self, ix: NodeIndex) -> &Node<V> {
        &self.dag[ix]
    }

    pub(crate) fn node_at_mut(&mut self, ix: NodeIndex) -> &mut Node<V> {
        &mut self.dag[ix]
    }

    pub(crate) fn indices(&self) -> &[NodeIndex] {
        &self.order
    }

    /// Direct dependencies of `ix`, in insertion order.
    pub(crate) fn dependencies(&self, ix: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbours(ix, Direction::Incoming)
    }

    /// Direct dependents of `ix`, in insertion order.
    pub(crate) fn dependents(&self, ix: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbours(ix, Direction::Outgoing)
    }

    /// Why `ix` may not be pruned yet, or `None` if it may.
    pub(crate) fn removal_blocker(&self, ix: NodeIndex) -> Option<String> {
        let node = &self.dag[ix];
        if node.state != NodeState::Completed {
            return Some(format!("node is {:?}, not Completed", node.state));
        }

        self.dag
            .neighbors_directed(ix, Direction::Outgoing)
            .map(|dep| &self.dag[dep])
            .find(|dependent| dependent.state.is_unstarted())
            .map(|dependent| format!("dependent '{}' has not consumed the result", dependent.key))
    }

    pub(crate) fn remove_index(&mut self, ix: NodeIndex) -> Option<Node<V>> {
        let node = self.dag.remove_node(ix)?;
        self.index.remove(&node.key);
        self.order.retain(|&other| other != ix);
        debug!(node = %node.key, "node removed from graph");
        Some(node)
    }

    fn insert(&mut self, spec: NodeSpec<V>) {
        let key = spec.key.clone();
        let node = Node::from_spec(spec, self.next_ordinal);
        self.next_ordinal += 1;

        let ix = self.dag.add_node(node);
        self.index.insert(key.clone(), ix);
        self.order.push(ix);
        debug!(node = %key, "node added");
    }

    /// Recompute Pending/Ready for a node that has not started.
    fn refresh_readiness(&mut self, ix: NodeIndex) {
        if !self.dag[ix].state.is_unstarted() {
            return;
        }

        let all_completed = self
            .dag
            .neighbors_directed(ix, Direction::Incoming)
            .all(|dep| self.dag[dep].state == NodeState::Completed);

        self.dag[ix].state = if all_completed {
            NodeState::Ready
        } else {
            NodeState::Pending
        };
    }

    fn sorted_neighbours(&self, ix: NodeIndex, dir: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.dag.neighbors_directed(ix, dir).collect();
        out.sort_by_key(|&n| self.dag[n].ordinal);
        out
    }

    fn neighbour_keys(&self, key: &str, dir: Direction) -> Vec<&str> {
        match self.index.get(key) {
            Some(&ix) => self
                .sorted_neighbours(ix, dir)
                .into_iter()
                .map(|n| self.dag[n].key.as_str())
                .collect(),
            None => Vec::new(),
        }
    }
}

impl<V> std::fmt::Debug for Graph<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for &ix in &self.order {
            list.entry(&self.dag[ix]);
        }
        list.finish()
    }
}
