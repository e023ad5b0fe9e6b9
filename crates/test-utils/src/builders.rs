#![allow(dead_code)]

use std::time::Duration;

use taskdag::{Graph, NodeSpec};

use crate::recorder::Recorder;

/// Builder for `Graph<String>` to simplify test setup.
///
/// Nodes are recording nodes from the wrapped [`Recorder`] unless added with
/// [`with_spec`](Self::with_spec). Edges are applied in `build`, after all
/// nodes exist, so declaration order does not matter.
pub struct GraphBuilder {
    recorder: Recorder,
    nodes: Vec<NodeSpec<String>>,
    edges: Vec<(String, String)>,
}

impl GraphBuilder {
    pub fn new(recorder: &Recorder) -> Self {
        Self {
            recorder: recorder.clone(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_node(mut self, key: &str) -> Self {
        self.nodes.push(self.recorder.node(key));
        self
    }

    pub fn with_nodes(mut self, keys: &[&str]) -> Self {
        for key in keys {
            self.nodes.push(self.recorder.node(key));
        }
        self
    }

    pub fn with_slow_node(mut self, key: &str, delay: Duration) -> Self {
        self.nodes.push(self.recorder.slow_node(key, delay));
        self
    }

    pub fn with_failing_node(mut self, key: &str, message: &str) -> Self {
        self.nodes.push(self.recorder.failing_node(key, message));
        self
    }

    pub fn with_spec(mut self, spec: NodeSpec<String>) -> Self {
        self.nodes.push(spec);
        self
    }

    /// `from` requires `to`.
    pub fn depends(mut self, from: &str, to: &str) -> Self {
        self.edges.push((from.to_string(), to.to_string()));
        self
    }

    pub fn build(self) -> Graph<String> {
        let mut graph = Graph::new();
        for spec in self.nodes {
            graph
                .add_node(spec)
                .expect("Failed to add node from builder");
        }
        for (from, to) in &self.edges {
            graph
                .add_dependency(from, to)
                .expect("Failed to add dependency from builder");
        }
        graph
    }
}

/// Chain `keys[1]` after `keys[0]`, `keys[2]` after `keys[1]`, ...
pub fn chain(recorder: &Recorder, keys: &[&str]) -> Graph<String> {
    let mut builder = GraphBuilder::new(recorder).with_nodes(keys);
    for pair in keys.windows(2) {
        builder = builder.depends(pair[1], pair[0]);
    }
    builder.build()
}
