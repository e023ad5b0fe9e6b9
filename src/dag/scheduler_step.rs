// src/dag/scheduler_step.rs

//! Step results and dispatch descriptors produced by the scheduler.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use petgraph::stable_graph::NodeIndex;

use crate::dag::node::{AcquisitionStep, NodeKey};
use crate::exec::Action;

/// Structured result of a single scheduler "step".
///
/// Useful for tests that drive the scheduler by hand and make assertions
/// about what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Nodes that became `Ready` as a result of this step, in dispatch order.
    pub newly_ready: Vec<NodeKey>,
    /// Nodes newly marked `Failed` in this step (the node that failed first,
    /// then every short-circuited dependent).
    pub newly_failed: Vec<NodeKey>,
    /// Whether this step left no node Pending, Ready or Running.
    pub run_just_finished: bool,
}

impl SchedulerStep {
    pub(crate) fn merge(&mut self, other: SchedulerStep) {
        self.newly_ready.extend(other.newly_ready);
        self.newly_failed.extend(other.newly_failed);
        self.run_just_finished |= other.run_just_finished;
    }
}

/// A node the scheduler has moved to `Running` and wants executed now.
pub struct ScheduledNode<V> {
    pub key: NodeKey,
    pub(crate) index: NodeIndex,
    pub action: Arc<dyn Action<V>>,
    pub acquisition: Option<AcquisitionStep<V>>,
    /// Results of every declared dependency.
    pub dependencies: HashMap<NodeKey, V>,
    /// Effective deadline: the node's own, else the resolution default.
    pub timeout: Option<Duration>,
}

impl<V> fmt::Debug for ScheduledNode<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut deps: Vec<_> = self.dependencies.keys().collect();
        deps.sort();
        f.debug_struct("ScheduledNode")
            .field("key", &self.key)
            .field("dependencies", &deps)
            .field("has_acquisition", &self.acquisition.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}
