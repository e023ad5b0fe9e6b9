// src/dag/scheduler.rs

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use petgraph::stable_graph::NodeIndex;
use tracing::{debug, info, warn};

use crate::dag::graph::Graph;
use crate::dag::node::{NodeKey, NodeState};
use crate::dag::scheduler_step::{ScheduledNode, SchedulerStep};
use crate::dag::state_manager::StateManager;
use crate::engine::{ResolveOptions, ResultMap};
use crate::errors::{NodeError, NodeFailure, ResolveFailure};

/// Per-resolution state machine over a [`Graph`].
///
/// It is responsible for:
/// - counting unresolved dependencies per node (Kahn in-degree)
/// - queueing nodes as they become ready, in insertion order
/// - moving nodes `Ready -> Running` when they are dispatched
/// - recording results and failures
/// - short-circuiting dependents of failed nodes
///
/// It performs no IO and owns no Tokio types; the async resolver drives it.
pub struct Scheduler<'g, V> {
    graph: &'g mut Graph<V>,
    /// Nodes taking part in this resolution, in insertion order.
    members: Vec<NodeIndex>,
    /// Number of dependencies not yet `Completed`, per member.
    in_degree: HashMap<NodeIndex, usize>,
    ready: VecDeque<NodeIndex>,
    results: ResultMap<V>,
    failures: Vec<NodeFailure>,
    default_timeout: Option<Duration>,
    prune_completed: bool,
    finished: bool,
}

impl<'g, V> Scheduler<'g, V> {
    pub fn new(graph: &'g mut Graph<V>, options: &ResolveOptions) -> Self {
        Self {
            graph,
            members: Vec::new(),
            in_degree: HashMap::new(),
            ready: VecDeque::new(),
            results: HashMap::new(),
            failures: Vec::new(),
            default_timeout: options.node_timeout,
            prune_completed: options.prune_completed,
            finished: false,
        }
    }

    /// Begin a resolution over every node that has not started yet.
    ///
    /// Dependencies that completed in an earlier resolution count as
    /// resolved; nodes depending on a node that already failed are
    /// short-circuited immediately.
    pub fn start(&mut self) -> SchedulerStep {
        self.members = self
            .graph
            .indices()
            .iter()
            .copied()
            .filter(|&ix| self.graph.node_at(ix).state.is_unstarted())
            .collect();

        let mut step = SchedulerStep::default();
        let mut inherited_failures = Vec::new();

        for &ix in &self.members {
            let deps = self.graph.dependencies(ix);
            let unresolved = deps
                .iter()
                .filter(|&&d| self.graph.node_at(d).state != NodeState::Completed)
                .count();
            self.in_degree.insert(ix, unresolved);

            let failed_dep = deps
                .iter()
                .copied()
                .find(|&d| self.graph.node_at(d).state == NodeState::Failed);
            if let Some(dep) = failed_dep {
                inherited_failures.push((ix, dep));
            }
        }

        for (ix, dep) in inherited_failures {
            let dep_node = self.graph.node_at(dep);
            let cause = dep_node.error.clone().unwrap_or(NodeError::Cancelled);
            let error = NodeError::dependency_failed(&dep_node.key, &cause);
            let mut manager = StateManager::new(self.graph, &mut self.failures);
            step.newly_failed.extend(manager.fail_node(ix, error));
        }

        let initially_ready: Vec<NodeIndex> = self
            .members
            .iter()
            .copied()
            .filter(|ix| self.in_degree.get(ix) == Some(&0))
            .collect();
        for ix in initially_ready {
            if let Some(key) = self.mark_ready(ix) {
                step.newly_ready.push(key);
            }
        }

        info!(
            nodes = self.members.len(),
            ready = step.newly_ready.len(),
            "scheduler: starting resolution"
        );

        step.run_just_finished = self.maybe_finish();
        step
    }

    /// Fail every `Ready` node with `error` and stop dispatching.
    ///
    /// Running nodes are left alone; their pending dependents are
    /// short-circuited once they report.
    pub fn cancel_unstarted(&mut self, error: NodeError) -> SchedulerStep {
        self.ready.clear();
        let mut step = SchedulerStep::default();

        for ix in self.members_in_state(NodeState::Ready) {
            let mut manager = StateManager::new(self.graph, &mut self.failures);
            step.newly_failed.extend(manager.fail_node(ix, error.clone()));
        }

        step.run_just_finished = self.maybe_finish();
        step
    }

    /// Fail every node that has not reached a terminal state: `Running`
    /// ones first, then `Ready`, then anything left `Pending`.
    pub fn abandon(&mut self, error: NodeError) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        for ix in self.members_in_state(NodeState::Running) {
            let mut manager = StateManager::new(self.graph, &mut self.failures);
            step.newly_failed.extend(manager.fail_node(ix, error.clone()));
        }

        step.merge(self.cancel_unstarted(error.clone()));

        for ix in self.members_in_state(NodeState::Pending) {
            let mut manager = StateManager::new(self.graph, &mut self.failures);
            step.newly_failed.extend(manager.fail_node(ix, error.clone()));
        }

        step.run_just_finished |= self.maybe_finish();
        step
    }

    pub fn has_ready(&self) -> bool {
        self.ready
            .iter()
            .any(|&ix| self.graph.node_at(ix).state == NodeState::Ready)
    }

    /// No member is Pending, Ready or Running.
    pub fn is_finished(&self) -> bool {
        self.members.iter().all(|&ix| self.graph.node_at(ix).state.is_terminal())
    }

    pub fn state_of(&self, key: &str) -> Option<NodeState> {
        self.graph.state_of(key)
    }

    /// Dependencies of `key` not yet completed in this resolution.
    pub fn unresolved_dependencies(&self, key: &str) -> Option<usize> {
        let ix = self.graph.index_of(key).ok()?;
        self.in_degree.get(&ix).copied()
    }

    /// Keys of every node taking part in this resolution.
    pub fn members(&self) -> Vec<NodeKey> {
        self.members
            .iter()
            .map(|&ix| self.graph.node_at(ix).key.clone())
            .collect()
    }

    pub fn results(&self) -> &ResultMap<V> {
        &self.results
    }

    pub fn failures(&self) -> &[NodeFailure] {
        &self.failures
    }

    /// Final outcome: every result, or every failure plus the results that
    /// did complete.
    ///
    /// Anything still unfinished is abandoned as `Cancelled` first.
    pub fn into_outcome(mut self) -> Result<ResultMap<V>, ResolveFailure<V>> {
        if !self.is_finished() {
            self.abandon(NodeError::Cancelled);
        }

        let results = std::mem::take(&mut self.results);
        let failures = std::mem::take(&mut self.failures);
        if failures.is_empty() {
            Ok(results)
        } else {
            Err(ResolveFailure {
                failures,
                completed: results,
            })
        }
    }

    fn mark_ready(&mut self, ix: NodeIndex) -> Option<NodeKey> {
        let node = self.graph.node_at_mut(ix);
        if !node.state.is_unstarted() {
            return None;
        }
        node.state = NodeState::Ready;
        self.ready.push_back(ix);
        Some(node.key.clone())
    }

    fn members_in_state(&self, state: NodeState) -> Vec<NodeIndex> {
        self.members
            .iter()
            .copied()
            .filter(|&ix| self.graph.node_at(ix).state == state)
            .collect()
    }

    /// Drop a completed dependency once every dependent has consumed it.
    ///
    /// Its result stays in the resolution outcome.
    fn try_prune(&mut self, ix: NodeIndex) {
        if self.graph.removal_blocker(ix).is_some() {
            return;
        }
        self.members.retain(|&m| m != ix);
        self.in_degree.remove(&ix);
        self.graph.remove_index(ix);
    }

    fn maybe_finish(&mut self) -> bool {
        if self.finished || !self.is_finished() {
            return false;
        }
        self.finished = true;
        info!(
            completed = self.results.len(),
            failed = self.failures.len(),
            "scheduler: all nodes terminal; resolution finished"
        );
        true
    }
}

impl<'g, V: Clone> Scheduler<'g, V> {
    /// Take the next ready node, move it to `Running` and describe it for
    /// execution. `None` when nothing is ready.
    pub fn dispatch_next(&mut self) -> Option<ScheduledNode<V>> {
        while let Some(ix) = self.ready.pop_front() {
            if self.graph.node_at(ix).state != NodeState::Ready {
                // Failed while queued (cancellation or deadline).
                continue;
            }

            let dep_indices = self.graph.dependencies(ix);
            let mut dependencies = HashMap::with_capacity(dep_indices.len());
            for &d in &dep_indices {
                let dep = self.graph.node_at(d);
                match &dep.result {
                    Some(value) => {
                        dependencies.insert(dep.key.clone(), value.clone());
                    }
                    None => warn!(
                        node = %self.graph.node_at(ix).key,
                        dependency = %dep.key,
                        "ready node has a dependency without a result"
                    ),
                }
            }

            let node = self.graph.node_at_mut(ix);
            node.state = NodeState::Running;
            let scheduled = ScheduledNode {
                key: node.key.clone(),
                index: ix,
                action: Arc::clone(node.kind.action()),
                acquisition: node.kind.acquisition().cloned(),
                dependencies,
                timeout: node.timeout.or(self.default_timeout),
            };
            debug!(node = %scheduled.key, "dependencies satisfied; marking Running");

            if self.prune_completed {
                for d in dep_indices {
                    self.try_prune(d);
                }
            }

            return Some(scheduled);
        }
        None
    }

    /// Apply the outcome of a node that was `Running`.
    pub fn step_completion(&mut self, key: &str, outcome: Result<V, NodeError>) -> SchedulerStep {
        match self.graph.index_of(key) {
            Ok(ix) => self.complete_index(ix, outcome),
            Err(_) => {
                warn!(node = %key, "completion for unknown node; ignoring");
                SchedulerStep::default()
            }
        }
    }

    pub(crate) fn complete_index(
        &mut self,
        ix: NodeIndex,
        outcome: Result<V, NodeError>,
    ) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let node = self.graph.node_at_mut(ix);
        if node.state != NodeState::Running {
            warn!(
                node = %node.key,
                state = ?node.state,
                "completion for node that is not Running; ignoring"
            );
            return step;
        }

        match outcome {
            Ok(value) => {
                node.state = NodeState::Completed;
                node.result = Some(value.clone());
                let key = node.key.clone();
                debug!(node = %key, "node completed");
                self.results.insert(key, value);

                for dependent in self.graph.dependents(ix) {
                    let Some(remaining) = self.in_degree.get_mut(&dependent) else {
                        continue;
                    };
                    *remaining = remaining.saturating_sub(1);
                    if *remaining == 0 {
                        if let Some(key) = self.mark_ready(dependent) {
                            step.newly_ready.push(key);
                        }
                    }
                }
            }
            Err(error) => {
                let mut manager = StateManager::new(self.graph, &mut self.failures);
                step.newly_failed = manager.fail_node(ix, error);
            }
        }

        step.run_just_finished = self.maybe_finish();
        step
    }
}

/// A scheduler dropped mid-resolution (for example because the resolve
/// future was dropped) fails every unfinished member with `Cancelled`, so no
/// node is left `Running` in the graph.
impl<V> Drop for Scheduler<'_, V> {
    fn drop(&mut self) {
        if self.is_finished() {
            return;
        }
        warn!(
            unfinished = self
                .members
                .iter()
                .filter(|&&ix| !self.graph.node_at(ix).state.is_terminal())
                .count(),
            "scheduler dropped before the resolution finished; cancelling the rest"
        );
        self.abandon(NodeError::Cancelled);
    }
}
