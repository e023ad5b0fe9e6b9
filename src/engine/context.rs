// src/engine/context.rs

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::stable_graph::NodeIndex;
use tokio::task::Id;
use tokio_util::sync::CancellationToken;

use crate::dag::NodeKey;
use crate::engine::ResolveOptions;
use crate::engine::acquisition::SharedAcquisitions;

/// Transient state of one resolution.
///
/// Owned by the coordinating task only; node work never touches it.
pub struct ExecutionContext<V> {
    /// Spawned node work, by Tokio task id.
    in_flight: HashMap<Id, (NodeIndex, NodeKey)>,
    /// Highest number of nodes in flight at once.
    peak_in_flight: usize,
    limit: Option<usize>,
    cancellation: CancellationToken,
    /// Set once the scheduler has been told about the cancellation.
    cancellation_applied: bool,
    shared: Arc<SharedAcquisitions<V>>,
}

impl<V: Clone + Send + Sync + 'static> ExecutionContext<V> {
    pub fn new(options: &ResolveOptions, cancellation: CancellationToken) -> Self {
        Self {
            in_flight: HashMap::new(),
            peak_in_flight: 0,
            limit: options.max_concurrency.map(|n| n.get()),
            cancellation,
            cancellation_applied: false,
            shared: Arc::new(SharedAcquisitions::new(options.share_acquisitions)),
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.limit.is_none_or(|limit| self.in_flight.len() < limit)
    }

    pub fn track(&mut self, id: Id, ix: NodeIndex, key: NodeKey) {
        self.in_flight.insert(id, (ix, key));
        self.peak_in_flight = self.peak_in_flight.max(self.in_flight.len());
    }

    pub fn untrack(&mut self, id: Id) -> Option<(NodeIndex, NodeKey)> {
        self.in_flight.remove(&id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancelled, but the scheduler has not yet failed the unstarted nodes.
    pub fn cancellation_pending(&self) -> bool {
        self.is_cancelled() && !self.cancellation_applied
    }

    pub fn mark_cancellation_applied(&mut self) {
        self.cancellation_applied = true;
    }

    pub fn shared_acquisitions(&self) -> Arc<SharedAcquisitions<V>> {
        Arc::clone(&self.shared)
    }
}
