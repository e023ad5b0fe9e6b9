// src/dag/node.rs

//! Node definitions and per-node lifecycle state.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::NodeError;
use crate::exec::{Acquisition, Action, Inputs};

/// Canonical node identity used throughout the graph.
pub type NodeKey = String;

/// Lifecycle of a node.
///
/// `Pending -> Ready -> Running -> {Completed | Failed}`. Pending and Ready
/// nodes may also go straight to `Failed` when they are short-circuited,
/// cancelled or time out before being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Waiting on at least one dependency.
    Pending,
    /// All dependencies completed; eligible for dispatch.
    Ready,
    /// Dispatched; action in flight.
    Running,
    /// Result available.
    Completed,
    /// Error recorded.
    Failed,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Completed | NodeState::Failed)
    }

    /// Not started yet and still able to run.
    pub fn is_unstarted(self) -> bool {
        matches!(self, NodeState::Pending | NodeState::Ready)
    }
}

/// An extra acquisition attached to a task group.
pub struct AcquisitionStep<V> {
    pub producer: Arc<dyn Acquisition<V>>,
    /// Acquisitions with the same share key may be fetched once per
    /// resolution when `ResolveOptions::share_acquisitions` is set.
    pub share_key: Option<String>,
}

impl<V> Clone for AcquisitionStep<V> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
            share_key: self.share_key.clone(),
        }
    }
}

/// A node whose action runs only after an extra, caller-supplied
/// asynchronous acquisition has produced its value.
pub struct TaskGroup<V> {
    pub action: Arc<dyn Action<V>>,
    pub acquisition: AcquisitionStep<V>,
}

impl<V> Clone for TaskGroup<V> {
    fn clone(&self) -> Self {
        Self {
            action: Arc::clone(&self.action),
            acquisition: self.acquisition.clone(),
        }
    }
}

/// What a node does when it runs.
pub enum NodeKind<V> {
    /// A plain action over the dependency results.
    Task(Arc<dyn Action<V>>),
    /// Extra acquisition followed by the action.
    Group(TaskGroup<V>),
}

impl<V> NodeKind<V> {
    pub fn action(&self) -> &Arc<dyn Action<V>> {
        match self {
            NodeKind::Task(action) => action,
            NodeKind::Group(group) => &group.action,
        }
    }

    pub fn acquisition(&self) -> Option<&AcquisitionStep<V>> {
        match self {
            NodeKind::Task(_) => None,
            NodeKind::Group(group) => Some(&group.acquisition),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, NodeKind::Group(_))
    }
}

impl<V> Clone for NodeKind<V> {
    fn clone(&self) -> Self {
        match self {
            NodeKind::Task(action) => NodeKind::Task(Arc::clone(action)),
            NodeKind::Group(group) => NodeKind::Group(group.clone()),
        }
    }
}

impl<V> fmt::Debug for NodeKind<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Task(_) => f.write_str("Task"),
            NodeKind::Group(group) => f
                .debug_struct("Group")
                .field("share_key", &group.acquisition.share_key)
                .finish_non_exhaustive(),
        }
    }
}

/// Definition of a node before it is added to a graph.
pub struct NodeSpec<V> {
    pub(crate) key: NodeKey,
    pub(crate) kind: NodeKind<V>,
    pub(crate) timeout: Option<Duration>,
}

impl<V> NodeSpec<V> {
    pub fn new<A>(key: impl Into<NodeKey>, action: A) -> Self
    where
        A: Action<V> + 'static,
    {
        Self::from_action(key, Arc::new(action))
    }

    /// Build a plain task from an async closure over its [`Inputs`].
    pub fn from_fn<F, Fut>(key: impl Into<NodeKey>, f: F) -> Self
    where
        F: Fn(Inputs<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
        V: 'static,
    {
        Self::from_action(key, Arc::new(f))
    }

    pub fn from_action(key: impl Into<NodeKey>, action: Arc<dyn Action<V>>) -> Self {
        Self {
            key: key.into(),
            kind: NodeKind::Task(action),
            timeout: None,
        }
    }

    /// Run `producer` after the dependencies complete and before the action.
    ///
    /// Turns a plain task into a task group; on a task group the previous
    /// producer is replaced.
    pub fn with_extra_acquisition<P>(self, producer: P) -> Self
    where
        P: Acquisition<V> + 'static,
    {
        self.attach(AcquisitionStep {
            producer: Arc::new(producer),
            share_key: None,
        })
    }

    /// Like [`with_extra_acquisition`](Self::with_extra_acquisition), tagging
    /// the producer with a share key.
    pub fn with_shared_acquisition<P>(self, share_key: impl Into<String>, producer: P) -> Self
    where
        P: Acquisition<V> + 'static,
    {
        self.attach(AcquisitionStep {
            producer: Arc::new(producer),
            share_key: Some(share_key.into()),
        })
    }

    /// Per-node deadline covering the extra acquisition and the action.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> &NodeKind<V> {
        &self.kind
    }

    fn attach(mut self, acquisition: AcquisitionStep<V>) -> Self {
        let action = match self.kind {
            NodeKind::Task(action) => action,
            NodeKind::Group(group) => group.action,
        };
        self.kind = NodeKind::Group(TaskGroup {
            action,
            acquisition,
        });
        self
    }
}

impl<V> fmt::Debug for NodeSpec<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A node owned by a [`Graph`](crate::dag::Graph).
pub struct Node<V> {
    pub(crate) key: NodeKey,
    pub(crate) kind: NodeKind<V>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) state: NodeState,
    pub(crate) result: Option<V>,
    pub(crate) error: Option<NodeError>,
    /// Insertion sequence number; the tie-break for dispatch order.
    pub(crate) ordinal: u64,
}

impl<V> Node<V> {
    pub(crate) fn from_spec(spec: NodeSpec<V>, ordinal: u64) -> Self {
        Self {
            key: spec.key,
            kind: spec.kind,
            timeout: spec.timeout,
            state: NodeState::Ready,
            result: None,
            error: None,
            ordinal,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> &NodeKind<V> {
        &self.kind
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn result(&self) -> Option<&V> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&NodeError> {
        self.error.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl<V> fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("has_result", &self.result.is_some())
            .field("error", &self.error)
            .finish()
    }
}
