// src/exec/action.rs

//! Capabilities a node is built from.
//!
//! - [`Action`] is the node's own work over its dependency results.
//! - [`Acquisition`] is the extra asynchronous fetch a task group performs
//!   before its action.
//!
//! Both have blanket impls for async closures, so most callers never name
//! the traits.

use std::collections::HashMap;
use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::dag::NodeKey;
use crate::types::BoxFuture;

/// Everything a node's action receives when it is dispatched.
///
/// `dependencies` holds exactly the results of the node's declared
/// dependencies, cloned out of the graph when the node became ready.
#[derive(Debug)]
pub struct Inputs<V> {
    key: NodeKey,
    dependencies: HashMap<NodeKey, V>,
    acquired: Option<V>,
    cancellation: CancellationToken,
}

impl<V> Inputs<V> {
    pub fn new(
        key: NodeKey,
        dependencies: HashMap<NodeKey, V>,
        acquired: Option<V>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            key,
            dependencies,
            acquired,
            cancellation,
        }
    }

    /// Key of the node being executed.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Result of the dependency `key`.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.dependencies.get(key)
    }

    /// Like [`get`](Self::get), failing with a descriptive error when the
    /// key is not a declared dependency.
    pub fn require(&self, key: &str) -> anyhow::Result<&V> {
        self.dependencies.get(key).ok_or_else(|| {
            anyhow::anyhow!("node '{}' has no dependency named '{}'", self.key, key)
        })
    }

    pub fn dependencies(&self) -> &HashMap<NodeKey, V> {
        &self.dependencies
    }

    pub fn into_dependencies(self) -> HashMap<NodeKey, V> {
        self.dependencies
    }

    /// Value produced by the extra acquisition, for task groups.
    pub fn acquired(&self) -> Option<&V> {
        self.acquired.as_ref()
    }

    pub fn take_acquired(&mut self) -> Option<V> {
        self.acquired.take()
    }

    /// Raised when the resolution is cancelled; long actions may watch it
    /// to stop early.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// A node's work. Invoked at most once per resolution.
pub trait Action<V>: Send + Sync {
    fn execute(&self, inputs: Inputs<V>) -> BoxFuture<'static, anyhow::Result<V>>;
}

impl<V, F, Fut> Action<V> for F
where
    F: Fn(Inputs<V>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
{
    fn execute(&self, inputs: Inputs<V>) -> BoxFuture<'static, anyhow::Result<V>> {
        Box::pin((self)(inputs))
    }
}

/// Zero-argument asynchronous producer used by task groups.
pub trait Acquisition<V>: Send + Sync {
    fn fetch(&self) -> BoxFuture<'static, anyhow::Result<V>>;
}

impl<V, F, Fut> Acquisition<V> for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
{
    fn fetch(&self) -> BoxFuture<'static, anyhow::Result<V>> {
        Box::pin((self)())
    }
}
