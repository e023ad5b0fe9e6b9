// src/errors.rs

//! Crate-wide error types.
//!
//! - [`GraphError`] is returned by graph mutations; a failed mutation leaves
//!   the graph untouched.
//! - [`NodeError`] records why a single node ended `Failed` during a
//!   resolution.
//! - [`ResolveFailure`] aggregates every node failure of a resolution.
//! - [`TaskdagError`] covers configuration loading and application glue.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::dag::NodeKey;

/// Errors raised while building a graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node '{0}' is already present in the graph")]
    DuplicateKey(NodeKey),

    #[error("node '{0}' is not present in the graph")]
    UnknownKey(NodeKey),

    #[error("dependency '{from}' -> '{to}' would create a cycle")]
    Cycle { from: NodeKey, to: NodeKey },

    #[error("node '{0}' has already started; its dependencies can no longer change")]
    AlreadyStarted(NodeKey),

    #[error("node '{key}' cannot be removed: {reason}")]
    NotRemovable { key: NodeKey, reason: String },
}

/// Why a node failed during resolution.
///
/// Cloneable so that the origin's error can be attached to every dependent
/// that was short-circuited because of it.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("action failed: {0:#}")]
    Action(Arc<anyhow::Error>),

    #[error("extra acquisition failed: {0:#}")]
    Acquisition(Arc<anyhow::Error>),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("dependency '{origin}' failed: {cause}")]
    DependencyFailed {
        origin: NodeKey,
        #[source]
        cause: Box<NodeError>,
    },
}

impl NodeError {
    pub fn action(err: anyhow::Error) -> Self {
        NodeError::Action(Arc::new(err))
    }

    pub fn acquisition(err: anyhow::Error) -> Self {
        NodeError::Acquisition(Arc::new(err))
    }

    /// Build the error recorded on a dependent of `origin`.
    ///
    /// If `cause` is itself a short-circuit, the chain is collapsed so that
    /// `origin` always names the node whose own work failed.
    pub fn dependency_failed(origin: &str, cause: &NodeError) -> Self {
        match cause {
            NodeError::DependencyFailed { .. } => cause.clone(),
            other => NodeError::DependencyFailed {
                origin: origin.to_string(),
                cause: Box::new(other.clone()),
            },
        }
    }

    /// The error produced by the node whose own work failed.
    pub fn root_cause(&self) -> &NodeError {
        match self {
            NodeError::DependencyFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Key of the upstream node this failure originated from, if it was a
    /// short-circuit.
    pub fn origin(&self) -> Option<&str> {
        match self {
            NodeError::DependencyFailed { origin, .. } => Some(origin),
            _ => None,
        }
    }

    pub fn is_short_circuit(&self) -> bool {
        matches!(self, NodeError::DependencyFailed { .. })
    }
}

/// A failed node and the error it ended with.
#[derive(Debug, Clone)]
pub struct NodeFailure {
    pub key: NodeKey,
    pub error: NodeError,
}

/// Outcome of a resolution in which at least one node failed.
///
/// Lists every failed node (the origins as well as the short-circuited
/// dependents) and keeps the results of the nodes that did complete.
pub struct ResolveFailure<V> {
    pub failures: Vec<NodeFailure>,
    pub completed: HashMap<NodeKey, V>,
}

impl<V> ResolveFailure<V> {
    /// Error recorded for `key`, if it failed.
    pub fn error_of(&self, key: &str) -> Option<&NodeError> {
        self.failures
            .iter()
            .find(|f| f.key == key)
            .map(|f| &f.error)
    }

    /// Keys of the failures that were not short-circuits.
    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.failures
            .iter()
            .filter(|f| !f.error.is_short_circuit())
            .map(|f| f.key.as_str())
    }

    pub fn failed_keys(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.key.as_str())
    }
}

impl<V> fmt::Debug for ResolveFailure<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut completed: Vec<_> = self.completed.keys().collect();
        completed.sort();
        f.debug_struct("ResolveFailure")
            .field("failures", &self.failures)
            .field("completed", &completed)
            .finish()
    }
}

impl<V> fmt::Display for ResolveFailure<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} node(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {}: {}", failure.key, failure.error)?;
        }
        Ok(())
    }
}

impl<V> std::error::Error for ResolveFailure<V> {}

#[derive(Error, Debug)]
pub enum TaskdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskdagError>;
