// src/engine/mod.rs

//! Resolution engine.
//!
//! The pure state machine lives in [`crate::dag::Scheduler`]; this module is
//! the async shell around it:
//! - [`resolver`] spawns node work, enforces limits and deadlines, and
//!   reports the outcome
//! - [`context`] holds the per-resolution bookkeeping
//! - [`acquisition`] runs extra acquisitions, optionally shared by key

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::dag::NodeKey;

/// Results of a resolution, by node key.
pub type ResultMap<V> = HashMap<NodeKey, V>;

/// Options for a single resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Maximum number of node actions in flight; unbounded when `None`.
    pub max_concurrency: Option<NonZeroUsize>,
    /// Cancel the rest of the resolution after the first failure.
    pub fail_fast: bool,
    /// Deadline for nodes that do not set their own.
    pub node_timeout: Option<Duration>,
    /// Deadline for the whole resolution.
    pub resolution_timeout: Option<Duration>,
    /// Fetch acquisitions sharing a key once per resolution.
    pub share_acquisitions: bool,
    /// Remove completed nodes from the graph once consumed.
    pub prune_completed: bool,
}

pub mod acquisition;
pub mod context;
pub mod resolver;

pub use acquisition::SharedAcquisitions;
pub use context::ExecutionContext;
pub use resolver::Resolver;
