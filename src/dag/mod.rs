// src/dag/mod.rs

//! Graph representation and scheduling.
//!
//! - [`graph`] holds the node arena and its dependency edges.
//! - [`node`] defines node specs, kinds (plain task or task group) and
//!   lifecycle state.
//! - [`scheduler`] contains the per-resolution state machine that decides
//!   which nodes are ready and applies their outcomes.
//! - [`scheduler_step`] defines the step result and dispatch types.
//! - [`state_manager`] propagates failures to dependents.

pub mod graph;
pub mod node;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use graph::Graph;
pub use node::{AcquisitionStep, Node, NodeKey, NodeKind, NodeSpec, NodeState, TaskGroup};
pub use scheduler::Scheduler;
pub use scheduler_step::{ScheduledNode, SchedulerStep};
