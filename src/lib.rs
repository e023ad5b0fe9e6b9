// src/lib.rs

//! Dependency-ordered resolution of task graphs.
//!
//! Build a [`Graph`] of nodes, declare which node requires which, then
//! [`resolve`] it: every node runs once, after all of its dependencies have
//! completed, with independent branches running concurrently. A failure is
//! recorded on the failing node and on every node downstream of it, and the
//! outcome lists all of them.
//!
//! ```no_run
//! use taskdag::{Graph, NodeSpec, resolve};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut graph: Graph<u32> = Graph::new();
//! graph.add_node(NodeSpec::from_fn("a", |_| async { anyhow::Ok(1) }))?;
//! graph.add_node(NodeSpec::from_fn("b", |inputs| async move {
//!     let a = *inputs.require("a")?;
//!     anyhow::Ok(a + 1)
//! }))?;
//! graph.add_dependency("b", "a")?;
//!
//! let results = resolve(&mut graph).await?;
//! assert_eq!(results["b"], 2);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod time;
pub mod types;

pub use dag::{Graph, NodeKey, NodeSpec, NodeState};
pub use engine::resolver::{resolve, resolve_within};
pub use engine::{ResolveOptions, Resolver, ResultMap};
pub use errors::{GraphError, NodeError, NodeFailure, ResolveFailure, TaskdagError};
pub use exec::{Acquisition, Action, Inputs};
pub use time::UnixTime;
