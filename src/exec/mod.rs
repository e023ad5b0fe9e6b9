// src/exec/mod.rs

//! Node execution layer.
//!
//! - [`action`] defines the capabilities a node is built from ([`Action`],
//!   [`Acquisition`]) and the [`Inputs`] an action receives.
//! - [`runner`] runs one scheduled node: extra acquisition, action and
//!   deadline.

pub mod action;
pub mod runner;

pub use action::{Acquisition, Action, Inputs};
pub use runner::run_node;
