// src/config/mod.rs

//! Configuration for resolutions and logging.
//!
//! - [`model`] holds the TOML-facing structs and the validated [`ConfigFile`].
//! - [`validate`] turns a [`RawConfigFile`] into a [`ConfigFile`].
//! - [`loader`] reads TOML from disk or from a string.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, from_toml_str, load_and_validate, load_from_path};
pub use model::{ConfigFile, LoggingSection, RawConfigFile, ResolverSection};
pub use validate::parse_duration;
