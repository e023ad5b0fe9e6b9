// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] to get
/// a usable [`ConfigFile`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    debug!(path = %path.display(), "loaded taskdag config");

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults for missing sections and keys.
/// - Parses durations and checks limits.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    ConfigFile::try_from(raw_config)
}

/// Parse and validate configuration held in memory.
pub fn from_toml_str(contents: &str) -> Result<ConfigFile> {
    let raw_config: RawConfigFile = toml::from_str(contents)?;
    ConfigFile::try_from(raw_config)
}

/// Default config location: `Taskdag.toml` in the current working directory,
/// or the path named by `TASKDAG_CONFIG` when set.
pub fn default_config_path() -> PathBuf {
    std::env::var_os("TASKDAG_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Taskdag.toml"))
}
