// src/logging.rs

//! Logging setup for `taskdag` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. the level passed by the caller (if provided)
//! 2. `TASKDAG_LOG` environment variable (e.g. "info", "debug")
//! 3. `[logging].level` from the config file (via [`init_from_config`])
//! 4. default to `info`
//!
//! Logs are sent to STDERR so that the embedding application keeps stdout.

use anyhow::{Result, anyhow};
use tracing_subscriber::fmt;

use crate::config::ConfigFile;
use crate::types::LogLevel;

/// Environment variable consulted when no explicit level is given.
pub const LOG_ENV_VAR: &str = "TASKDAG_LOG";

/// Initialise the global logging subscriber.
///
/// Fails if a global subscriber was already installed.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    install(resolve_level(level, None))
}

/// Initialise logging using `[logging].level` as the fallback level.
pub fn init_from_config(cfg: &ConfigFile) -> Result<()> {
    install(resolve_level(None, cfg.logging.level))
}

/// Pick the effective level: explicit, then environment, then config.
pub fn resolve_level(explicit: Option<LogLevel>, configured: Option<LogLevel>) -> tracing::Level {
    explicit
        .or_else(|| {
            std::env::var(LOG_ENV_VAR)
                .ok()
                .and_then(|s| s.parse::<LogLevel>().ok())
        })
        .or(configured)
        .unwrap_or_default()
        .into()
}

fn install(level: tracing::Level) -> Result<()> {
    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
