// src/config/model.rs

use serde::Deserialize;

use crate::engine::ResolveOptions;
use crate::types::LogLevel;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [resolver]
/// max_concurrency = 4
/// fail_fast = true
/// node_timeout = "30s"
/// resolution_timeout = "5m"
/// share_acquisitions = false
/// prune_completed = false
///
/// [logging]
/// level = "debug"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Resolution behaviour from `[resolver]`.
    #[serde(default)]
    pub resolver: ResolverSection,

    /// Logging behaviour from `[logging]`.
    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[resolver]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverSection {
    /// Maximum number of node actions in flight at once.
    ///
    /// Unbounded when absent; `0` is rejected by validation.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Stop dispatching new nodes after the first failure.
    #[serde(default)]
    pub fail_fast: bool,

    /// Default deadline for a single node (e.g. `"30s"`).
    ///
    /// Nodes with their own timeout keep it.
    #[serde(default)]
    pub node_timeout: Option<String>,

    /// Deadline for a whole resolution (e.g. `"5m"`).
    #[serde(default)]
    pub resolution_timeout: Option<String>,

    /// Run extra acquisitions that carry the same share key once per
    /// resolution instead of once per node.
    #[serde(default)]
    pub share_acquisitions: bool,

    /// Drop completed nodes from the graph once all their dependents have
    /// consumed the result.
    #[serde(default)]
    pub prune_completed: bool,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Fallback level when neither the caller nor `TASKDAG_LOG` sets one.
    #[serde(default)]
    pub level: Option<LogLevel>,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (or the
/// loader helpers), so durations are already parsed and limits checked.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub resolver: ResolveOptions,
    pub logging: LoggingSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(resolver: ResolveOptions, logging: LoggingSection) -> Self {
        Self { resolver, logging }
    }
}

impl From<&ConfigFile> for ResolveOptions {
    fn from(cfg: &ConfigFile) -> Self {
        cfg.resolver.clone()
    }
}
