// src/config/validate.rs

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile, ResolverSection};
use crate::engine::ResolveOptions;
use crate::errors::{Result, TaskdagError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TaskdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let resolver = validate_resolver(&raw.resolver)?;
        Ok(ConfigFile::new_unchecked(resolver, raw.logging))
    }
}

fn validate_resolver(section: &ResolverSection) -> Result<ResolveOptions> {
    let max_concurrency = match section.max_concurrency {
        None => None,
        Some(n) => Some(NonZeroUsize::new(n).ok_or_else(|| {
            TaskdagError::ConfigError(
                "[resolver].max_concurrency must be >= 1 (got 0)".to_string(),
            )
        })?),
    };

    let node_timeout = section
        .node_timeout
        .as_deref()
        .map(|s| validate_timeout("node_timeout", s))
        .transpose()?;

    let resolution_timeout = section
        .resolution_timeout
        .as_deref()
        .map(|s| validate_timeout("resolution_timeout", s))
        .transpose()?;

    Ok(ResolveOptions {
        max_concurrency,
        fail_fast: section.fail_fast,
        node_timeout,
        resolution_timeout,
        share_acquisitions: section.share_acquisitions,
        prune_completed: section.prune_completed,
    })
}

fn validate_timeout(field: &str, value: &str) -> Result<Duration> {
    let duration = parse_duration(value)
        .map_err(|e| TaskdagError::ConfigError(format!("[resolver].{field}: {e}")))?;

    if duration.is_zero() {
        return Err(TaskdagError::ConfigError(format!(
            "[resolver].{field} must be greater than zero (got '{value}')"
        )));
    }

    Ok(duration)
}

/// Parse a duration such as `"250ms"`, `"3s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration out of range: '{s}'"))
}
