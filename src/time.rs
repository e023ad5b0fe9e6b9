// src/time.rs

//! Epoch-seconds timestamp used by callers that build resource payloads from
//! resolution results.
//!
//! A [`UnixTime`] always holds a value; "not set" is `Option<UnixTime>`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnixTimeError {
    #[error("epoch seconds {0} are outside the representable range")]
    OutOfRange(i64),

    #[error("invalid RFC 3339 timestamp '{input}': {reason}")]
    Parse { input: String, reason: String },
}

/// A UTC instant with whole-second precision.
///
/// Two values built from the same epoch seconds are equal and hash equally.
/// Sub-second parts are dropped on construction.
///
/// Serialized as a plain integer count of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixTime(#[serde(with = "chrono::serde::ts_seconds")] DateTime<Utc>);

impl UnixTime {
    pub fn from_epoch_seconds(secs: i64) -> Result<Self, UnixTimeError> {
        DateTime::<Utc>::from_timestamp(secs, 0)
            .map(UnixTime)
            .ok_or(UnixTimeError::OutOfRange(secs))
    }

    /// Wrap an existing date-time, truncating it to whole seconds.
    pub fn from_date_time(dt: DateTime<Utc>) -> Self {
        match DateTime::<Utc>::from_timestamp(dt.timestamp(), 0) {
            Some(truncated) => UnixTime(truncated),
            None => UnixTime(dt),
        }
    }

    pub fn now() -> Self {
        Self::from_date_time(Utc::now())
    }

    pub fn epoch_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    pub fn date_time(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for UnixTime {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_date_time(dt)
    }
}

impl TryFrom<i64> for UnixTime {
    type Error = UnixTimeError;

    fn try_from(secs: i64) -> Result<Self, Self::Error> {
        Self::from_epoch_seconds(secs)
    }
}

impl fmt::Display for UnixTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl FromStr for UnixTime {
    type Err = UnixTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| Self::from_date_time(dt.with_timezone(&Utc)))
            .map_err(|e| UnixTimeError::Parse {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}
