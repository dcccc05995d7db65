//! # Temporal Types: UTC-Only Timestamps
//!
//! `Timestamp` wraps `DateTime<Utc>` truncated to microseconds, the
//! resolution segment boundaries are stored at. Truncating on construction
//! means a value read back from storage compares equal to the value written,
//! which the contiguity checks (`next.begin_at == prior.end_at`) rely on.
//!
//! Non-UTC inputs are rejected by [`Timestamp::parse()`]; there is no silent
//! offset conversion.

use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NexusError, NexusResult};

/// A UTC instant with microsecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to microseconds.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// From a `chrono::DateTime<Utc>`, truncating sub-microsecond digits.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt.trunc_subsecs(6))
    }

    /// Parse an RFC 3339 timestamp with a `Z` suffix.
    ///
    /// # Errors
    ///
    /// Returns [`NexusError::Validation`] for malformed input or a non-`Z`
    /// offset (including `+00:00`).
    pub fn parse(s: &str) -> Result<Self, NexusError> {
        if !s.ends_with('Z') {
            return Err(NexusError::Validation(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            NexusError::Validation(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    /// From Unix epoch seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, NexusError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| NexusError::Validation(format!("invalid Unix timestamp: {secs}")))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// This instant shifted forward by `secs` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`NexusError::Validation`] when the result falls outside the
    /// representable range.
    pub fn plus_seconds(&self, secs: i64) -> NexusResult<Self> {
        TimeDelta::try_seconds(secs)
            .and_then(|delta| self.0.checked_add_signed(delta))
            .map(Self)
            .ok_or_else(|| out_of_range(self, "+", secs))
    }

    /// This instant shifted backward by `secs` seconds.
    ///
    /// # Errors
    ///
    /// Same as [`Timestamp::plus_seconds()`].
    pub fn minus_seconds(&self, secs: i64) -> NexusResult<Self> {
        TimeDelta::try_seconds(secs)
            .and_then(|delta| self.0.checked_sub_signed(delta))
            .map(Self)
            .ok_or_else(|| out_of_range(self, "-", secs))
    }

    /// Strictly earlier than `other`.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Strictly later than `other`.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// RFC 3339 with microseconds and `Z` suffix.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

fn out_of_range(ts: &Timestamp, op: &str, secs: i64) -> NexusError {
    NexusError::Validation(format!("{ts} {op} {secs}s is out of range"))
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}
