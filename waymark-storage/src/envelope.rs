//! Versioned cache envelope.
//!
//! Every cached value is persisted inside an envelope carrying the write
//! time and the app version that produced it. Validity is decided at read
//! time; the envelope itself never mutates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wrapper persisted around every cached value.
///
/// Serialized as camelCase JSON (`data` / `timestamp` / `appVersion`) with
/// an integer epoch-millisecond timestamp. The field names are pinned here
/// so Rust-side renames cannot drift the on-disk format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEnvelope<T> {
    /// The cached value.
    pub data: T,
    /// Write time as epoch milliseconds.
    pub timestamp: i64,
    /// Version of the application that wrote this entry.
    pub app_version: String,
}

impl<T> CacheEnvelope<T> {
    /// Wrap `data`, stamping the given wall-clock time and app version.
    pub fn stamp(data: T, app_version: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            data,
            timestamp: now.timestamp_millis(),
            app_version: app_version.into(),
        }
    }

    /// Age of this entry at `now`. An entry stamped in the future has age
    /// zero rather than a negative age.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        let millis = now.timestamp_millis().saturating_sub(self.timestamp);
        Duration::from_millis(millis.max(0) as u64)
    }

    /// Whether this entry may be handed to application logic.
    ///
    /// Valid means: written by `current_version` AND, when a TTL applies,
    /// no older than that TTL. A version mismatch is never valid regardless
    /// of age; an invalid entry is indistinguishable from a miss to callers.
    pub fn is_valid(
        &self,
        current_version: &str,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.app_version != current_version {
            return false;
        }
        match ttl {
            Some(ttl) => self.age(now) <= ttl,
            None => true,
        }
    }

    /// Unwrap the envelope, discarding metadata.
    pub fn into_data(self) -> T {
        self.data
    }
}
