//! Identity types for Waymark entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Duration in milliseconds for TTL and timeout values.
pub type DurationMs = i64;

/// SHA-256 content hash for audit-trail integrity.
pub type ContentHash = [u8; 32];

/// Generate a new UUIDv7 entity id (timestamp-sortable).
///
/// UUIDv7 embeds a Unix timestamp, making ids naturally sortable by
/// creation time. The remote boundary treats these as opaque strings.
pub fn new_entity_id() -> Uuid {
    Uuid::now_v7()
}

/// Current wall-clock time as integer epoch milliseconds.
///
/// This is the timestamp representation used inside persisted cache
/// envelopes, where a plain integer survives serialization round-trips
/// across app versions better than a structured datetime.
pub fn epoch_millis(now: Timestamp) -> i64 {
    now.timestamp_millis()
}

/// Compute the SHA-256 hash of a serialized patch.
///
/// Stored on [`crate::EditRecord`] so the audit trail can detect a patch
/// payload that was altered after the fact.
pub fn compute_patch_hash(patch_bytes: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(patch_bytes);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh timestamp-sortable id.
            pub fn new() -> Self {
                Self(new_entity_id())
            }

            /// Wrap an id received from the remote boundary.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(
    /// Identifier of a curated activity spot.
    SpotId
);
entity_id!(
    /// Identifier of a social session hosted at a spot.
    SessionId
);
entity_id!(
    /// Identifier of a challenge attached to a spot.
    ChallengeId
);
entity_id!(
    /// Identifier of a Waymark user account.
    UserId
);
