//! Core entity structures
//!
//! Entities mirror what the remote boundary persists. While resident in
//! memory they are owned exclusively by the domain store; the in-memory copy
//! and the last-synced remote copy may diverge only inside the window
//! between an optimistic mutation and its network confirmation.

use crate::{
    compute_patch_hash, ChallengeId, ContentHash, SessionId, SpotId, Timestamp, UserId,
};
use bitflags::bitflags;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entity type discriminator used for cache keys, repositories and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Spot,
    Session,
    Challenge,
}

impl EntityKind {
    /// Logical cache key for the full collection of this kind.
    pub fn collection_key(&self) -> &'static str {
        match self {
            Self::Spot => "spots.all",
            Self::Session => "sessions.all",
            Self::Challenge => "challenges.all",
        }
    }
}

/// Moderation state of a spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpotStatus {
    /// Submitted by a user, not yet reviewed
    Pending,
    /// Confirmed by a moderator or trusted user
    Verified,
    /// Reviewed and rejected
    Rejected,
}

bitflags! {
    /// Physical attributes of a spot, packed for compact storage.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpotTraits: u32 {
        /// Sheltered from rain
        const COVERED = 0b0000_0001;
        /// Usable after dark
        const LIT = 0b0000_0010;
        /// Drinking water nearby
        const WATER = 0b0000_0100;
        /// Suitable for newcomers
        const BEGINNER_FRIENDLY = 0b0000_1000;
        /// Free public access
        const FREE_ACCESS = 0b0001_0000;
        /// Known to be patrolled or access-restricted at times
        const RESTRICTED_HOURS = 0b0010_0000;
    }
}

impl Default for SpotTraits {
    fn default() -> Self {
        Self::empty()
    }
}

// Manual serde implementation for SpotTraits (bitflags 2.x + serde)
impl Serialize for SpotTraits {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SpotTraits {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        Self::from_bits(bits).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid SpotTraits bits: {:#010x}", bits))
        })
    }
}

/// Spot - a curated, location-tagged activity spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub spot_id: SpotId,
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub traits: SpotTraits,
    pub status: SpotStatus,
    pub created_by: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Spot {
    /// Apply a partial update in place, bumping `updated_at`.
    ///
    /// Fields left as `None` in the patch are untouched.
    pub fn apply(&mut self, patch: &SpotPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(latitude) = patch.latitude {
            self.latitude = latitude;
        }
        if let Some(longitude) = patch.longitude {
            self.longitude = longitude;
        }
        if let Some(traits) = patch.traits {
            self.traits = traits;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
    }
}

/// Payload for creating a new spot. The remote boundary assigns identity
/// and timestamps and returns the full entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotDraft {
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub traits: SpotTraits,
    pub created_by: UserId,
}

/// Partial update for a spot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub traits: Option<SpotTraits>,
    pub status: Option<SpotStatus>,
}

impl SpotPatch {
    /// Patch that only renames the spot.
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Patch that only changes moderation status.
    pub fn status(status: SpotStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Session - a scheduled meetup hosted at a spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub spot_id: SpotId,
    pub title: String,
    pub host: UserId,
    pub scheduled_for: Timestamp,
    pub attendees: Vec<UserId>,
    pub created_at: Timestamp,
}

impl Session {
    pub fn apply(&mut self, patch: &SessionPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(scheduled_for) = patch.scheduled_for {
            self.scheduled_for = scheduled_for;
        }
        if let Some(attendees) = &patch.attendees {
            self.attendees = attendees.clone();
        }
    }
}

/// Payload for creating a new session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub spot_id: SpotId,
    pub title: String,
    pub host: UserId,
    pub scheduled_for: Timestamp,
}

/// Partial update for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub scheduled_for: Option<Timestamp>,
    pub attendees: Option<Vec<UserId>>,
}

/// Challenge - a repeatable objective attached to a spot, worth XP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge_id: ChallengeId,
    pub spot_id: SpotId,
    pub title: String,
    pub reward_xp: u32,
    pub completed: bool,
    pub created_at: Timestamp,
}

impl Challenge {
    pub fn apply(&mut self, patch: &ChallengePatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(reward_xp) = patch.reward_xp {
            self.reward_xp = reward_xp;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }
}

/// Payload for creating a new challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeDraft {
    pub spot_id: SpotId,
    pub title: String,
    pub reward_xp: u32,
}

/// Partial update for a challenge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengePatch {
    pub title: Option<String>,
    pub reward_xp: Option<u32>,
    pub completed: Option<bool>,
}

impl ChallengePatch {
    /// Patch that marks the challenge completed.
    pub fn completed() -> Self {
        Self {
            completed: Some(true),
            ..Self::default()
        }
    }
}

/// Audit-trail record describing one accepted edit.
///
/// Written best-effort after a successful mutation. `patch_hash` is the
/// SHA-256 of the serialized patch so a tampered trail entry is detectable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRecord {
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub summary: String,
    pub patch_hash: ContentHash,
    pub edited_at: Timestamp,
}

impl EditRecord {
    /// Build a record for an accepted patch.
    pub fn new(
        entity_kind: EntityKind,
        entity_id: Uuid,
        summary: impl Into<String>,
        patch_bytes: &[u8],
    ) -> Self {
        Self {
            entity_kind,
            entity_id,
            summary: summary.into(),
            patch_hash: compute_patch_hash(patch_bytes),
            edited_at: Utc::now(),
        }
    }

    /// Hex rendering of the patch hash for log lines.
    pub fn patch_hash_hex(&self) -> String {
        hex::encode(self.patch_hash)
    }
}
