//! Waymark Core - Entity Types
//!
//! Pure data structures with no behavior beyond construction, validation and
//! patch application. All other crates depend on this. This crate contains
//! ONLY data types - no I/O, no async, no business logic.

pub mod config;
pub mod entities;
pub mod error;
pub mod identity;

pub use config::{CacheConfig, StoreConfig};
pub use entities::{
    Challenge, ChallengeDraft, ChallengePatch, EditRecord, EntityKind, Session, SessionDraft,
    SessionPatch, Spot, SpotDraft, SpotPatch, SpotStatus, SpotTraits,
};
pub use error::{
    CacheError, ConfigError, MediumError, RemoteError, WaymarkError, WaymarkResult,
};
pub use identity::{
    compute_patch_hash, epoch_millis, new_entity_id, ChallengeId, ContentHash, DurationMs,
    SessionId, SpotId, Timestamp, UserId,
};
