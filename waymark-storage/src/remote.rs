//! The opaque network boundary and the entities that cross it.
//!
//! Waymark treats its backend as a remote procedure seam: CRUD-shaped calls
//! returning futures, failure signalled by error values, wire protocol out
//! of scope. Everything the sync engine knows about the network lives behind
//! [`RemoteBoundary`].

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;
use waymark_core::{
    Challenge, ChallengeDraft, ChallengePatch, EditRecord, EntityKind, RemoteError, Session,
    SessionDraft, SessionPatch, Spot, SpotDraft, SpotPatch, SpotStatus, WaymarkResult,
};

/// Marker trait for entities managed by a repository.
///
/// # Implementation Requirements
///
/// - `kind()` must return a consistent value for all instances
/// - `entity_id()` must return the unique identifier for this instance
/// - Implementations must be `Clone`, `Serialize` and `DeserializeOwned`
///   for cache storage, and `Send + Sync + 'static` for async use
pub trait SyncableEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Creation payload accepted by the remote boundary.
    type Draft: Send + 'static;
    /// Partial-update payload accepted by the remote boundary.
    type Patch: Clone + Serialize + Send + Sync + 'static;

    /// The entity kind for this type.
    fn kind() -> EntityKind;

    /// The unique identifier of this instance.
    fn entity_id(&self) -> Uuid;

    /// Apply a partial update in place.
    fn apply_patch(&mut self, patch: &Self::Patch);
}

impl SyncableEntity for Spot {
    type Draft = SpotDraft;
    type Patch = SpotPatch;

    fn kind() -> EntityKind {
        EntityKind::Spot
    }

    fn entity_id(&self) -> Uuid {
        self.spot_id.as_uuid()
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        self.apply(patch);
    }
}

impl SyncableEntity for Session {
    type Draft = SessionDraft;
    type Patch = SessionPatch;

    fn kind() -> EntityKind {
        EntityKind::Session
    }

    fn entity_id(&self) -> Uuid {
        self.session_id.as_uuid()
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        self.apply(patch);
    }
}

impl SyncableEntity for Challenge {
    type Draft = ChallengeDraft;
    type Patch = ChallengePatch;

    fn kind() -> EntityKind {
        EntityKind::Challenge
    }

    fn entity_id(&self) -> Uuid {
        self.challenge_id.as_uuid()
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        self.apply(patch);
    }
}

/// Remote CRUD seam for one entity type.
///
/// Implementations do not retry; retry policy belongs to callers. Every
/// operation is expected to be safe to retry at the caller's discretion.
#[async_trait]
pub trait RemoteBoundary<T: SyncableEntity>: Send + Sync {
    /// Fetch the full collection.
    async fn list(&self) -> WaymarkResult<Vec<T>>;

    /// Create an entity from a draft. The boundary assigns identity and
    /// returns the persisted entity.
    async fn create(&self, draft: T::Draft) -> WaymarkResult<T>;

    /// Apply a partial update to the entity with `id`.
    async fn update(&self, id: Uuid, patch: T::Patch) -> WaymarkResult<()>;

    /// Set the moderation status of the entity with `id`.
    ///
    /// Only meaningful for moderated kinds; the default rejects the call.
    async fn verify(&self, id: Uuid, status: SpotStatus) -> WaymarkResult<()> {
        let _ = (id, status);
        Err(RemoteError::Unsupported {
            operation: format!("verify on {:?}", T::kind()),
        }
        .into())
    }

    /// Delete the entity with `id`.
    async fn delete(&self, id: Uuid) -> WaymarkResult<()>;

    /// Append a record to the audit trail. Callers treat this as
    /// best-effort and never block a mutation on it.
    async fn log_edit(&self, record: EditRecord) -> WaymarkResult<()>;
}
