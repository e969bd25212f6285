//! The domain store: optimistic mutation, rollback and stale-while-revalidate.
//!
//! # State Machine
//!
//! Per entity the store moves between `synced`, `optimistically-mutated`
//! and `reverting`. A mutation captures its compensation before touching
//! state, applies the change in memory, then issues the network call. On
//! success the optimistic state stands and a domain event is emitted,
//! exactly once, never before the network confirms. On failure the full
//! captured snapshot is restored, not a field-level merge, so interleaved
//! mutations cannot leave the state diverged.
//!
//! # Revalidation Tie-Break
//!
//! A background revalidation may finish after the user has edited locally.
//! The store counts mutations in an atomic sequence; a revalidation captures
//! the sequence when it starts and discards its result if the sequence
//! moved. The collection stays flagged stale and a later refresh
//! reconciles. Stale data over clobbered edits.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};
use waymark_core::{
    Challenge, ChallengeId, ChallengePatch, EditRecord, EntityKind, Session, SessionDraft, Spot,
    SpotDraft, SpotId, SpotPatch, SpotStatus, WaymarkResult,
};
use waymark_events::{EventBus, EventPayload};
use waymark_storage::{DataSource, EntityRepository};

use crate::snapshot::{mutate_with_compensation, Compensation, EditSnapshot};

/// In-memory collections and UI-relevant derived state.
///
/// Owned exclusively by the store; only store operations mutate it.
#[derive(Default)]
struct StoreState {
    spots: Vec<Spot>,
    sessions: Vec<Session>,
    challenges: Vec<Challenge>,
    selected_spot: Option<Spot>,
    spots_stale: bool,
    sessions_stale: bool,
    challenges_stale: bool,
    last_edit: Option<EditSnapshot<Spot>>,
}

impl StoreState {
    /// Re-point the selection at the copy of the entity now in the
    /// collection, or clear it if the entity is gone.
    fn resync_selection(&mut self) {
        if let Some(selected) = &self.selected_spot {
            let id = selected.spot_id;
            self.selected_spot = self.spots.iter().find(|s| s.spot_id == id).cloned();
        }
    }
}

struct StoreInner {
    spots: EntityRepository<Spot>,
    sessions: EntityRepository<Session>,
    challenges: EntityRepository<Challenge>,
    bus: EventBus,
    state: RwLock<StoreState>,
    spots_revalidating: AtomicBool,
    sessions_revalidating: AtomicBool,
    challenges_revalidating: AtomicBool,
    mutation_seq: AtomicU64,
}

/// The single process-wide state container.
///
/// Constructed once at the composition root and handed around by cheap
/// clone; every clone shares the same state. There is nothing global here.
#[derive(Clone)]
pub struct DomainStore {
    inner: Arc<StoreInner>,
}

impl DomainStore {
    pub fn new(
        spots: EntityRepository<Spot>,
        sessions: EntityRepository<Session>,
        challenges: EntityRepository<Challenge>,
        bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                spots,
                sessions,
                challenges,
                bus,
                state: RwLock::new(StoreState::default()),
                spots_revalidating: AtomicBool::new(false),
                sessions_revalidating: AtomicBool::new(false),
                challenges_revalidating: AtomicBool::new(false),
                mutation_seq: AtomicU64::new(0),
            }),
        }
    }

    // ========================================================================
    // REFRESH (STALE-WHILE-REVALIDATE)
    // ========================================================================

    /// Refresh the spot collection, cache first.
    ///
    /// Cache-sourced data is published immediately and flagged stale while
    /// a background revalidation runs (at most one in flight). A network
    /// failure never surfaces here: the current data stays visible and the
    /// stale flag stays set. Absence of a cache entry is the only path that
    /// waits on the network.
    pub async fn refresh_spots(&self) {
        match self.inner.spots.get_all().await {
            Ok(read) => match read.source {
                DataSource::Network => {
                    let mut state = self.inner.state.write().await;
                    state.spots = read.data;
                    state.spots_stale = false;
                    state.resync_selection();
                }
                DataSource::Cache => {
                    {
                        let mut state = self.inner.state.write().await;
                        state.spots = read.data;
                        state.spots_stale = true;
                        state.resync_selection();
                    }
                    self.spawn_spots_revalidation();
                }
            },
            Err(e) => {
                warn!(error = %e, "Spot refresh failed, keeping current data");
                self.inner.state.write().await.spots_stale = true;
            }
        }
    }

    fn spawn_spots_revalidation(&self) {
        if self.inner.spots_revalidating.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let seq_at_start = inner.mutation_seq.load(Ordering::SeqCst);
            match inner.spots.fetch_fresh().await {
                Ok(fresh) => {
                    if inner.mutation_seq.load(Ordering::SeqCst) == seq_at_start {
                        let mut state = inner.state.write().await;
                        state.spots = fresh;
                        state.spots_stale = false;
                        state.resync_selection();
                    } else {
                        debug!("Discarding spot revalidation older than a local edit");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Spot revalidation failed, keeping stale data");
                }
            }
            inner.spots_revalidating.store(false, Ordering::SeqCst);
        });
    }

    /// Refresh the session collection, cache first. Same protocol as
    /// [`DomainStore::refresh_spots`].
    pub async fn refresh_sessions(&self) {
        match self.inner.sessions.get_all().await {
            Ok(read) => match read.source {
                DataSource::Network => {
                    let mut state = self.inner.state.write().await;
                    state.sessions = read.data;
                    state.sessions_stale = false;
                }
                DataSource::Cache => {
                    {
                        let mut state = self.inner.state.write().await;
                        state.sessions = read.data;
                        state.sessions_stale = true;
                    }
                    self.spawn_sessions_revalidation();
                }
            },
            Err(e) => {
                warn!(error = %e, "Session refresh failed, keeping current data");
                self.inner.state.write().await.sessions_stale = true;
            }
        }
    }

    fn spawn_sessions_revalidation(&self) {
        if self.inner.sessions_revalidating.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let seq_at_start = inner.mutation_seq.load(Ordering::SeqCst);
            match inner.sessions.fetch_fresh().await {
                Ok(fresh) => {
                    if inner.mutation_seq.load(Ordering::SeqCst) == seq_at_start {
                        let mut state = inner.state.write().await;
                        state.sessions = fresh;
                        state.sessions_stale = false;
                    } else {
                        debug!("Discarding session revalidation older than a local edit");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Session revalidation failed, keeping stale data");
                }
            }
            inner.sessions_revalidating.store(false, Ordering::SeqCst);
        });
    }

    /// Refresh the challenge collection, cache first. Same protocol as
    /// [`DomainStore::refresh_spots`].
    pub async fn refresh_challenges(&self) {
        match self.inner.challenges.get_all().await {
            Ok(read) => match read.source {
                DataSource::Network => {
                    let mut state = self.inner.state.write().await;
                    state.challenges = read.data;
                    state.challenges_stale = false;
                }
                DataSource::Cache => {
                    {
                        let mut state = self.inner.state.write().await;
                        state.challenges = read.data;
                        state.challenges_stale = true;
                    }
                    self.spawn_challenges_revalidation();
                }
            },
            Err(e) => {
                warn!(error = %e, "Challenge refresh failed, keeping current data");
                self.inner.state.write().await.challenges_stale = true;
            }
        }
    }

    fn spawn_challenges_revalidation(&self) {
        if self.inner.challenges_revalidating.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let seq_at_start = inner.mutation_seq.load(Ordering::SeqCst);
            match inner.challenges.fetch_fresh().await {
                Ok(fresh) => {
                    if inner.mutation_seq.load(Ordering::SeqCst) == seq_at_start {
                        let mut state = inner.state.write().await;
                        state.challenges = fresh;
                        state.challenges_stale = false;
                    } else {
                        debug!("Discarding challenge revalidation older than a local edit");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Challenge revalidation failed, keeping stale data");
                }
            }
            inner.challenges_revalidating.store(false, Ordering::SeqCst);
        });
    }

    // ========================================================================
    // SPOT MUTATIONS
    // ========================================================================

    /// Create a spot on the remote, then publish it locally and emit
    /// [`EventPayload::SpotAdded`]. The event fires only after the network
    /// confirms; a rejected create leaves no local trace.
    pub async fn add_spot(&self, draft: SpotDraft) -> WaymarkResult<Spot> {
        let created = self.inner.spots.create(draft).await?;
        {
            let mut state = self.inner.state.write().await;
            state.spots.push(created.clone());
        }
        self.inner.mutation_seq.fetch_add(1, Ordering::SeqCst);
        self.inner.bus.emit(EventPayload::SpotAdded {
            spot: created.clone(),
        });
        Ok(created)
    }

    /// Optimistically update a spot with undo capture and rollback.
    ///
    /// No-op if the spot is not resident. Captures the single-slot undo
    /// snapshot (discarding any prior one), applies the patch to the
    /// collection and to a matching selection, then issues the network
    /// update. On success an audit record is written best-effort. On
    /// failure the entire captured collection and selection are restored
    /// and the error surfaces to the caller.
    pub async fn update_spot(&self, id: SpotId, patch: SpotPatch) -> WaymarkResult<()> {
        let inner = &self.inner;
        let remote_patch = patch.clone();

        let applied = mutate_with_compensation(
            &inner.state,
            |state: &mut StoreState| {
                let pos = state.spots.iter().position(|s| s.spot_id == id)?;

                let prior_spots = state.spots.clone();
                let prior_selection = state.selected_spot.clone();
                let prior_snapshot = state.last_edit.take();

                state.last_edit = Some(EditSnapshot {
                    entity_id: id.as_uuid(),
                    previous: state.spots[pos].clone(),
                });
                state.spots[pos].apply(&patch);
                if let Some(selected) = state.selected_spot.as_mut() {
                    if selected.spot_id == id {
                        selected.apply(&patch);
                    }
                }
                inner.mutation_seq.fetch_add(1, Ordering::SeqCst);

                Some(Compensation::restoring(move |state: &mut StoreState| {
                    state.spots = prior_spots;
                    state.selected_spot = prior_selection;
                    state.last_edit = prior_snapshot;
                }))
            },
            || async move { inner.spots.update(id.as_uuid(), remote_patch).await },
        )
        .await?;

        if applied.is_some() {
            let patch_bytes = serde_json::to_vec(&patch).unwrap_or_default();
            inner.spots.log_edit(EditRecord::new(
                EntityKind::Spot,
                id.as_uuid(),
                "spot update",
                &patch_bytes,
            ));
        }
        Ok(())
    }

    /// Undo the most recent spot edit. One-shot and non-repeatable.
    ///
    /// Restores the snapshot into the collection and selection, clears the
    /// slot, then pushes the reverted fields to the network. If that push
    /// fails the snapshot is NOT re-applied (it has been consumed); the
    /// store forces an authoritative refresh instead, trading a visible
    /// refetch for guaranteed convergence with the server.
    pub async fn undo_last_edit(&self) -> WaymarkResult<()> {
        let previous = {
            let mut state = self.inner.state.write().await;
            let Some(snapshot) = state.last_edit.take() else {
                return Ok(());
            };
            let previous = snapshot.previous;
            match state
                .spots
                .iter()
                .position(|s| s.spot_id == previous.spot_id)
            {
                Some(pos) => state.spots[pos] = previous.clone(),
                None => state.spots.push(previous.clone()),
            }
            if state
                .selected_spot
                .as_ref()
                .is_some_and(|s| s.spot_id == previous.spot_id)
            {
                state.selected_spot = Some(previous.clone());
            }
            previous
        };
        self.inner.mutation_seq.fetch_add(1, Ordering::SeqCst);

        let revert_patch = SpotPatch {
            name: Some(previous.name.clone()),
            description: previous.description.clone(),
            latitude: Some(previous.latitude),
            longitude: Some(previous.longitude),
            traits: Some(previous.traits),
            status: Some(previous.status),
        };

        if let Err(e) = self
            .inner
            .spots
            .update(previous.spot_id.as_uuid(), revert_patch)
            .await
        {
            warn!(
                spot_id = %previous.spot_id,
                error = %e,
                "Undo push rejected, forcing authoritative refresh"
            );
            self.force_refresh_spots().await;
        }
        Ok(())
    }

    /// Set a spot's moderation status, optimistic and single-step.
    ///
    /// No snapshot is captured: a rejected verify leaves the local status
    /// changed (accepted risk for this admin-gated operation) and the
    /// error surfaces. Emits [`EventPayload::SpotVerified`] after the
    /// network confirms.
    pub async fn verify_spot(&self, id: SpotId, status: SpotStatus) -> WaymarkResult<()> {
        let found = {
            let mut state = self.inner.state.write().await;
            match state.spots.iter().position(|s| s.spot_id == id) {
                Some(pos) => {
                    state.spots[pos].status = status;
                    if let Some(selected) = state.selected_spot.as_mut() {
                        if selected.spot_id == id {
                            selected.status = status;
                        }
                    }
                    true
                }
                None => false,
            }
        };
        if !found {
            return Ok(());
        }
        self.inner.mutation_seq.fetch_add(1, Ordering::SeqCst);

        self.inner.spots.verify(id.as_uuid(), status).await?;
        self.inner
            .bus
            .emit(EventPayload::SpotVerified { spot_id: id, status });
        Ok(())
    }

    /// Remove a spot from local state.
    ///
    /// Local-only by contract: no network call is issued. Callers that
    /// intend a durable delete must follow up with an authoritative remote
    /// delete through the repository. A matching selection is cleared.
    pub async fn delete_spot(&self, id: SpotId) {
        {
            let mut state = self.inner.state.write().await;
            state.spots.retain(|s| s.spot_id != id);
            if state
                .selected_spot
                .as_ref()
                .is_some_and(|s| s.spot_id == id)
            {
                state.selected_spot = None;
            }
        }
        self.inner.mutation_seq.fetch_add(1, Ordering::SeqCst);
    }

    /// Unconditional network refresh used to reconcile after a failed undo
    /// push. Not cache-first: the point is to converge with the server.
    async fn force_refresh_spots(&self) {
        match self.inner.spots.fetch_fresh().await {
            Ok(fresh) => {
                let mut state = self.inner.state.write().await;
                state.spots = fresh;
                state.spots_stale = false;
                state.resync_selection();
            }
            Err(e) => {
                warn!(error = %e, "Authoritative refresh failed, flagging spots stale");
                self.inner.state.write().await.spots_stale = true;
            }
        }
    }

    // ========================================================================
    // SESSION AND CHALLENGE MUTATIONS
    // ========================================================================

    /// Create a session on the remote, publish it locally and emit
    /// [`EventPayload::SessionCreated`] after the network confirms.
    pub async fn create_session(&self, draft: SessionDraft) -> WaymarkResult<Session> {
        let created = self.inner.sessions.create(draft).await?;
        {
            let mut state = self.inner.state.write().await;
            state.sessions.push(created.clone());
        }
        self.inner.mutation_seq.fetch_add(1, Ordering::SeqCst);
        self.inner.bus.emit(EventPayload::SessionCreated {
            session: created.clone(),
        });
        Ok(created)
    }

    /// Optimistically mark a challenge completed, with rollback.
    ///
    /// No-op if the challenge is absent or already completed. Emits
    /// [`EventPayload::ChallengeCompleted`] only after the network
    /// confirms.
    pub async fn complete_challenge(&self, id: ChallengeId) -> WaymarkResult<()> {
        let inner = &self.inner;
        let mut completed: Option<(SpotId, u32)> = None;

        let applied = mutate_with_compensation(
            &inner.state,
            |state: &mut StoreState| {
                let pos = state
                    .challenges
                    .iter()
                    .position(|c| c.challenge_id == id)?;
                if state.challenges[pos].completed {
                    return None;
                }

                let prior = state.challenges.clone();
                state.challenges[pos].completed = true;
                completed = Some((
                    state.challenges[pos].spot_id,
                    state.challenges[pos].reward_xp,
                ));
                inner.mutation_seq.fetch_add(1, Ordering::SeqCst);

                Some(Compensation::restoring(move |state: &mut StoreState| {
                    state.challenges = prior;
                }))
            },
            || async move {
                inner
                    .challenges
                    .update(id.as_uuid(), ChallengePatch::completed())
                    .await
            },
        )
        .await?;

        if applied.is_some() {
            if let Some((spot_id, reward_xp)) = completed {
                inner.bus.emit(EventPayload::ChallengeCompleted {
                    challenge_id: id,
                    spot_id,
                    reward_xp,
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // SELECTION AND ACCESSORS
    // ========================================================================

    /// Point the selection at the resident spot with `id`, returning the
    /// selected copy. Clears the selection if the spot is not resident.
    pub async fn select_spot(&self, id: SpotId) -> Option<Spot> {
        let mut state = self.inner.state.write().await;
        let found = state.spots.iter().find(|s| s.spot_id == id).cloned();
        state.selected_spot = found.clone();
        found
    }

    pub async fn clear_selection(&self) {
        self.inner.state.write().await.selected_spot = None;
    }

    pub async fn selected_spot(&self) -> Option<Spot> {
        self.inner.state.read().await.selected_spot.clone()
    }

    pub async fn spots(&self) -> Vec<Spot> {
        self.inner.state.read().await.spots.clone()
    }

    pub async fn sessions(&self) -> Vec<Session> {
        self.inner.state.read().await.sessions.clone()
    }

    pub async fn challenges(&self) -> Vec<Challenge> {
        self.inner.state.read().await.challenges.clone()
    }

    /// Whether the spot collection is known-fresh from the network in this
    /// session (`false`) or potentially stale (`true`).
    pub async fn spots_stale(&self) -> bool {
        self.inner.state.read().await.spots_stale
    }

    pub async fn sessions_stale(&self) -> bool {
        self.inner.state.read().await.sessions_stale
    }

    pub async fn challenges_stale(&self) -> bool {
        self.inner.state.read().await.challenges_stale
    }

    /// Whether an undo slot is currently armed.
    pub async fn can_undo(&self) -> bool {
        self.inner.state.read().await.last_edit.is_some()
    }
}
