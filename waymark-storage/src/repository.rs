//! Cache-first entity repository.
//!
//! One repository per entity type resolves "get all" requests cache-first
//! so callers can apply stale-while-revalidate, and forwards mutations to
//! the remote boundary with cache invalidation as a side effect.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;
use waymark_core::{EditRecord, SpotStatus, WaymarkResult};

use crate::remote::{RemoteBoundary, SyncableEntity};
use crate::store::CacheStore;

/// Where a repository read was satisfied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Served from the local cache; a revalidation may be warranted.
    Cache,
    /// Served from the network; fresh as of this call.
    Network,
}

/// A collection read tagged with its source.
#[derive(Debug, Clone)]
pub struct RepositoryRead<T> {
    pub data: Vec<T>,
    pub source: DataSource,
}

/// Repository for one entity type, combining the cache store with the
/// remote boundary.
pub struct EntityRepository<T: SyncableEntity> {
    cache: Arc<CacheStore>,
    remote: Arc<dyn RemoteBoundary<T>>,
}

impl<T: SyncableEntity> Clone for EntityRepository<T> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<T: SyncableEntity> EntityRepository<T> {
    pub fn new(cache: Arc<CacheStore>, remote: Arc<dyn RemoteBoundary<T>>) -> Self {
        Self { cache, remote }
    }

    fn collection_key() -> &'static str {
        T::kind().collection_key()
    }

    /// Resolve the full collection, cache first.
    ///
    /// A valid cache entry is returned immediately with
    /// [`DataSource::Cache`] so the caller can revalidate in the
    /// background. On a miss (or any read failure, which the cache store
    /// reports as a miss) the collection is fetched from the network,
    /// written back to the cache, and returned with
    /// [`DataSource::Network`].
    pub async fn get_all(&self) -> WaymarkResult<RepositoryRead<T>> {
        let key = Self::collection_key();

        if let Some(data) = self
            .cache
            .get::<Vec<T>>(key, self.cache.default_ttl())
            .await
        {
            debug!(kind = ?T::kind(), count = data.len(), "Collection served from cache");
            return Ok(RepositoryRead {
                data,
                source: DataSource::Cache,
            });
        }

        let data = self.remote.list().await?;
        self.cache.set(key, &data).await;
        debug!(kind = ?T::kind(), count = data.len(), "Collection served from network");
        Ok(RepositoryRead {
            data,
            source: DataSource::Network,
        })
    }

    /// Unconditional network fetch, writing the result back to the cache.
    /// Used to revalidate after a cache-sourced read.
    pub async fn fetch_fresh(&self) -> WaymarkResult<Vec<T>> {
        let data = self.remote.list().await?;
        self.cache.set(Self::collection_key(), &data).await;
        Ok(data)
    }

    /// Create an entity on the remote. Invalidates the cached collection on
    /// success so the next cache-first read cannot resurrect the pre-create
    /// state past its TTL.
    pub async fn create(&self, draft: T::Draft) -> WaymarkResult<T> {
        let created = self.remote.create(draft).await?;
        self.cache.remove(Self::collection_key()).await;
        Ok(created)
    }

    /// Apply a partial update on the remote. Invalidates the cached
    /// collection on success.
    pub async fn update(&self, id: Uuid, patch: T::Patch) -> WaymarkResult<()> {
        self.remote.update(id, patch).await?;
        self.cache.remove(Self::collection_key()).await;
        Ok(())
    }

    /// Set moderation status on the remote. Invalidates the cached
    /// collection on success.
    pub async fn verify(&self, id: Uuid, status: SpotStatus) -> WaymarkResult<()> {
        self.remote.verify(id, status).await?;
        self.cache.remove(Self::collection_key()).await;
        Ok(())
    }

    /// Delete on the remote. Invalidates the cached collection on success.
    pub async fn delete(&self, id: Uuid) -> WaymarkResult<()> {
        self.remote.delete(id).await?;
        self.cache.remove(Self::collection_key()).await;
        Ok(())
    }

    /// Append to the audit trail, fire-and-forget.
    ///
    /// The write happens on a spawned task; a failure is logged and never
    /// reaches the calling mutation. Must be called within a tokio runtime.
    pub fn log_edit(&self, record: EditRecord) {
        let remote = Arc::clone(&self.remote);
        tokio::spawn(async move {
            let hash = record.patch_hash_hex();
            if let Err(e) = remote.log_edit(record).await {
                warn!(error = %e, patch_hash = %hash, "Audit log write failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::RwLock;
    use waymark_core::{
        CacheConfig, EntityKind, RemoteError, Spot, SpotDraft, SpotId, SpotPatch, SpotTraits,
        UserId,
    };

    use crate::medium::MemoryMedium;

    fn make_spot(name: &str) -> Spot {
        Spot {
            spot_id: SpotId::new(),
            name: name.to_string(),
            description: None,
            latitude: 48.86,
            longitude: 2.35,
            traits: SpotTraits::default(),
            status: SpotStatus::Pending,
            created_by: UserId::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct MockSpotBoundary {
        spots: RwLock<Vec<Spot>>,
        list_calls: AtomicUsize,
        edits_logged: AtomicUsize,
        fail_log_edit: AtomicBool,
        fail_all: AtomicBool,
    }

    impl MockSpotBoundary {
        fn with_spots(spots: Vec<Spot>) -> Self {
            Self {
                spots: RwLock::new(spots),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RemoteBoundary<Spot> for MockSpotBoundary {
        async fn list(&self) -> WaymarkResult<Vec<Spot>> {
            if self.fail_all.load(Ordering::SeqCst) {
                return Err(RemoteError::Network {
                    reason: "offline".to_string(),
                }
                .into());
            }
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.spots.read().unwrap().clone())
        }

        async fn create(&self, draft: SpotDraft) -> WaymarkResult<Spot> {
            let spot = Spot {
                spot_id: SpotId::new(),
                name: draft.name,
                description: draft.description,
                latitude: draft.latitude,
                longitude: draft.longitude,
                traits: draft.traits,
                status: SpotStatus::Pending,
                created_by: draft.created_by,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.spots.write().unwrap().push(spot.clone());
            Ok(spot)
        }

        async fn update(&self, id: Uuid, patch: SpotPatch) -> WaymarkResult<()> {
            let mut spots = self.spots.write().unwrap();
            match spots.iter_mut().find(|s| s.spot_id.as_uuid() == id) {
                Some(spot) => {
                    spot.apply(&patch);
                    Ok(())
                }
                None => Err(RemoteError::NotFound {
                    entity_kind: EntityKind::Spot,
                    id,
                }
                .into()),
            }
        }

        async fn verify(&self, id: Uuid, status: SpotStatus) -> WaymarkResult<()> {
            self.update(id, SpotPatch::status(status)).await
        }

        async fn delete(&self, id: Uuid) -> WaymarkResult<()> {
            self.spots
                .write()
                .unwrap()
                .retain(|s| s.spot_id.as_uuid() != id);
            Ok(())
        }

        async fn log_edit(&self, _record: EditRecord) -> WaymarkResult<()> {
            if self.fail_log_edit.load(Ordering::SeqCst) {
                return Err(RemoteError::Network {
                    reason: "audit endpoint down".to_string(),
                }
                .into());
            }
            self.edits_logged.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn make_repository(
        boundary: Arc<MockSpotBoundary>,
    ) -> (EntityRepository<Spot>, Arc<MemoryMedium>) {
        let medium = Arc::new(MemoryMedium::new());
        let cache = Arc::new(CacheStore::new(
            Arc::clone(&medium) as Arc<dyn crate::medium::CacheMedium>,
            CacheConfig::new().with_app_version("1.0.0"),
        ));
        (EntityRepository::new(cache, boundary), medium)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_cold_read_hits_network_and_populates_cache() {
        let boundary = Arc::new(MockSpotBoundary::with_spots(vec![make_spot("A")]));
        let (repo, _medium) = make_repository(Arc::clone(&boundary));

        let first = repo.get_all().await.expect("get_all should succeed");
        assert_eq!(first.source, DataSource::Network);
        assert_eq!(first.data.len(), 1);

        let second = repo.get_all().await.expect("get_all should succeed");
        assert_eq!(second.source, DataSource::Cache);
        assert_eq!(boundary.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_read_skips_network_entirely() {
        let boundary = Arc::new(MockSpotBoundary::with_spots(vec![make_spot("A")]));
        let (repo, _medium) = make_repository(Arc::clone(&boundary));

        repo.get_all().await.expect("warm the cache");
        boundary.fail_all.store(true, Ordering::SeqCst);

        // Network is unreachable, yet the cached read still resolves.
        let read = repo.get_all().await.expect("cache should carry the read");
        assert_eq!(read.source, DataSource::Cache);
    }

    #[tokio::test]
    async fn test_fetch_fresh_overwrites_cache() {
        let boundary = Arc::new(MockSpotBoundary::with_spots(vec![make_spot("A")]));
        let (repo, _medium) = make_repository(Arc::clone(&boundary));

        repo.get_all().await.expect("warm the cache");
        boundary.spots.write().unwrap().push(make_spot("B"));

        let fresh = repo.fetch_fresh().await.expect("fetch_fresh should succeed");
        assert_eq!(fresh.len(), 2);

        let read = repo.get_all().await.expect("get_all should succeed");
        assert_eq!(read.source, DataSource::Cache);
        assert_eq!(read.data.len(), 2);
    }

    #[tokio::test]
    async fn test_update_invalidates_cached_collection() {
        let spot = make_spot("A");
        let id = spot.spot_id.as_uuid();
        let boundary = Arc::new(MockSpotBoundary::with_spots(vec![spot]));
        let (repo, _medium) = make_repository(Arc::clone(&boundary));

        repo.get_all().await.expect("warm the cache");
        repo.update(id, SpotPatch::rename("A2"))
            .await
            .expect("update should succeed");

        let read = repo.get_all().await.expect("get_all should succeed");
        assert_eq!(read.source, DataSource::Network);
        assert_eq!(read.data[0].name, "A2");
    }

    #[tokio::test]
    async fn test_update_missing_id_surfaces_not_found() {
        let boundary = Arc::new(MockSpotBoundary::default());
        let (repo, _medium) = make_repository(boundary);

        let result = repo.update(Uuid::now_v7(), SpotPatch::rename("X")).await;
        assert!(matches!(
            result,
            Err(waymark_core::WaymarkError::Remote(RemoteError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_log_edit_failure_never_surfaces() {
        let boundary = Arc::new(MockSpotBoundary::default());
        boundary.fail_log_edit.store(true, Ordering::SeqCst);
        let (repo, _medium) = make_repository(Arc::clone(&boundary));

        let record = EditRecord::new(EntityKind::Spot, Uuid::now_v7(), "rename", b"{}");
        repo.log_edit(record);
        settle().await;

        assert_eq!(boundary.edits_logged.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_log_edit_reaches_boundary() {
        let boundary = Arc::new(MockSpotBoundary::default());
        let (repo, _medium) = make_repository(Arc::clone(&boundary));

        let record = EditRecord::new(EntityKind::Spot, Uuid::now_v7(), "rename", b"{}");
        repo.log_edit(record);
        settle().await;

        assert_eq!(boundary.edits_logged.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_verify_routes_through_boundary() {
        let spot = make_spot("A");
        let id = spot.spot_id.as_uuid();
        let boundary = Arc::new(MockSpotBoundary::with_spots(vec![spot]));
        let (repo, _medium) = make_repository(Arc::clone(&boundary));

        repo.verify(id, SpotStatus::Verified)
            .await
            .expect("verify should succeed");

        assert_eq!(
            boundary.spots.read().unwrap()[0].status,
            SpotStatus::Verified
        );
    }
}
