//! Versioned, TTL-aware cache store.
//!
//! `CacheStore` wraps a [`CacheMedium`] with envelope semantics: every write
//! is stamped with the current app version and wall-clock time, every read
//! validates the envelope before handing data out. Reads fail closed and
//! self-heal: a corrupt, foreign-version or expired entry is evicted as a
//! side effect and reported as a miss. Writes are best-effort: a medium
//! failure is logged and swallowed so the calling mutation proceeds.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use waymark_core::CacheConfig;

use crate::envelope::CacheEnvelope;
use crate::medium::CacheMedium;

/// Envelope cache over a persistent key-value medium.
pub struct CacheStore {
    medium: Arc<dyn CacheMedium>,
    config: CacheConfig,
}

impl CacheStore {
    /// Create a store over `medium` using `config` for namespace, version
    /// stamping and default TTL.
    pub fn new(medium: Arc<dyn CacheMedium>, config: CacheConfig) -> Self {
        Self { medium, config }
    }

    /// The configured default TTL for collection reads.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.config.default_ttl
    }

    /// The cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.config.namespace, key)
    }

    /// Read and validate the entry for `key`.
    ///
    /// Returns `None` on miss, medium read failure, deserialization
    /// failure, app-version mismatch or TTL expiry. Every failure mode
    /// except a plain miss also evicts the offending entry, so a single
    /// corrupt read self-heals the cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, ttl: Option<Duration>) -> Option<T> {
        let full_key = self.namespaced(key);

        let raw = match self.medium.read(&full_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache read failed, treating as miss");
                self.evict(&full_key).await;
                return None;
            }
        };

        let envelope: CacheEnvelope<T> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(key = %full_key, error = %e, "Corrupt cache entry, evicting");
                self.evict(&full_key).await;
                return None;
            }
        };

        if !envelope.is_valid(&self.config.app_version, ttl, Utc::now()) {
            debug!(
                key = %full_key,
                entry_version = %envelope.app_version,
                "Stale or foreign-version cache entry, evicting"
            );
            self.evict(&full_key).await;
            return None;
        }

        Some(envelope.into_data())
    }

    /// Write `data` under `key`, stamped with the current time and app
    /// version. Failures are logged and swallowed; other keys are never
    /// affected by a failed write.
    pub async fn set<T: Serialize>(&self, key: &str, data: &T) {
        let full_key = self.namespaced(key);
        let envelope = CacheEnvelope::stamp(data, self.config.app_version.as_str(), Utc::now());

        let raw = match serde_json::to_string(&envelope) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache serialization failed, skipping write");
                return;
            }
        };

        if let Err(e) = self.medium.write(&full_key, &raw).await {
            warn!(key = %full_key, error = %e, "Cache write failed, continuing without cache");
        }
    }

    /// Remove the entry for `key`, if present.
    pub async fn remove(&self, key: &str) {
        let full_key = self.namespaced(key);
        self.evict(&full_key).await;
    }

    /// Remove every entry under this store's namespace prefix. Foreign keys
    /// sharing the medium are left untouched.
    pub async fn clear(&self) {
        let prefix = format!("{}:", self.config.namespace);

        let keys = match self.medium.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Cache clear failed to list keys");
                return;
            }
        };

        for key in keys.iter().filter(|k| k.starts_with(&prefix)) {
            self.evict(key).await;
        }
    }

    async fn evict(&self, full_key: &str) {
        if let Err(e) = self.medium.delete(full_key).await {
            warn!(key = %full_key, error = %e, "Cache eviction failed");
        }
    }
}
