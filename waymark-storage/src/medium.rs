//! Cache medium trait and in-memory implementation.
//!
//! The medium is a dumb namespaced string-to-string store; envelope
//! semantics (versioning, TTL, eviction policy) live one layer up in
//! [`crate::CacheStore`].

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use waymark_core::MediumError;

/// Persistent key-value medium backing the cache.
///
/// Implementations must be thread-safe. Keys are opaque strings already
/// carrying the cache namespace prefix; values are serialized envelopes.
#[async_trait]
pub trait CacheMedium: Send + Sync {
    /// Read the raw value for `key`, or `None` if absent.
    async fn read(&self, key: &str) -> Result<Option<String>, MediumError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn write(&self, key: &str, value: &str) -> Result<(), MediumError>;

    /// Delete `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), MediumError>;

    /// All keys currently present, in no particular order.
    async fn keys(&self) -> Result<Vec<String>, MediumError>;
}

/// In-memory medium for tests and ephemeral sessions.
///
/// Optionally enforces an entry limit so quota-exhaustion handling can be
/// exercised without a real constrained store.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: RwLock<HashMap<String, String>>,
    max_entries: Option<usize>,
}

impl MemoryMedium {
    /// Create an unbounded in-memory medium.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a medium that rejects writes of new keys once `max_entries`
    /// keys are present, mimicking a quota-constrained store.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: Some(max_entries),
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the medium is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheMedium for MemoryMedium {
    async fn read(&self, key: &str) -> Result<Option<String>, MediumError> {
        let entries = self.entries.read().map_err(|_| MediumError::Backend {
            reason: "medium lock poisoned".to_string(),
        })?;
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), MediumError> {
        let mut entries = self.entries.write().map_err(|_| MediumError::Backend {
            reason: "medium lock poisoned".to_string(),
        })?;
        if let Some(max) = self.max_entries {
            if entries.len() >= max && !entries.contains_key(key) {
                return Err(MediumError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), MediumError> {
        let mut entries = self.entries.write().map_err(|_| MediumError::Backend {
            reason: "medium lock poisoned".to_string(),
        })?;
        entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, MediumError> {
        let entries = self.entries.read().map_err(|_| MediumError::Backend {
            reason: "medium lock poisoned".to_string(),
        })?;
        Ok(entries.keys().cloned().collect())
    }
}
