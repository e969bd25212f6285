//! Configuration types
//!
//! All construction is explicit: the composition root builds these once at
//! startup and injects them. There are no globals and no hidden defaults
//! read from the environment.

use crate::{ConfigError, WaymarkResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the cache store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Namespace prefix for every persisted key. Clearing the cache only
    /// touches keys under this prefix, never foreign data in the medium.
    pub namespace: String,
    /// Application version stamped into every envelope. An envelope written
    /// by a different version is treated as a miss and evicted.
    pub app_version: String,
    /// Default TTL applied to collection reads when the caller does not
    /// specify one. `None` disables age-based expiry.
    pub default_ttl: Option<Duration>,
    /// Upper bound for the LMDB map size, in megabytes.
    pub max_size_mb: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "waymark".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            default_ttl: Some(Duration::from_secs(15 * 60)),
            max_size_mb: 64,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key namespace prefix.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the application version stamped into envelopes.
    pub fn with_app_version(mut self, app_version: impl Into<String>) -> Self {
        self.app_version = app_version.into();
        self
    }

    /// Set the default TTL for collection reads.
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the maximum medium size in megabytes.
    pub fn with_max_size(mut self, max_size_mb: usize) -> Self {
        self.max_size_mb = max_size_mb;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> WaymarkResult<()> {
        if self.namespace.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "namespace".to_string(),
            }
            .into());
        }
        if self.app_version.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "app_version".to_string(),
            }
            .into());
        }
        if self.max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_size_mb".to_string(),
                value: "0".to_string(),
                reason: "max_size_mb must be positive".to_string(),
            }
            .into());
        }
        if let Some(ttl) = self.default_ttl {
            if ttl.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: "default_ttl".to_string(),
                    value: format!("{:?}", ttl),
                    reason: "default_ttl must be positive when set".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Configuration for the domain store and its listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// XP granted when a new spot is accepted.
    pub spot_added_xp: u32,
    /// XP granted when a session is created.
    pub session_created_xp: u32,
    /// XP granted when a challenge is completed.
    pub challenge_completed_xp: u32,
    /// XP granted when a spot passes verification.
    pub spot_verified_xp: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            spot_added_xp: 25,
            session_created_xp: 10,
            challenge_completed_xp: 50,
            spot_verified_xp: 15,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spot_added_xp(mut self, xp: u32) -> Self {
        self.spot_added_xp = xp;
        self
    }

    pub fn with_session_created_xp(mut self, xp: u32) -> Self {
        self.session_created_xp = xp;
        self
    }

    pub fn with_challenge_completed_xp(mut self, xp: u32) -> Self {
        self.challenge_completed_xp = xp;
        self
    }

    pub fn with_spot_verified_xp(mut self, xp: u32) -> Self {
        self.spot_verified_xp = xp;
        self
    }
}
