//! Error types for Waymark sync operations
//!
//! The taxonomy mirrors the recovery policy: medium and cache failures are
//! recovered locally and rarely surface, remote mutation failures surface to
//! the caller and trigger rollback, best-effort paths log and swallow.

use crate::EntityKind;
use thiserror::Error;
use uuid::Uuid;

/// Failures of the persistent key-value medium backing the cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediumError {
    #[error("Read failed for key {key}: {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Write failed for key {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Storage quota exceeded writing key {key}")]
    QuotaExceeded { key: String },

    #[error("Medium backend error: {reason}")]
    Backend { reason: String },
}

/// Cache layer errors. These are internal: the cache store fails closed and
/// self-heals, so callers observe a miss rather than an error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Medium error: {0}")]
    Medium(#[from] MediumError),

    #[error("Serialization failed for key {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Deserialization failed for key {key}: {reason}")]
    Deserialization { key: String, reason: String },
}

/// Failures signalled by the opaque remote boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Network request failed: {reason}")]
    Network { reason: String },

    #[error("Remote rejected {operation} on {entity_kind:?} {id}: {reason}")]
    Rejected {
        operation: String,
        entity_kind: EntityKind,
        id: Uuid,
        reason: String,
    },

    #[error("{entity_kind:?} not found: {id}")]
    NotFound { entity_kind: EntityKind, id: Uuid },

    #[error("Operation not supported by this boundary: {operation}")]
    Unsupported { operation: String },

    #[error("Invalid remote payload: {reason}")]
    InvalidPayload { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level error type for all Waymark sync operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WaymarkError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl From<MediumError> for WaymarkError {
    fn from(e: MediumError) -> Self {
        Self::Cache(CacheError::Medium(e))
    }
}

/// Result type alias for Waymark sync operations.
pub type WaymarkResult<T> = Result<T, WaymarkError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display_rejected() {
        let err = RemoteError::Rejected {
            operation: "update".to_string(),
            entity_kind: EntityKind::Spot,
            id: Uuid::nil(),
            reason: "stale revision".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("update"));
        assert!(msg.contains("Spot"));
        assert!(msg.contains("stale revision"));
    }

    #[test]
    fn test_error_conversions() {
        let medium = WaymarkError::from(MediumError::QuotaExceeded {
            key: "spots.all".to_string(),
        });
        assert!(matches!(medium, WaymarkError::Cache(CacheError::Medium(_))));

        let remote = WaymarkError::from(RemoteError::Network {
            reason: "connection reset".to_string(),
        });
        assert!(matches!(remote, WaymarkError::Remote(_)));

        let config = WaymarkError::from(ConfigError::MissingRequired {
            field: "namespace".to_string(),
        });
        assert!(matches!(config, WaymarkError::Config(_)));
    }

    #[test]
    fn test_cache_error_wraps_medium_error() {
        let err = CacheError::from(MediumError::Backend {
            reason: "env closed".to_string(),
        });
        assert!(matches!(err, CacheError::Medium(_)));
        assert!(format!("{}", err).contains("env closed"));
    }
}
