//! Waymark Storage - Cache Envelope, Media and Repositories
//!
//! This crate owns everything between the domain store and the outside
//! world: the versioned TTL-aware cache over a persistent key-value medium,
//! the opaque remote boundary trait, and the per-entity repositories that
//! resolve reads cache-first.
//!
//! # Design Philosophy
//!
//! The cache is allowed to outlive the application code that wrote it. Every
//! value is wrapped in a [`CacheEnvelope`] stamped with the writing app
//! version, so a release with incompatible shapes invalidates old entries on
//! read instead of handing them to logic typed against the new schema. Reads
//! fail closed: any corrupt, foreign-version or expired entry is evicted and
//! reported as a miss, never as an error.

pub mod envelope;
pub mod lmdb;
pub mod medium;
pub mod remote;
pub mod repository;
pub mod store;

pub use envelope::CacheEnvelope;
pub use lmdb::{LmdbMedium, LmdbMediumError};
pub use medium::{CacheMedium, MemoryMedium};
pub use remote::{RemoteBoundary, SyncableEntity};
pub use repository::{DataSource, EntityRepository, RepositoryRead};
pub use store::CacheStore;
