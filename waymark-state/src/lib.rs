//! Waymark State - Optimistic Domain Store
//!
//! The single process-wide state container for the Waymark client. It holds
//! the in-memory entity collections and UI-relevant derived state, performs
//! optimistic mutation with rollback-on-failure and one-shot undo, refreshes
//! collections stale-while-revalidate, and emits domain events on confirmed
//! mutations.
//!
//! # Composition Root
//!
//! Nothing in this crate is global. The application constructs everything
//! once at startup and injects it:
//!
//! ```ignore
//! let medium = Arc::new(LmdbMedium::new(cache_dir, config.max_size_mb)?);
//! let cache = Arc::new(CacheStore::new(medium, cache_config));
//! let bus = EventBus::new();
//!
//! let store = DomainStore::new(
//!     EntityRepository::new(Arc::clone(&cache), spot_boundary),
//!     EntityRepository::new(Arc::clone(&cache), session_boundary),
//!     EntityRepository::new(Arc::clone(&cache), challenge_boundary),
//!     bus.clone(),
//! );
//!
//! let ledger = Arc::new(RewardLedger::new());
//! let _subscriptions = attach_reward_listener(&bus, ledger, &StoreConfig::default());
//! ```

pub mod rewards;
pub mod snapshot;
pub mod store;

pub use rewards::{attach_reward_listener, RewardLedger};
pub use snapshot::{mutate_with_compensation, Compensation, EditSnapshot};
pub use store::DomainStore;
