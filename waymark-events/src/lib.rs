//! Waymark Events - In-Process Domain Event Bus
//!
//! This crate is the seam between mutating operations and the subsystems
//! that react to them (gamification, sync, UI refresh). The domain store
//! emits an event after a mutation is confirmed by the network; listeners
//! subscribe without the mutation path knowing they exist.
//!
//! # Delivery Model
//!
//! Dispatch is fire-and-forget: `emit` constructs the event synchronously,
//! then hands each registered handler its own spawned task. A handler that
//! fails or panics is logged and never affects the emitter or sibling
//! handlers. There is no replay, no persistence and no ordering guarantee
//! across handlers or event kinds. This is a process-local nervous system,
//! not a durable log.
//!
//! # Key Types
//!
//! - [`EventKind`]: the fixed enumeration of event types
//! - [`EventPayload`]: typed payload, one variant per kind
//! - [`DomainEvent`]: immutable emitted record
//! - [`EventBus`]: subscribe/emit registry
//! - [`Subscription`]: capability to deregister a handler

mod bus;
mod types;

pub use bus::{EventBus, EventHandler, HandlerFuture, Subscription};
pub use types::{DomainEvent, EventKind, EventPayload};
