//! Publish/subscribe registry with isolated handler dispatch.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};
use waymark_core::WaymarkResult;

use crate::types::{DomainEvent, EventKind, EventPayload};

/// Future returned by an event handler.
pub type HandlerFuture = BoxFuture<'static, WaymarkResult<()>>;

/// A registered event handler. Invoked once per matching emission, each
/// invocation in its own spawned task.
pub type EventHandler = Arc<dyn Fn(DomainEvent) -> HandlerFuture + Send + Sync>;

struct Registration {
    id: u64,
    handler: EventHandler,
}

struct BusInner {
    handlers: RwLock<HashMap<EventKind, Vec<Registration>>>,
    next_id: AtomicU64,
}

/// In-process event bus keyed by [`EventKind`].
///
/// Cloning the bus is cheap and every clone shares the same registry, so a
/// single bus constructed at the composition root can be handed to the
/// domain store and every listener.
///
/// # Failure Semantics
///
/// A handler that returns an error or panics is a reporting-only failure:
/// it is logged and never reaches the emitter or the other handlers for the
/// same emission. `emit` must be called from within a tokio runtime.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new bus with an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register `handler` for `kind`.
    ///
    /// Multiple handlers per kind are allowed; registration order implies
    /// no delivery order. The returned [`Subscription`] is the capability
    /// to deregister; dropping it without calling
    /// [`Subscription::unsubscribe`] leaves the handler registered for the
    /// life of the bus.
    pub fn subscribe<F, Fut>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WaymarkResult<()>> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let handler: EventHandler = Arc::new(move |event| handler(event).boxed());

        if let Ok(mut handlers) = self.inner.handlers.write() {
            handlers
                .entry(kind)
                .or_default()
                .push(Registration { id, handler });
        }

        Subscription {
            kind,
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Construct a [`DomainEvent`] from `payload` and dispatch it to every
    /// handler currently registered for its kind.
    ///
    /// The event is built synchronously; handlers run in spawned tasks and
    /// the emitter never waits for them.
    pub fn emit(&self, payload: EventPayload) {
        let event = DomainEvent::new(payload);

        let snapshot: Vec<EventHandler> = match self.inner.handlers.read() {
            Ok(handlers) => handlers
                .get(&event.kind)
                .map(|regs| regs.iter().map(|r| Arc::clone(&r.handler)).collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        };

        debug!(kind = ?event.kind, handlers = snapshot.len(), "Emitting domain event");

        for handler in snapshot {
            let event = event.clone();
            let kind = event.kind;
            tokio::spawn(async move {
                // The async block defers the handler call into the polled
                // future, so even a synchronous panic lands in catch_unwind.
                let isolated = AssertUnwindSafe(async move { handler(event).await });
                match isolated.catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(kind = ?kind, error = %e, "Event handler failed");
                    }
                    Err(_) => {
                        warn!(kind = ?kind, "Event handler panicked");
                    }
                }
            });
        }
    }

    /// Number of handlers currently registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner
            .handlers
            .read()
            .map(|handlers| handlers.get(&kind).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability to deregister a handler from the bus.
///
/// Holds only a weak reference: a subscription outliving the bus is inert.
#[must_use = "dropping a Subscription leaves the handler registered forever"]
pub struct Subscription {
    kind: EventKind,
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Remove the handler this subscription refers to.
    ///
    /// Emissions already dispatched keep their handler snapshot; this only
    /// affects later emissions.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.bus.upgrade() {
            if let Ok(mut handlers) = inner.handlers.write() {
                if let Some(regs) = handlers.get_mut(&self.kind) {
                    regs.retain(|r| r.id != self.id);
                }
            }
        }
    }

    /// The event kind this subscription is registered under.
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use waymark_core::{SpotId, SpotStatus, WaymarkError};

    fn verified_payload() -> EventPayload {
        EventPayload::SpotVerified {
            spot_id: SpotId::new(),
            status: SpotStatus::Verified,
        }
    }

    async fn recv_one(rx: &mut mpsc::UnboundedReceiver<DomainEvent>) -> DomainEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("handler should run before timeout")
            .expect("channel should stay open")
    }

    /// Let spawned handler tasks run to completion on the current runtime.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_subscribe_emit_delivers_event() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _sub = bus.subscribe(EventKind::SpotVerified, move |event| {
            let tx = tx.clone();
            async move {
                tx.send(event).ok();
                Ok(())
            }
        });

        bus.emit(verified_payload());

        let event = recv_one(&mut rx).await;
        assert_eq!(event.kind, EventKind::SpotVerified);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sub = bus.subscribe(EventKind::SpotVerified, move |event| {
            let tx = tx.clone();
            async move {
                tx.send(event).ok();
                Ok(())
            }
        });

        bus.emit(verified_payload());
        let first = recv_one(&mut rx).await;

        sub.unsubscribe();
        bus.emit(verified_payload());
        settle().await;

        // Exactly one delivery: the emit between subscribe and unsubscribe.
        assert!(rx.try_recv().is_err());
        assert_eq!(first.kind, EventKind::SpotVerified);
        assert_eq!(bus.handler_count(EventKind::SpotVerified), 0);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_affect_sibling() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _failing = bus.subscribe(EventKind::SpotVerified, |_| async {
            Err(WaymarkError::Internal {
                reason: "listener exploded".to_string(),
            })
        });
        let _ok = bus.subscribe(EventKind::SpotVerified, move |event| {
            let tx = tx.clone();
            async move {
                tx.send(event).ok();
                Ok(())
            }
        });

        bus.emit(verified_payload());

        // The failing handler is logged and swallowed; the healthy one runs.
        let event = recv_one(&mut rx).await;
        assert_eq!(event.kind, EventKind::SpotVerified);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_isolated() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _panicking = bus.subscribe(EventKind::SpotVerified, |event| async move {
            // Always fails: emission ids are never nil.
            assert!(event.event_id.is_nil(), "handler bug");
            Ok(())
        });
        let _ok = bus.subscribe(EventKind::SpotVerified, move |event| {
            let tx = tx.clone();
            async move {
                tx.send(event).ok();
                Ok(())
            }
        });

        bus.emit(verified_payload());

        let event = recv_one(&mut rx).await;
        assert_eq!(event.kind, EventKind::SpotVerified);
    }

    #[tokio::test]
    async fn test_emit_with_no_handlers_is_noop() {
        let bus = EventBus::new();
        bus.emit(verified_payload());
        settle().await;
        assert_eq!(bus.handler_count(EventKind::SpotVerified), 0);
    }

    #[tokio::test]
    async fn test_handlers_only_receive_their_kind() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _sub = bus.subscribe(EventKind::ChallengeCompleted, move |event| {
            let tx = tx.clone();
            async move {
                tx.send(event).ok();
                Ok(())
            }
        });

        bus.emit(verified_payload());
        settle().await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clones_share_registry() {
        let bus = EventBus::new();
        let clone = bus.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _sub = clone.subscribe(EventKind::SpotVerified, move |event| {
            let tx = tx.clone();
            async move {
                tx.send(event).ok();
                Ok(())
            }
        });

        bus.emit(verified_payload());
        let event = recv_one(&mut rx).await;
        assert_eq!(event.kind, EventKind::SpotVerified);
    }
}
