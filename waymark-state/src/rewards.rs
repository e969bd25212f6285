//! Reward listener: XP grants reacting to domain events.
//!
//! The gamification side of Waymark never appears in mutation code paths.
//! It subscribes to the event bus at process start and applies grants on
//! its own. Grants are idempotent-safe in the weak sense: logically related
//! events from different code paths may each grant, and the design
//! tolerates the redundancy rather than guaranteeing exactly-once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;
use waymark_core::StoreConfig;
use waymark_events::{EventBus, EventKind, EventPayload, Subscription};

/// Running XP total for the local user.
#[derive(Debug, Default)]
pub struct RewardLedger {
    total_xp: AtomicU64,
}

impl RewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` XP. Saturates rather than wrapping.
    pub fn grant(&self, amount: u32, reason: &str) {
        let granted = self
            .total_xp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |xp| {
                Some(xp.saturating_add(u64::from(amount)))
            })
            .unwrap_or(0);
        debug!(amount, reason, total = granted + u64::from(amount), "XP granted");
    }

    /// Current XP total.
    pub fn total_xp(&self) -> u64 {
        self.total_xp.load(Ordering::SeqCst)
    }
}

/// Wire the reward listener to the bus.
///
/// Subscribes one handler per rewarded event kind and returns the
/// subscription capabilities; dropping them keeps the listener attached
/// for the life of the bus, unsubscribing detaches it.
pub fn attach_reward_listener(
    bus: &EventBus,
    ledger: Arc<RewardLedger>,
    config: &StoreConfig,
) -> Vec<Subscription> {
    let mut subscriptions = Vec::with_capacity(4);

    let spot_added_xp = config.spot_added_xp;
    let spot_verified_xp = config.spot_verified_xp;
    let session_created_xp = config.session_created_xp;
    let challenge_fallback_xp = config.challenge_completed_xp;

    let spot_ledger = Arc::clone(&ledger);
    subscriptions.push(bus.subscribe(EventKind::SpotAdded, move |_| {
        let ledger = Arc::clone(&spot_ledger);
        async move {
            ledger.grant(spot_added_xp, "spot added");
            Ok(())
        }
    }));

    let verify_ledger = Arc::clone(&ledger);
    subscriptions.push(bus.subscribe(EventKind::SpotVerified, move |_| {
        let ledger = Arc::clone(&verify_ledger);
        async move {
            ledger.grant(spot_verified_xp, "spot verified");
            Ok(())
        }
    }));

    let session_ledger = Arc::clone(&ledger);
    subscriptions.push(bus.subscribe(EventKind::SessionCreated, move |_| {
        let ledger = Arc::clone(&session_ledger);
        async move {
            ledger.grant(session_created_xp, "session created");
            Ok(())
        }
    }));

    // Challenges carry their own reward amount; the configured value only
    // covers a payload that somehow lacks one.
    subscriptions.push(bus.subscribe(EventKind::ChallengeCompleted, move |event| {
        let ledger = Arc::clone(&ledger);
        async move {
            let amount = match event.payload {
                EventPayload::ChallengeCompleted { reward_xp, .. } => reward_xp,
                _ => challenge_fallback_xp,
            };
            ledger.grant(amount, "challenge completed");
            Ok(())
        }
    }));

    subscriptions
}
