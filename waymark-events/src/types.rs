//! Domain event types and payloads.
//!
//! The emission surface is a closed enumeration: a new domain event must be
//! added to [`EventKind`] and [`EventPayload`] before anything can emit or
//! subscribe to it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use waymark_core::{ChallengeId, Session, Spot, SpotId, SpotStatus, Timestamp};

/// Discriminator for domain events. Subscriptions are keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SpotAdded,
    SpotVerified,
    SessionCreated,
    ChallengeCompleted,
}

/// Typed payload carried by a domain event, one variant per [`EventKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    SpotAdded {
        spot: Spot,
    },
    SpotVerified {
        spot_id: SpotId,
        status: SpotStatus,
    },
    SessionCreated {
        session: Session,
    },
    ChallengeCompleted {
        challenge_id: ChallengeId,
        spot_id: SpotId,
        reward_xp: u32,
    },
}

impl EventPayload {
    /// The event kind this payload belongs to.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SpotAdded { .. } => EventKind::SpotAdded,
            Self::SpotVerified { .. } => EventKind::SpotVerified,
            Self::SessionCreated { .. } => EventKind::SessionCreated,
            Self::ChallengeCompleted { .. } => EventKind::ChallengeCompleted,
        }
    }
}

/// An immutable record of something that happened.
///
/// Constructed once at emission time and cloned into each handler task.
/// Events are not persisted and carry no delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique id of this emission.
    pub event_id: Uuid,
    pub kind: EventKind,
    pub payload: EventPayload,
    pub emitted_at: Timestamp,
}

impl DomainEvent {
    /// Build an event from a payload, stamping id and emission time.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            kind: payload.kind(),
            payload,
            emitted_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use waymark_core::{SpotTraits, UserId};

    fn make_spot() -> Spot {
        Spot {
            spot_id: SpotId::new(),
            name: "Plaza banks".to_string(),
            description: None,
            latitude: 40.74,
            longitude: -73.99,
            traits: SpotTraits::FREE_ACCESS,
            status: SpotStatus::Pending,
            created_by: UserId::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_payload_kind_mapping() {
        let spot = make_spot();
        assert_eq!(
            EventPayload::SpotAdded { spot: spot.clone() }.kind(),
            EventKind::SpotAdded
        );
        assert_eq!(
            EventPayload::SpotVerified {
                spot_id: spot.spot_id,
                status: SpotStatus::Verified,
            }
            .kind(),
            EventKind::SpotVerified
        );
        assert_eq!(
            EventPayload::ChallengeCompleted {
                challenge_id: ChallengeId::new(),
                spot_id: spot.spot_id,
                reward_xp: 50,
            }
            .kind(),
            EventKind::ChallengeCompleted
        );
    }

    #[test]
    fn test_event_kind_matches_payload() {
        let event = DomainEvent::new(EventPayload::SpotAdded { spot: make_spot() });
        assert_eq!(event.kind, EventKind::SpotAdded);
        assert_eq!(event.event_id.get_version_num(), 7);
    }

    #[test]
    fn test_distinct_emissions_get_distinct_ids() {
        let spot = make_spot();
        let a = DomainEvent::new(EventPayload::SpotAdded { spot: spot.clone() });
        let b = DomainEvent::new(EventPayload::SpotAdded { spot });
        assert_ne!(a.event_id, b.event_id);
    }

    #[test]
    fn test_event_serde_round_trip() {
        let event = DomainEvent::new(EventPayload::SpotVerified {
            spot_id: SpotId::new(),
            status: SpotStatus::Verified,
        });
        let json = serde_json::to_string(&event).expect("serialize should succeed");
        let back: DomainEvent = serde_json::from_str(&json).expect("deserialize should succeed");
        assert_eq!(event, back);
    }
}
