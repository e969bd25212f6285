//! Compensation capture and the optimistic-mutation protocol.
//!
//! Every optimistic path follows the same shape: capture a compensating
//! action, mutate local state, issue the remote effect, and run the
//! compensation if the remote rejects. [`mutate_with_compensation`] is that
//! shape as a reusable higher-order operation, generic over the state type.

use std::future::Future;

use tokio::sync::RwLock;
use waymark_core::WaymarkResult;

/// A captured compensating action over state `S`.
///
/// Captured before the optimistic mutation is applied, run at most once if
/// the remote effect fails. The restore closure replaces whole snapshots
/// rather than merging fields, so interleaved mutations cannot leave the
/// state half-reverted.
pub struct Compensation<S> {
    restore: Box<dyn FnOnce(&mut S) + Send>,
}

impl<S> Compensation<S> {
    /// Capture a restore closure.
    pub fn restoring(restore: impl FnOnce(&mut S) + Send + 'static) -> Self {
        Self {
            restore: Box::new(restore),
        }
    }

    /// Run the compensating action.
    pub fn apply(self, state: &mut S) {
        (self.restore)(state);
    }
}

/// Single-slot undo buffer entry: the pre-mutation image of one entity.
///
/// At most one snapshot exists at a time. Capturing a new one discards the
/// previous; consuming undo clears it. Not a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSnapshot<T> {
    /// Id of the entity the snapshot belongs to.
    pub entity_id: uuid::Uuid,
    /// Entity state as it was before the edit.
    pub previous: T,
}

/// Run an optimistic mutation with automatic rollback.
///
/// `mutate` runs under the state write lock. It captures and returns the
/// compensating action, or `None` to decline (target absent), in which case
/// the remote effect is never issued and `Ok(None)` is returned. Capture
/// always precedes the mutation inside the closure, and the lock is
/// released before the remote call suspends.
///
/// On remote success the optimistic state stands and `Ok(Some(value))` is
/// returned. On remote failure the compensation runs under a fresh write
/// lock and the error propagates; the state ends as if the mutation never
/// happened.
pub async fn mutate_with_compensation<S, T, M, R, Fut>(
    state: &RwLock<S>,
    mutate: M,
    remote: R,
) -> WaymarkResult<Option<T>>
where
    S: Send + Sync,
    M: FnOnce(&mut S) -> Option<Compensation<S>>,
    R: FnOnce() -> Fut,
    Fut: Future<Output = WaymarkResult<T>>,
{
    let compensation = {
        let mut guard = state.write().await;
        mutate(&mut guard)
    };

    let Some(compensation) = compensation else {
        return Ok(None);
    };

    match remote().await {
        Ok(value) => Ok(Some(value)),
        Err(error) => {
            let mut guard = state.write().await;
            compensation.apply(&mut guard);
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_core::{RemoteError, WaymarkError};

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        value: i64,
    }

    #[tokio::test]
    async fn test_success_keeps_optimistic_state() {
        let state = RwLock::new(Counter { value: 1 });

        let result = mutate_with_compensation(
            &state,
            |counter| {
                let prior = counter.clone();
                counter.value = 2;
                Some(Compensation::restoring(move |c: &mut Counter| *c = prior))
            },
            || async { Ok(42u32) },
        )
        .await;

        assert_eq!(result.expect("should succeed"), Some(42));
        assert_eq!(state.read().await.value, 2);
    }

    #[tokio::test]
    async fn test_failure_restores_prior_state() {
        let state = RwLock::new(Counter { value: 1 });

        let result: WaymarkResult<Option<()>> = mutate_with_compensation(
            &state,
            |counter| {
                let prior = counter.clone();
                counter.value = 99;
                Some(Compensation::restoring(move |c: &mut Counter| *c = prior))
            },
            || async {
                Err(RemoteError::Network {
                    reason: "connection reset".to_string(),
                }
                .into())
            },
        )
        .await;

        assert!(matches!(result, Err(WaymarkError::Remote(_))));
        assert_eq!(state.read().await.value, 1);
    }

    #[tokio::test]
    async fn test_declined_mutation_skips_remote() {
        let state = RwLock::new(Counter { value: 1 });
        let mut remote_called = false;

        let result: WaymarkResult<Option<()>> = mutate_with_compensation(
            &state,
            |_| None,
            || {
                remote_called = true;
                async { Ok(()) }
            },
        )
        .await;

        assert_eq!(result.expect("no-op should succeed"), None);
        assert!(!remote_called);
        assert_eq!(state.read().await.value, 1);
    }
}
