//! Pending-request registry.
//!
//! A concurrent map from brokerage order identifier to a single-use
//! completion signal. The registry is the sole arbiter of the
//! at-most-one-outstanding-request-per-identifier invariant: `register` is an
//! atomic insert, `resolve` atomically removes and returns the signal, so the
//! reconciler and a timing-out caller can race on the same key without a
//! double release or a lost wakeup.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::GatewayError;

/// Outcome delivered through a completion signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// The request was accepted by the brokerage.
    Accepted,
    /// The request was rejected.
    Rejected {
        /// Rejection reason reported by the brokerage.
        reason: String,
    },
    /// The cancellation was confirmed.
    Canceled,
    /// The replacement was confirmed.
    Replaced,
}

/// Waitable half of a completion signal.
pub type AckWaiter = oneshot::Receiver<AckOutcome>;

/// Registry of in-flight order requests awaiting acknowledgement.
#[derive(Debug, Default)]
pub struct PendingRequests {
    inner: Mutex<HashMap<String, oneshot::Sender<AckOutcome>>>,
}

impl PendingRequests {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically create a fresh completion signal for `broker_id`.
    ///
    /// Must be called only after the transport has accepted the request, and
    /// under the same lock that serializes request submission, so the entry
    /// is visible to the reconciler before the caller starts waiting.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyPending` if a request is still outstanding under the
    /// same identifier.
    pub fn register(&self, broker_id: &str) -> Result<AckWaiter, GatewayError> {
        let mut inner = self.inner.lock();
        if inner.contains_key(broker_id) {
            return Err(GatewayError::AlreadyPending(broker_id.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        inner.insert(broker_id.to_string(), tx);
        Ok(rx)
    }

    /// Atomically remove and return the signal for `broker_id`.
    ///
    /// Returns `None` when no request is pending under that identifier,
    /// which is the normal case for fill events on acknowledged orders. The
    /// entry is gone before the caller fires the signal, so a duplicate
    /// event cannot complete a stale waiter.
    #[must_use]
    pub fn resolve(&self, broker_id: &str) -> Option<oneshot::Sender<AckOutcome>> {
        self.inner.lock().remove(broker_id)
    }

    /// Best-effort removal on timeout.
    ///
    /// A no-op if the reconciler already resolved the entry.
    pub fn expire(&self, broker_id: &str) {
        self.inner.lock().remove(broker_id);
    }

    /// Number of requests currently awaiting acknowledgement.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no requests are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn register_then_resolve_releases_the_waiter() {
        let registry = PendingRequests::new();
        let waiter = registry.register("a").unwrap();

        let signal = registry.resolve("a").unwrap();
        signal.send(AckOutcome::Accepted).unwrap();

        assert_eq!(waiter.await.unwrap(), AckOutcome::Accepted);
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = PendingRequests::new();
        let _waiter = registry.register("a").unwrap();

        let err = registry.register("a").unwrap_err();
        assert!(matches!(err, GatewayError::AlreadyPending(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resolve_misses_for_unknown_identifier() {
        let registry = PendingRequests::new();
        assert!(registry.resolve("missing").is_none());
    }

    #[test]
    fn entry_is_removed_before_release() {
        let registry = PendingRequests::new();
        let _waiter = registry.register("a").unwrap();

        let signal = registry.resolve("a").unwrap();
        // The entry is gone even though the signal has not fired yet, so a
        // duplicate event finds nothing to complete.
        assert!(registry.resolve("a").is_none());
        drop(signal);
    }

    #[test]
    fn expire_after_resolve_is_a_no_op() {
        let registry = PendingRequests::new();
        let _waiter = registry.register("a").unwrap();
        let _signal = registry.resolve("a").unwrap();

        registry.expire("a");
        assert!(registry.is_empty());

        // The identifier can be reused after expiry.
        let _waiter = registry.register("a").unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_resolve_and_expire_release_at_most_once() {
        for _ in 0..100 {
            let registry = Arc::new(PendingRequests::new());
            let waiter = registry.register("a").unwrap();

            let resolver = {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry
                        .resolve("a")
                        .map(|signal| signal.send(AckOutcome::Accepted))
                })
            };
            let expirer = {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.expire("a") })
            };

            let resolved = resolver.await.unwrap();
            expirer.await.unwrap();

            match resolved {
                // Resolver won the race: the waiter observes exactly one release.
                Some(sent) => {
                    sent.unwrap();
                    assert_eq!(waiter.await.unwrap(), AckOutcome::Accepted);
                }
                // Expiry won: the waiter observes a dropped sender, never a value.
                None => assert!(waiter.await.is_err()),
            }
            assert!(registry.is_empty());
        }
    }
}
