//! Admission decisions for a single request
//!
//! This module provides the [`Admission`] engine, which turns a presented key and
//! the current time into a [`Decision`]. All state changes go through the store's
//! atomic [`cas_increment_or_reset`](crate::Store::cas_increment_or_reset)
//! primitive, so there is no read-then-write gap for concurrent requests to race in.

use super::store::{Store, StoreError};
use super::window::WindowPolicy;
use std::fmt;
use std::sync::Arc;

/// Why a request was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No key was presented
    Unauthenticated,
    /// The key does not belong to any credential
    InvalidKey,
    /// The credential used up its quota for the current window
    QuotaExceeded,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Unauthenticated => write!(f, "API key required"),
            RejectReason::InvalidKey => write!(f, "Invalid API key"),
            RejectReason::QuotaExceeded => write!(f, "Rate limit exceeded"),
        }
    }
}

/// Result of an admission check
///
/// # Response Interpretation
///
/// - `Admitted`: one unit of quota has been consumed and committed; the request
///   may proceed. This is final even if the downstream work fails.
/// - `Rejected`: nothing was consumed. `reset_at` is set for
///   [`RejectReason::QuotaExceeded`].
/// - `Error`: the store failed. The request was neither admitted nor denied and
///   callers must fail closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admitted {
        /// Quota ceiling of the credential
        limit: i64,
        /// Quota left in the current window after this request
        remaining: i64,
        /// End of the current window (ms since epoch)
        reset_at: i64,
    },
    Rejected {
        reason: RejectReason,
        /// End of the current window, when known
        reset_at: Option<i64>,
    },
    Error(String),
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }
}

/// Fixed-window admission engine
///
/// Cheap to clone; clones share the same store.
///
/// # Example
///
/// ```
/// use quotacrab::{Admission, Decision, MemoryStore, RejectReason, Store, WindowPolicy};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let store = Arc::new(MemoryStore::new());
/// store.create("k", "svc", 1, 0).unwrap();
/// let admission = Admission::new(store, WindowPolicy::new(Duration::from_secs(60)));
///
/// assert!(admission.admit(Some("k"), 10).is_admitted());
/// assert_eq!(
///     admission.admit(Some("k"), 20),
///     Decision::Rejected { reason: RejectReason::QuotaExceeded, reset_at: Some(60_000) }
/// );
/// assert_eq!(
///     admission.admit(None, 20),
///     Decision::Rejected { reason: RejectReason::Unauthenticated, reset_at: None }
/// );
/// ```
pub struct Admission<S: Store> {
    store: Arc<S>,
    policy: WindowPolicy,
}

impl<S: Store> Clone for Admission<S> {
    fn clone(&self) -> Self {
        Admission {
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }
}

impl<S: Store> Admission<S> {
    /// Create an engine over `store` using `policy` for window expiry
    pub fn new(store: Arc<S>, policy: WindowPolicy) -> Self {
        Admission { store, policy }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Decide whether the request presenting `key` at `now` is admitted
    ///
    /// A missing or empty key is rejected as
    /// [`Unauthenticated`](RejectReason::Unauthenticated) without consulting the
    /// store. Storage failures are never retried here; they come back as
    /// [`Decision::Error`].
    pub fn admit(&self, key: Option<&str>, now: i64) -> Decision {
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            return Decision::Rejected {
                reason: RejectReason::Unauthenticated,
                reset_at: None,
            };
        };

        match self.store.cas_increment_or_reset(key, now, &self.policy) {
            Ok(outcome) => {
                let reset_at = self.policy.reset_at(outcome.window_start);
                if outcome.admitted {
                    Decision::Admitted {
                        limit: outcome.limit,
                        remaining: (outcome.limit - outcome.count).max(0),
                        reset_at,
                    }
                } else {
                    Decision::Rejected {
                        reason: RejectReason::QuotaExceeded,
                        reset_at: Some(reset_at),
                    }
                }
            }
            Err(StoreError::NotFound) => Decision::Rejected {
                reason: RejectReason::InvalidKey,
                reset_at: None,
            },
            Err(e) => {
                tracing::error!(error = %e, "admission check failed");
                Decision::Error(e.to_string())
            }
        }
    }
}
