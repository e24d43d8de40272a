//! Bulk reset of stale windows
//!
//! Keys that stop sending requests keep their last window forever unless
//! something resets it. The [`Sweeper`] does that in one pass over the store,
//! independent of request traffic, using the same [`WindowPolicy`] as admission.

use super::store::{Store, StoreError};
use super::window::WindowPolicy;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result of a [`Sweeper::sweep`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The sweep ran and reset this many windows
    Completed(usize),
    /// Another sweep was still in progress; nothing was done
    Skipped,
}

impl SweepOutcome {
    /// Records affected, zero when skipped
    pub fn affected(&self) -> usize {
        match self {
            SweepOutcome::Completed(n) => *n,
            SweepOutcome::Skipped => 0,
        }
    }
}

/// Resets every stale window in a store
///
/// At most one sweep runs at a time across all clones of a sweeper; an
/// overlapping call returns [`SweepOutcome::Skipped`] immediately instead of
/// waiting.
pub struct Sweeper<S: Store> {
    store: Arc<S>,
    policy: WindowPolicy,
    running: Arc<AtomicBool>,
}

impl<S: Store> Clone for Sweeper<S> {
    fn clone(&self) -> Self {
        Sweeper {
            store: Arc::clone(&self.store),
            policy: self.policy,
            running: Arc::clone(&self.running),
        }
    }
}

impl<S: Store> Sweeper<S> {
    pub fn new(store: Arc<S>, policy: WindowPolicy) -> Self {
        Sweeper {
            store,
            policy,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reset all windows that are stale at `now`
    pub fn sweep(&self, now: i64) -> Result<SweepOutcome, StoreError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("sweep already in progress, skipping");
            return Ok(SweepOutcome::Skipped);
        }
        let _guard = RunningGuard(&self.running);

        let affected = self.store.delete_expired(now, &self.policy)?;
        Ok(SweepOutcome::Completed(affected))
    }

    /// Whether a sweep is currently in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

// Clears the in-progress flag even when the store call fails or panics
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
