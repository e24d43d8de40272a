//! Fixed-window expiry rule
//!
//! This module provides [`WindowPolicy`], the single place where window expiry and
//! the admit/increment arithmetic are defined. Both stores evaluate requests through
//! [`WindowPolicy::evaluate`] and the sweeper selects stale windows through
//! [`WindowPolicy::is_expired`], so the request path and the sweep path can never
//! disagree about when a window is over.

use super::clock::duration_millis;
use std::time::Duration;

/// Whether a window that began at `window_start` is stale at `now`
///
/// A window is stale once strictly more than `window` has elapsed:
/// `now - window_start > window`. All arguments are milliseconds since the epoch
/// except `window`.
///
/// # Example
///
/// ```
/// use quotacrab::core::window::is_expired;
/// use std::time::Duration;
///
/// let window = Duration::from_millis(100);
/// assert!(!is_expired(1_000, 1_100, window));
/// assert!(is_expired(1_000, 1_101, window));
/// ```
pub fn is_expired(window_start: i64, now: i64, window: Duration) -> bool {
    now.saturating_sub(window_start) > duration_millis(window)
}

/// Usage counters of one credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    /// Maximum admitted requests per window
    pub limit: i64,
    /// Requests admitted in the current window
    pub count: i64,
    /// Start of the current window (ms since epoch)
    pub window_start: i64,
}

/// Result of evaluating one request against a credential's usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// Whether the request is admitted
    pub admitted: bool,
    /// Usage after the request (reset and/or incremented)
    pub usage: Usage,
    /// Whether `usage` differs from the stored state and must be written back
    pub dirty: bool,
}

/// Fixed window duration shared by admission and sweeping
///
/// Built once from configuration and passed explicitly to the
/// [`Admission`](crate::Admission) engine and the [`Sweeper`](crate::Sweeper).
///
/// # Example
///
/// ```
/// use quotacrab::{Usage, WindowPolicy};
/// use std::time::Duration;
///
/// let policy = WindowPolicy::new(Duration::from_secs(60));
/// let usage = Usage { limit: 2, count: 2, window_start: 0 };
///
/// // Quota exhausted inside the window
/// assert!(!policy.evaluate(usage, 30_000).admitted);
///
/// // Window over: reset first, then admit
/// let eval = policy.evaluate(usage, 60_001);
/// assert!(eval.admitted);
/// assert_eq!(eval.usage.count, 1);
/// assert_eq!(eval.usage.window_start, 60_001);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    duration: Duration,
}

impl WindowPolicy {
    /// Create a policy with the given window duration
    pub fn new(duration: Duration) -> Self {
        WindowPolicy { duration }
    }

    /// The window duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The window duration in milliseconds
    pub fn duration_millis(&self) -> i64 {
        duration_millis(self.duration)
    }

    /// Whether a window that began at `window_start` is stale at `now`
    pub fn is_expired(&self, window_start: i64, now: i64) -> bool {
        is_expired(window_start, now, self.duration)
    }

    /// The instant at which a window that began at `window_start` ends
    pub fn reset_at(&self, window_start: i64) -> i64 {
        window_start.saturating_add(self.duration_millis())
    }

    /// Evaluate one request at `now` against stored usage
    ///
    /// The stale-window reset happens before the limit comparison, so a request
    /// arriving right after the boundary is judged against the new, empty window.
    /// A rejected request inside a live window leaves the usage untouched.
    pub fn evaluate(&self, usage: Usage, now: i64) -> Evaluation {
        let mut next = usage;
        let mut dirty = false;

        if self.is_expired(usage.window_start, now) {
            next.count = 0;
            next.window_start = now;
            dirty = true;
        }

        if next.count < next.limit {
            next.count += 1;
            return Evaluation {
                admitted: true,
                usage: next,
                dirty: true,
            };
        }

        Evaluation {
            admitted: false,
            usage: next,
            dirty,
        }
    }
}
