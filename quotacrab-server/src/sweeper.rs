//! Background sweep of stale quota windows
//!
//! Periodically resets windows that expired without further traffic so the
//! stored counters reflect reality for every credential.
//!
//! # Design
//!
//! - Runs on a fixed interval (default: one hour)
//! - Missed ticks are skipped, never bunched up
//! - The store pass runs on the blocking pool
//! - Uses CancellationToken for graceful shutdown

use crate::metrics::Metrics;
use quotacrab::{Store, SweepOutcome, Sweeper, clock};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawn the sweep loop
///
/// Returns a CancellationToken that stops the task.
pub fn spawn_sweeper_task<S: Store + 'static>(
    sweeper: Sweeper<S>,
    every: Duration,
    metrics: Arc<Metrics>,
) -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    tokio::spawn(async move {
        run_sweep_loop(sweeper, every, metrics, cancel_clone).await;
    });

    cancel
}

async fn run_sweep_loop<S: Store + 'static>(
    sweeper: Sweeper<S>,
    every: Duration,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!(interval_secs = every.as_secs(), "Sweeper task started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Sweeper task shutting down");
                break;
            }
            _ = ticker.tick() => {
                run_sweep_iteration(&sweeper, &metrics).await;
            }
        }
    }
}

/// Run a single sweep at the current time
pub(crate) async fn run_sweep_iteration<S: Store + 'static>(
    sweeper: &Sweeper<S>,
    metrics: &Metrics,
) -> Option<SweepOutcome> {
    let sweeper = sweeper.clone();
    let now = clock::now_millis();

    match tokio::task::spawn_blocking(move || sweeper.sweep(now)).await {
        Ok(Ok(outcome @ SweepOutcome::Completed(reset))) => {
            metrics.record_sweep(reset);
            if reset > 0 {
                info!(reset, "Sweep completed");
            } else {
                debug!("Sweep: no stale windows");
            }
            Some(outcome)
        }
        Ok(Ok(SweepOutcome::Skipped)) => {
            metrics.record_sweep_skipped();
            debug!("Sweep skipped, previous sweep still running");
            Some(SweepOutcome::Skipped)
        }
        Ok(Err(e)) => {
            metrics.record_sweep_failure();
            warn!(error = %e, "Sweep failed");
            None
        }
        Err(e) => {
            metrics.record_sweep_failure();
            warn!(error = %e, "Sweep task panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotacrab::{MemoryStore, WindowPolicy};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_iteration_resets_stale_windows() {
        let store = Arc::new(MemoryStore::new());
        store.create("stale", "stale", 2, 0).unwrap();
        store
            .create("fresh", "fresh", 2, clock::now_millis())
            .unwrap();
        let sweeper = Sweeper::new(
            Arc::clone(&store),
            WindowPolicy::new(Duration::from_secs(60)),
        );
        let metrics = Metrics::new();

        let outcome = run_sweep_iteration(&sweeper, &metrics).await;
        assert_eq!(outcome, Some(SweepOutcome::Completed(1)));
        assert_eq!(metrics.windows_reset.load(Ordering::Relaxed), 1);
        assert!(store.get("stale").unwrap().window_start > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_runs_until_cancelled() {
        let store = Arc::new(MemoryStore::new());
        let sweeper = Sweeper::new(store, WindowPolicy::new(Duration::from_secs(60)));
        let metrics = Arc::new(Metrics::new());

        let cancel =
            spawn_sweeper_task(sweeper, Duration::from_secs(3600), Arc::clone(&metrics));

        // First tick fires immediately, the next one an hour later
        tokio::time::sleep(Duration::from_secs(3600 + 1)).await;
        while metrics.sweeps_completed.load(Ordering::Relaxed) < 2 {
            tokio::task::yield_now().await;
        }

        cancel.cancel();
        assert!(cancel.is_cancelled());
    }
}
