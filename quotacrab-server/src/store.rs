//! Wiring of the credential store into the running server
//!
//! Given a store, [`start_backend`] spawns the admission actors that serve
//! requests and the sweeper task that resets stale windows. Both share the
//! same store and the same [`WindowPolicy`](quotacrab::WindowPolicy).

use crate::actor::{AdmissionActor, AdmissionHandle};
use crate::config::Config;
use crate::metrics::Metrics;
use crate::sweeper::spawn_sweeper_task;
use anyhow::{Context, Result};
use quotacrab::{Admission, SqliteStore, Store, Sweeper};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Running background parts of the server
pub struct Backend {
    /// Handle to the admission actors
    pub limiter: AdmissionHandle,
    /// Stops the sweeper task
    pub sweeper: CancellationToken,
}

impl Backend {
    pub fn shutdown(&self) {
        self.sweeper.cancel();
    }
}

/// Open the durable store configured for the server
///
/// # Errors
///
/// Fails when the database cannot be opened or migrated.
pub fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&config.store.db_path).with_context(|| {
        format!(
            "Failed to open credential store at {}",
            config.store.db_path.display()
        )
    })?;
    Ok(Arc::new(store))
}

/// Spawn the admission actors and the sweeper over `store`
pub fn start_backend<S: Store + 'static>(
    store: Arc<S>,
    config: &Config,
    metrics: Arc<Metrics>,
) -> Backend {
    let policy = config.quota.policy();

    let limiter = AdmissionActor::spawn(
        config.admission.shards,
        config.admission.buffer_size,
        Admission::new(Arc::clone(&store), policy),
    );
    let sweeper = spawn_sweeper_task(
        Sweeper::new(store, policy),
        config.sweeper.interval,
        metrics,
    );

    Backend { limiter, sweeper }
}
