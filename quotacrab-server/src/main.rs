use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinSet;

use quotacrab_server::config::Config;
use quotacrab_server::lookup::MmdbInspectLookup;
use quotacrab_server::metrics::Metrics;
use quotacrab_server::store;
use quotacrab_server::transport::{Transport, http::HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("quotacrab={}", config.log_level).parse()?)
                .add_directive(format!("quotacrab_server={}", config.log_level).parse()?),
        )
        .init();

    let metrics = Arc::new(Metrics::new());
    let credentials = store::open_store(&config)?;
    let backend = store::start_backend(credentials, &config, Arc::clone(&metrics));

    let lookup = Arc::new(MmdbInspectLookup::new(
        config.lookup.command.clone(),
        config.lookup.database.clone(),
    ));

    let mut transport_tasks = JoinSet::new();

    let transport = HttpTransport::new(&config.http.host, config.http.port, lookup, metrics)?
        .trust_forwarded_for(config.http.trust_forwarded_for);
    let limiter = backend.limiter.clone();
    transport_tasks.spawn(async move { transport.start(limiter).await });

    tracing::info!(
        db_path = %config.store.db_path.display(),
        window_secs = config.quota.window.as_secs(),
        shards = config.admission.shards,
        "QuotaCrab server started"
    );

    let result = tokio::select! {
        joined = transport_tasks.join_next() => match joined {
            Some(Ok(Ok(()))) | None => {
                tracing::info!("Transport task completed");
                Ok(())
            }
            Some(Ok(Err(e))) => {
                tracing::error!("Transport task failed: {}", e);
                Err(e)
            }
            Some(Err(e)) => {
                tracing::error!("Transport task panicked: {}", e);
                Err(anyhow::anyhow!("Transport task panicked"))
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    };

    backend.shutdown();
    transport_tasks.shutdown().await;
    result
}
