//! Startup sequence.
//!
//! Order matters: the pool is connected and the schema migrated before the
//! listener is bound, so the service never accepts a request it cannot serve.

use crate::config::Config;
use crate::lifecycle::Application;
use crate::ServerError;
use std::sync::Arc;
use ticket_inventory_postgres::PostgresInventoryStore;
use ticket_inventory_runtime::metrics::MetricsServer;
use ticket_inventory_runtime::{RetryPolicy, listen_for_os_signals};
use tracing::info;

/// Connect to the database and apply migrations.
///
/// # Errors
///
/// Returns [`ServerError::Store`] if the database is unreachable or a
/// migration fails.
pub async fn init_store(config: &Config) -> Result<PostgresInventoryStore, ServerError> {
    info!(
        max_connections = config.postgres.max_connections,
        "Connecting to PostgreSQL"
    );
    let retry = RetryPolicy::builder()
        .max_retries(config.server.purchase_max_retries)
        .build();
    let store = PostgresInventoryStore::connect(&config.postgres)
        .await?
        .with_retry_policy(retry);

    store.migrate().await?;
    info!("✓ Schema ready");
    Ok(store)
}

/// Run the service until a quit signal arrives and shutdown completes.
///
/// # Errors
///
/// Returns [`ServerError`] for any startup failure, or if the listener fails
/// while serving.
pub async fn run(config: Config) -> Result<(), ServerError> {
    if let Some(addr) = config.metrics_addr {
        MetricsServer::new(addr).start()?;
    }

    let store = init_store(&config).await?;

    let app = Application::bind(
        &config.server.bind_addr(),
        Arc::new(store),
        config.server.shutdown_timeout,
    )
    .await?
    .with_request_timeout(config.server.request_timeout);
    info!(address = %app.local_addr()?, "✓ Listener bound");

    listen_for_os_signals(app.shutdown_signal());
    app.run().await
}
