pub mod postgres;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use roomsync_core::{DatabaseConfig, SyncResult};

/// Build the shared Postgres pool from configuration
pub async fn create_pool(config: &DatabaseConfig) -> SyncResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        "database pool ready"
    );

    Ok(pool)
}

/// Apply pending schema migrations. Embedded deployments run this once at
/// startup, before anything touches the pool.
pub async fn run_migrations(pool: &PgPool) -> SyncResult<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(sqlx::Error::from)?;
    info!("database migrations applied");
    Ok(())
}
