//! Database connection management using sqlx

use crate::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// How long a request may wait for a pooled connection.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Initialize the database connection pool.
///
/// Connections are opened lazily so that a database outage at startup
/// degrades the schema context instead of aborting the process.
pub fn init_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_lazy(&config.url)?;

    info!(
        "Database pool configured (max {} connections)",
        config.max_connections
    );
    Ok(pool)
}
