//! Postgres client wrapper.

use crate::config::StoreConfig;
use ingest_core::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Postgres client wrapper with connection pooling.
#[derive(Clone)]
pub struct StoreClient {
    pool: PgPool,
    config: StoreConfig,
}

impl StoreClient {
    /// Creates a new client. Connections are opened lazily on first use.
    pub fn new(config: StoreConfig) -> Result<Self> {
        if config.max_connections == 0 || config.max_connections < config.min_connections {
            return Err(Error::config(
                "max_connections must be > 0 and >= min_connections",
            ));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(&config.url)
            .map_err(|e| Error::config(format!("Invalid database URL: {}", e)))?;

        info!(
            max_connections = config.max_connections,
            "Created Postgres client"
        );

        Ok(Self { pool, config })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// Maps a driver error onto the storage error variant.
pub fn storage_error(e: sqlx::Error) -> Error {
    Error::storage(e.to_string())
}
