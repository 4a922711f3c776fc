//! Postgres health checks.

use crate::client::{storage_error, StoreClient};
use ingest_core::Result;
use tracing::{debug, error};

/// Check Postgres connection health.
pub async fn check_connection(client: &StoreClient) -> bool {
    match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(client.pool())
        .await
    {
        Ok(_) => {
            debug!("Postgres connection healthy");
            true
        }
        Err(e) => {
            error!("Postgres health check failed: {}", e);
            false
        }
    }
}

/// Initialize database schema.
pub async fn init_schema(client: &StoreClient) -> Result<()> {
    use crate::schema::all_tables;

    for ddl in all_tables() {
        sqlx::query(ddl)
            .execute(client.pool())
            .await
            .map_err(storage_error)?;
    }

    debug!("Postgres schema initialized");
    Ok(())
}
