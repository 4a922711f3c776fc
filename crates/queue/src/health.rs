//! Job queue health checks.

use crate::postgres::PgJobQueue;
use tracing::{debug, error};

/// Check that the queue tables are reachable.
pub async fn check_connection(queue: &PgJobQueue) -> bool {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM job_locks")
        .fetch_one(queue.pool())
        .await
    {
        Ok(locks) => {
            debug!(locks = locks, "Job queue healthy");
            true
        }
        Err(e) => {
            error!("Job queue health check failed: {}", e);
            false
        }
    }
}
