//! Postgres-backed job queue.
//!
//! Pending jobs live in `job_queue`; a worker claims one by deleting it and
//! inserting its key into `job_locks` in the same transaction. The lock stays
//! until the worker releases it or the scheduler expires it as stale.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_core::{Error, Job, Result};
use sqlx::PgPool;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::queue::{lock_cutoff, ClaimedJob, JobQueue};

type JobRow = (Uuid, String, String, i32, DateTime<Utc>);

fn queue_error(e: sqlx::Error) -> Error {
    Error::queue(e.to_string())
}

/// Job queue stored in Postgres.
#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the queue tables if missing.
    pub async fn init_schema(&self) -> Result<()> {
        for ddl in crate::schema::all_tables() {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(queue_error)?;
        }
        debug!("Job queue schema initialized");
        Ok(())
    }

    /// Takes the highest-priority pending job whose key is not locked and
    /// acquires its lock. Returns `None` when nothing is claimable.
    pub async fn claim(&self, job_name: &str) -> Result<Option<ClaimedJob>> {
        let mut tx = self.pool.begin().await.map_err(queue_error)?;

        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT id, name, key, priority, enqueued_at
            FROM job_queue j
            WHERE
                name = $1 AND
                NOT EXISTS (SELECT 1 FROM job_locks l WHERE l.key = j.key)
            ORDER BY priority DESC, enqueued_at
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(job_name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(queue_error)?;

        let Some((id, name, key, priority, enqueued_at)) = row else {
            tx.commit().await.map_err(queue_error)?;
            return Ok(None);
        };

        let locked_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            INSERT INTO job_locks (key, acquired_at) VALUES ($1, $2)
            ON CONFLICT (key) DO NOTHING
            RETURNING acquired_at
            "#,
        )
        .bind(&key)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .map_err(queue_error)?;

        let Some(locked_at) = locked_at else {
            // Another worker locked the key after our read
            tx.rollback().await.map_err(queue_error)?;
            return Ok(None);
        };

        sqlx::query("DELETE FROM job_queue WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(queue_error)?;

        tx.commit().await.map_err(queue_error)?;

        debug!(key = %key, priority = priority, "Claimed job");
        Ok(Some(ClaimedJob {
            job: Job {
                id,
                name,
                key,
                priority,
                enqueued_at,
            },
            locked_at,
        }))
    }

    /// Releases the lock for `key`. Returns whether a lock was held.
    pub async fn release(&self, key: &str) -> Result<bool> {
        let released = sqlx::query("DELETE FROM job_locks WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(queue_error)?
            .rows_affected();
        Ok(released > 0)
    }

    /// Number of pending jobs with the given name.
    pub async fn queue_depth(&self, job_name: &str) -> Result<u64> {
        let depth: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_queue WHERE name = $1")
            .bind(job_name)
            .fetch_one(&self.pool)
            .await
            .map_err(queue_error)?;
        Ok(depth as u64)
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn submit(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_queue (id, name, key, priority, enqueued_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(job.id)
        .bind(&job.name)
        .bind(&job.key)
        .bind(job.priority)
        .bind(job.enqueued_at)
        .execute(&self.pool)
        .await
        .map_err(queue_error)?;
        Ok(())
    }

    async fn pending_keys(&self, job_name: &str) -> Result<HashSet<String>> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM job_queue WHERE name = $1")
            .bind(job_name)
            .fetch_all(&self.pool)
            .await
            .map_err(queue_error)?;
        Ok(keys.into_iter().collect())
    }

    async fn is_locked(&self, key: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM job_locks WHERE key = $1)")
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(queue_error)
    }

    async fn expire_locks(&self, max_age: Duration) -> Result<Vec<String>> {
        let cutoff = lock_cutoff(Utc::now(), max_age);
        let mut keys: Vec<String> =
            sqlx::query_scalar("DELETE FROM job_locks WHERE acquired_at < $1 RETURNING key")
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await
                .map_err(queue_error)?;
        keys.sort();

        if !keys.is_empty() {
            info!(count = keys.len(), cutoff = %cutoff, "Expired stale job locks");
        }
        Ok(keys)
    }
}
