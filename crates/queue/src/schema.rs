//! Postgres tables backing the job queue.

/// Pending jobs. A row is removed when a worker claims it.
pub const CREATE_JOB_QUEUE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS job_queue (
    id uuid PRIMARY KEY,
    name text NOT NULL,
    key text NOT NULL,
    priority int NOT NULL DEFAULT 0,
    enqueued_at timestamptz NOT NULL DEFAULT now()
)
"#;

pub const CREATE_JOB_QUEUE_DEQUEUE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS job_queue_dequeue
    ON job_queue (name, priority DESC, enqueued_at)
"#;

/// One row per key currently being processed.
pub const CREATE_JOB_LOCKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS job_locks (
    key text PRIMARY KEY,
    acquired_at timestamptz NOT NULL
)
"#;

/// Returns all DDL statements in dependency order.
pub fn all_tables() -> Vec<&'static str> {
    vec![
        CREATE_JOB_QUEUE_TABLE,
        CREATE_JOB_QUEUE_DEQUEUE_INDEX,
        CREATE_JOB_LOCKS_TABLE,
    ]
}
