//! Common test setup functions.

use queue::PgJobQueue;
use std::sync::Arc;
use store::{StoreClient, StoreConfig};
use uuid::Uuid;

use crate::containers::TestContainers;

/// Test context with a fresh database on a real Postgres server.
///
/// Every context creates its own database, so tests sharing one server
/// (through `WEATHER_TEST_DATABASE_URL`) do not see each other's rows.
pub struct TestContext {
    pub containers: TestContainers,
    pub store: Arc<StoreClient>,
    pub queue: Arc<PgJobQueue>,
    pub database: String,
}

impl TestContext {
    /// Create a new test context with both schemas initialized.
    pub async fn new() -> Self {
        Self::build(true).await
    }

    /// Create a test context with only the weather schema; the job queue
    /// tables do not exist.
    pub async fn without_queue() -> Self {
        Self::build(false).await
    }

    async fn build(with_queue: bool) -> Self {
        let containers = TestContainers::start().await;

        let database = format!("weather_test_{}", Uuid::new_v4().simple());
        let admin = sqlx::PgPool::connect(&containers.postgres_url)
            .await
            .expect("Failed to connect to Postgres");
        sqlx::query(&format!("CREATE DATABASE {}", database))
            .execute(&admin)
            .await
            .expect("Failed to create test database");
        admin.close().await;

        let config = StoreConfig {
            url: database_url(&containers.postgres_url, &database),
            max_connections: 5,
            ..StoreConfig::default()
        };
        let store = Arc::new(StoreClient::new(config).expect("Failed to create Postgres client"));

        store::health::init_schema(&store)
            .await
            .expect("Failed to initialize schema");

        let queue = Arc::new(PgJobQueue::new(store.pool().clone()));
        if with_queue {
            queue
                .init_schema()
                .await
                .expect("Failed to initialize queue schema");
        }

        Self {
            containers,
            store,
            queue,
            database,
        }
    }

    /// Inserts a job lock as a worker would, acquired at `acquired_at`.
    pub async fn lock_at(&self, key: &str, acquired_at: chrono::DateTime<chrono::Utc>) {
        sqlx::query("INSERT INTO job_locks (key, acquired_at) VALUES ($1, $2)")
            .bind(key)
            .bind(acquired_at)
            .execute(self.store.pool())
            .await
            .expect("Failed to insert lock");
    }

    /// Names of the tables in the public schema, sorted.
    pub async fn table_names(&self) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = 'public' ORDER BY table_name",
        )
        .fetch_all(self.store.pool())
        .await
        .expect("Failed to list tables")
    }

    /// Inserts a ledger row parsed at `parsed_at`.
    pub async fn add_parsed_file(&self, url: &str, parsed_at: chrono::DateTime<chrono::Utc>) {
        self.store
            .record_parsed(url, &ingest_core::Fingerprint::default(), parsed_at)
            .await
            .expect("Failed to record parsed file");
    }
}

/// Replaces the database name in a Postgres URL.
fn database_url(server_url: &str, database: &str) -> String {
    let (base, query) = match server_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (server_url, None),
    };
    let base = match base.rsplit_once('/') {
        Some((prefix, _)) if prefix.contains("://") && prefix.len() > "postgres://".len() => prefix,
        _ => base.trim_end_matches('/'),
    };
    match query {
        Some(query) => format!("{}/{}?{}", base, database, query),
        None => format!("{}/{}", base, database),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url() {
        assert_eq!(
            database_url("postgres://u:p@localhost:5432/postgres", "t1"),
            "postgres://u:p@localhost:5432/t1"
        );
        assert_eq!(
            database_url("postgres://u:p@localhost:5432/postgres?sslmode=disable", "t1"),
            "postgres://u:p@localhost:5432/t1?sslmode=disable"
        );
    }
}
