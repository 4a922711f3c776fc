//! Job queue with distributed locking for weather ingestion.

pub mod config;
pub mod health;
pub mod postgres;
pub mod queue;
pub mod schema;

pub use config::*;
pub use postgres::PgJobQueue;
pub use queue::*;
