//! Postgres storage for weather ingestion.

pub mod client;
pub mod config;
pub mod health;
pub mod ledger;
pub mod query;
pub mod retention;
pub mod schema;

pub use client::*;
pub use config::*;
pub use ledger::FingerprintLedger;
pub use retention::*;
