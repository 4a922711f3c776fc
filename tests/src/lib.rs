//! Shared harness for the integration tests.
//!
//! In-memory implementations of the queue, poller and retention store cover
//! the scheduling logic; the Postgres tests use a testcontainer (or
//! `WEATHER_TEST_DATABASE_URL`).

pub mod fixtures;
pub mod setup;
