//! Background workers for weather ingestion.
//!
//! - Enqueue (poll cycle → deduplicated processing jobs)
//! - Retention (overlap pruning, age-based expiry, ledger expiry)
//! - Scheduler (runs both on fixed intervals)

pub mod enqueue;
pub mod poller;
pub mod retention;
pub mod scheduler;

pub use enqueue::*;
pub use poller::*;
pub use retention::*;
pub use scheduler::*;
