//! Core types, parser registry, and retention policy for weather ingestion.

pub mod error;
pub mod file;
pub mod job;
pub mod parser;
pub mod retention;
pub mod source;

pub use error::{Error, Result};
pub use file::*;
pub use job::*;
pub use parser::*;
pub use retention::*;
pub use source::*;
