//! Input/output helpers.
//!
//! - CSV ingest + normalization + derive (`ingest`)
//! - series collection exports (JSON/CSV) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
