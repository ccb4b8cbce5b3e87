//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the nullable measurement (`Value`) and safe division
//! - normalized rows and the shared table (`Record`, `Dataset`)
//! - query input and chart output (`SelectionWindow`, `Series`, `SeriesGroup`)
//! - the declarative formula/chart catalog (`Catalog`)

pub mod catalog;
pub mod types;

pub use catalog::*;
pub use types::*;
