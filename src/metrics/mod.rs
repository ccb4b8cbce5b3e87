//! Metric computation engine.
//!
//! Leaf-first:
//!
//! - `normalize`: raw cells → numeric-or-missing records
//! - `derive`: catalog formulas evaluated once per record
//! - `select`: one entity, inclusive year range
//! - `average`: cross-entity yearly means
//! - `breakdown`: per-source absolute + percentage views
//! - `assemble`: every chart group for one selection
//!
//! Everything here is pure over an immutable `Dataset` (derive aside, which
//! runs once at load time), so concurrent queries need no locking.

pub mod assemble;
pub mod average;
pub mod breakdown;
pub mod derive;
pub mod normalize;
pub mod select;

pub use assemble::{AVERAGE_LABEL, assemble};
pub use average::{YearlyMean, average};
pub use breakdown::{BreakdownPoint, breakdown, breakdown_point};
pub use derive::{DeriveReport, compute, derive_fields};
pub use normalize::{RawRow, RowSchema, normalize_row};
pub use select::select;
