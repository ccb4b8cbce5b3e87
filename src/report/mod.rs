//! Reporting utilities: load diagnostics and series tables for the terminal.

pub mod format;

pub use format::*;
