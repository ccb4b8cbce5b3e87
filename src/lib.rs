//! `edu-metrics` library crate.
//!
//! The binary (`edu`) is a thin wrapper around this library so that:
//!
//! - the metric engine is testable without spawning processes
//! - the same engine backs the text reports, exports and the TUI
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod io;
pub mod logging;
pub mod metrics;
pub mod plot;
pub mod report;
pub mod tui;
