//! Command-line parsing for the county school-metrics viewer.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! metric engine. Dispatch lives in `crate::app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_YEAR_MAX, DEFAULT_YEAR_MIN, Mode};
use crate::io::ExportFormat;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "edu", version, about = "NC county public-school metrics (funding, personnel, enrollment)")]
pub struct Cli {
    /// Log filter (e.g. `info`, `debug`, `edu_metrics=trace`). Overrides RUST_LOG.
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the selectable counties in the dataset.
    Counties(DataArgs),
    /// Print every chart group for one county and year range.
    Show(ShowArgs),
    /// Write the series collection for one county to JSON or CSV.
    Export(ExportArgs),
    /// Plot a group from a previously exported JSON file.
    Plot(PlotArgs),
    /// Launch the interactive dashboard.
    Tui(TuiArgs),
}

/// Where the data comes from.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Dataset CSV. Falls back to EDU_DATA_CSV, then `Data/nc-education-data.csv`.
    #[arg(short = 'f', long = "data", value_name = "CSV")]
    pub data: Option<PathBuf>,
}

/// One county and an inclusive year range.
#[derive(Debug, Args, Clone)]
pub struct WindowArgs {
    /// County name as it appears in the dataset (e.g. "Wake County").
    #[arg(short = 'c', long)]
    pub county: String,

    /// First year (inclusive).
    #[arg(long = "from", default_value_t = DEFAULT_YEAR_MIN)]
    pub year_min: i32,

    /// Last year (inclusive).
    #[arg(long = "to", default_value_t = DEFAULT_YEAR_MAX)]
    pub year_max: i32,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// County name as it appears in the dataset.
    #[arg(short = 'c', long, required_unless_present = "catalog")]
    pub county: Option<String>,

    /// First year (inclusive).
    #[arg(long = "from", default_value_t = DEFAULT_YEAR_MIN)]
    pub year_min: i32,

    /// Last year (inclusive).
    #[arg(long = "to", default_value_t = DEFAULT_YEAR_MAX)]
    pub year_max: i32,

    /// Which view to print for groups that have both.
    #[arg(long, value_enum, default_value_t = Mode::Absolute)]
    pub mode: Mode,

    /// Only print this group id (e.g. `salaries`, `per_pupil_by_source`).
    #[arg(short = 'g', long)]
    pub group: Option<String>,

    /// Render an ASCII plot under each table.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Print the chart catalog as JSON and exit.
    #[arg(long)]
    pub catalog: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Output file.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub out: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,
}

/// Options for plotting a saved collection.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// JSON file produced by `edu export`.
    #[arg(long, value_name = "JSON")]
    pub input: PathBuf,

    /// Group id to plot.
    #[arg(short = 'g', long)]
    pub group: String,

    #[arg(long, value_enum, default_value_t = Mode::Absolute)]
    pub mode: Mode,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct TuiArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// County to open with (defaults to the first in the list).
    #[arg(short = 'c', long)]
    pub county: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_parses_window_and_mode() {
        let cli = Cli::parse_from([
            "edu", "show", "--county", "Wake County", "--from", "2000", "--to", "2010", "--mode", "percentage",
        ]);
        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(args.county.as_deref(), Some("Wake County"));
        assert_eq!((args.year_min, args.year_max), (2000, 2010));
        assert_eq!(args.mode, Mode::Percentage);
    }

    #[test]
    fn show_requires_county_unless_dumping_catalog() {
        assert!(Cli::try_parse_from(["edu", "show"]).is_err());
        assert!(Cli::try_parse_from(["edu", "show", "--catalog"]).is_ok());
    }

    #[test]
    fn window_defaults_to_full_range() {
        let cli = Cli::parse_from(["edu", "export", "-c", "Wake County", "-o", "out.json"]);
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!((args.window.year_min, args.window.year_max), (DEFAULT_YEAR_MIN, DEFAULT_YEAR_MAX));
        assert_eq!(args.format, ExportFormat::Json);
    }

    #[test]
    fn group_examples_in_help_are_catalog_ids() {
        let catalog = crate::domain::Catalog::nc_default();
        for id in ["salaries", "per_pupil_by_source"] {
            assert!(catalog.charts.iter().any(|c| c.id() == id), "{id}");
        }
    }

    #[test]
    fn log_level_is_global() {
        let cli = Cli::parse_from(["edu", "counties", "--log-level", "debug"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
