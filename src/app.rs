//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - resolves the dataset path (flag, `.env`, default)
//! - loads and derives the dataset once
//! - runs the requested query and prints or writes the result

use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;

use crate::cli::{Command, DataArgs, ExportArgs, PlotArgs, ShowArgs, TuiArgs};
use crate::domain::{Catalog, SelectionWindow};
use crate::error::AppError;

pub mod pipeline;

use pipeline::Engine;

/// Environment variable naming the dataset CSV.
pub const DATA_ENV_VAR: &str = "EDU_DATA_CSV";
/// Used when neither `--data` nor `EDU_DATA_CSV` is set.
pub const DEFAULT_DATA_PATH: &str = "Data/nc-education-data.csv";

/// Entry point for the `edu` binary.
pub fn run() -> Result<(), AppError> {
    // `edu` and `edu -c "Wake County"` behave like `edu tui ...`.
    //
    // Clap requires a subcommand name, so we rewrite argv before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    crate::logging::init_logging(cli.log_level.as_deref());

    match cli.command {
        Command::Counties(args) => handle_counties(args),
        Command::Show(args) => handle_show(args),
        Command::Export(args) => handle_export(args),
        Command::Plot(args) => handle_plot(args),
        Command::Tui(args) => handle_tui(args),
    }
}

fn handle_counties(args: DataArgs) -> Result<(), AppError> {
    let engine = load_engine(&args)?;
    for county in engine.counties() {
        println!("{county}");
    }
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    if args.catalog {
        let json = serde_json::to_string_pretty(&Catalog::nc_default())
            .map_err(|e| AppError::runtime(format!("Failed to serialize catalog: {e}")))?;
        println!("{json}");
        return Ok(());
    }
    let county = args
        .county
        .clone()
        .ok_or_else(|| AppError::input("--county is required"))?;
    let window = selection_window(&county, args.year_min, args.year_max)?;

    let engine = load_engine(&args.data)?;
    if let Some(id) = args.group.as_deref() {
        if !engine.catalog.charts.iter().any(|c| c.id() == id) {
            return Err(AppError::input(format!("Unknown group '{id}'")));
        }
    }

    println!(
        "{}",
        crate::report::format_load_summary(&engine.dataset, &engine.report, &engine.derive)
    );
    let collection = engine.query(&window);
    print!(
        "{}",
        crate::report::format_collection(&collection, args.mode, args.group.as_deref())
    );

    if args.plot {
        for group in &collection.groups {
            if args.group.as_deref().is_some_and(|id| id != group.id) {
                continue;
            }
            println!();
            print!(
                "{}",
                crate::plot::render_group_plot(group, args.mode, args.width, args.height)
            );
        }
    }
    Ok(())
}

fn handle_export(args: ExportArgs) -> Result<(), AppError> {
    let window = selection_window(&args.window.county, args.window.year_min, args.window.year_max)?;
    let engine = load_engine(&args.data)?;
    let collection = engine.query(&window);
    if collection.is_empty() {
        tracing::warn!(entity = %window.entity_id, "no records for selection; exporting empty series");
    }

    crate::io::export::write_collection(&args.out, &collection, args.format, Utc::now())?;
    tracing::info!(path = %args.out.display(), groups = collection.groups.len(), "export written");
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let export = crate::io::export::read_collection_json(&args.input)?;
    let group = export
        .collection
        .group(&args.group)
        .ok_or_else(|| AppError::input(format!("Group '{}' not found in {}", args.group, args.input.display())))?;

    println!(
        "{} ({}) exported {}",
        export.collection.window.entity_id,
        export.tool,
        export.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    print!(
        "{}",
        crate::plot::render_group_plot(group, args.mode, args.width, args.height)
    );
    Ok(())
}

fn handle_tui(args: TuiArgs) -> Result<(), AppError> {
    let engine = load_engine(&args.data)?;
    crate::tui::run(engine, args.county)
}

fn load_engine(args: &DataArgs) -> Result<Engine, AppError> {
    let path = resolve_data_path(args.data.clone());
    Engine::load(&path, Catalog::nc_default())
}

/// `--data`, then `EDU_DATA_CSV` (a `.env` file counts), then the default.
pub fn resolve_data_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    dotenvy::dotenv().ok();
    std::env::var_os(DATA_ENV_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH))
}

/// Validate a CLI year range.
pub fn selection_window(county: &str, year_min: i32, year_max: i32) -> Result<SelectionWindow, AppError> {
    if year_min > year_max {
        return Err(AppError::input(format!(
            "Invalid year range: --from {year_min} is after --to {year_max}"
        )));
    }
    Ok(SelectionWindow::new(county, year_min, year_max))
}

const SUBCOMMANDS: [&str; 5] = ["counties", "show", "export", "plot", "tui"];

/// Rewrite argv so `edu` defaults to `edu tui`.
///
/// Rules:
/// - `edu`                       -> `edu tui`
/// - `edu -c "Wake County" ...`  -> `edu tui -c "Wake County" ...`
/// - `edu --log-level debug show` -> unchanged (global flag before a subcommand)
/// - `edu --help/--version/-h`   -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    // Global flags may come before the subcommand (`edu --log-level debug show ...`).
    let has_subcommand = argv[1..].iter().any(|a| SUBCOMMANDS.contains(&a.as_str()));
    if has_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EXIT_INPUT;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_opens_tui() {
        assert_eq!(rewrite_args(argv(&["edu"])), argv(&["edu", "tui"]));
        assert_eq!(
            rewrite_args(argv(&["edu", "-c", "Wake County"])),
            argv(&["edu", "tui", "-c", "Wake County"])
        );
    }

    #[test]
    fn subcommands_and_help_are_untouched() {
        assert_eq!(rewrite_args(argv(&["edu", "show", "-c", "X"])), argv(&["edu", "show", "-c", "X"]));
        assert_eq!(rewrite_args(argv(&["edu", "--help"])), argv(&["edu", "--help"]));
    }

    #[test]
    fn global_flag_before_subcommand_is_untouched() {
        let args = argv(&["edu", "--log-level", "debug", "show", "-c", "Wake County"]);
        assert_eq!(rewrite_args(args.clone()), args);
        let cli = crate::cli::Cli::try_parse_from(rewrite_args(args)).unwrap();
        assert!(matches!(cli.command, Command::Show(_)));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));

        assert_eq!(
            rewrite_args(argv(&["edu", "--log-level", "debug"])),
            argv(&["edu", "tui", "--log-level", "debug"])
        );
    }

    #[test]
    fn inverted_year_range_is_a_config_error() {
        let err = selection_window("Wake County", 2010, 2000).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert!(selection_window("Wake County", 2000, 2000).is_ok());
    }

    #[test]
    fn explicit_data_flag_wins() {
        assert_eq!(resolve_data_path(Some(PathBuf::from("a.csv"))), PathBuf::from("a.csv"));
    }
}
