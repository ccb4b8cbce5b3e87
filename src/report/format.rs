//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the metric engine stays free of presentation concerns
//! - output changes are localized (important for snapshot tests)

use crate::domain::{Dataset, Mode, Section, SeriesCollection, SeriesGroup, Value};
use crate::io::ingest::LoadReport;
use crate::metrics::DeriveReport;

/// Dataset + ingest diagnostics.
pub fn format_load_summary(ds: &Dataset, r: &LoadReport, derive: &DeriveReport) -> String {
    let mut out = String::new();

    out.push_str("=== edu - NC public school county data ===\n");
    match ds.year_bounds() {
        Some((lo, hi)) => out.push_str(&format!(
            "Records: n={} | entities={} | years=[{lo}, {hi}]\n",
            ds.len(),
            ds.entities().len()
        )),
        None => out.push_str("Records: n=0\n"),
    }
    out.push_str(&format!(
        "Rows: read={} used={} skipped={} | malformed cells={}\n",
        r.rows_read,
        r.rows_used,
        r.row_errors.len(),
        r.malformed_cells
    ));
    for (column, n) in r.malformed_by_column.iter().take(5) {
        out.push_str(&format!("  malformed {column}: {n}\n"));
    }
    for e in r.row_errors.iter().take(5) {
        out.push_str(&format!(
            "  line {}{}: {}\n",
            e.line,
            e.entity.as_deref().map(|s| format!(" ({s})")).unwrap_or_default(),
            e.message
        ));
    }

    out.push_str("Derived fields:\n");
    for (name, present) in &derive.present_counts {
        out.push_str(&format!("  {name:<32} present={present}/{}\n", derive.records));
    }
    out
}

/// Format every group of a collection, grouped by section.
///
/// `mode` is the requested view; groups without a percentage view fall back
/// to absolute. `only` restricts output to one group id.
pub fn format_collection(collection: &SeriesCollection, mode: Mode, only: Option<&str>) -> String {
    let mut out = String::new();
    let w = &collection.window;
    out.push_str(&format!(
        "County: {} | years=[{}, {}] | points={}\n",
        w.entity_id,
        w.year_min,
        w.year_max,
        collection.years.len()
    ));
    if collection.is_empty() {
        out.push_str("(no records for this selection)\n");
    }

    let mut section: Option<Section> = None;
    for group in &collection.groups {
        if only.is_some_and(|id| id != group.id) {
            continue;
        }
        if section != Some(group.section) {
            out.push_str(&format!("\n## {}\n", group.section.display_name()));
            section = Some(group.section);
        }
        out.push('\n');
        out.push_str(&format_group(group, mode));
    }
    out
}

/// One group as a year-by-series table.
pub fn format_group(group: &SeriesGroup, mode: Mode) -> String {
    let mode = group.effective_mode(mode);
    let series: Vec<_> = group.series_for(mode).collect();
    let unit = if mode == Mode::Percentage { "%" } else { group.y_label.as_str() };

    let mut out = String::new();
    out.push_str(&format!("{} [{}] ({unit})\n", group.title, mode.display_name()));

    let widths: Vec<usize> = series.iter().map(|s| s.label.len().max(10)).collect();
    out.push_str(&format!("{:>6}", "Year"));
    for (s, w) in series.iter().zip(&widths) {
        out.push_str(&format!("  {:>w$}", s.label, w = *w));
    }
    out.push('\n');

    let rows = series.first().map(|s| s.len()).unwrap_or(0);
    for i in 0..rows {
        out.push_str(&format!("{:>6}", series[0].x[i]));
        for (s, w) in series.iter().zip(&widths) {
            out.push_str(&format!("  {:>w$}", fmt_value(s.y[i]), w = *w));
        }
        out.push('\n');
    }
    out
}

fn fmt_value(v: Value) -> String {
    match v.get() {
        None => "-".to_string(),
        Some(x) if x.abs() >= 1000.0 => format!("{x:.0}"),
        Some(x) if x.abs() >= 1.0 => format!("{x:.2}"),
        Some(x) => format!("{x:.4}"),
    }
}
