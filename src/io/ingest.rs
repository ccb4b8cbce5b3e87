//! CSV ingest.
//!
//! This module turns the county education CSV into a derived, query-ready
//! `Dataset`:
//!
//! - **Strict schema** for identity columns (entity + year): clear errors, exit code 2
//! - **Row-level validation**: rows without an entity or a parseable year are
//!   skipped and reported
//! - **Cell-level leniency**: unparseable numeric cells become `Missing` and are counted
//! - **Derive once**: catalog formulas are evaluated before the dataset is handed out

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Catalog, Dataset};
use crate::error::AppError;
use crate::metrics::{DeriveReport, RawRow, RowSchema, derive_fields, normalize_row};

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub entity: Option<String>,
    pub message: String,
}

/// What happened while loading.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_used: usize,
    pub row_errors: Vec<RowError>,
    /// Numeric cells that failed to parse (coerced to missing).
    pub malformed_cells: usize,
    /// Per-column malformed counts, most frequent first.
    pub malformed_by_column: Vec<(String, usize)>,
}

/// Ingest output: the derived dataset plus load diagnostics.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub dataset: Dataset,
    pub report: LoadReport,
    pub derive: DeriveReport,
}

/// Load a CSV file and derive catalog fields.
pub fn load_dataset(path: &Path, catalog: &Catalog) -> Result<LoadedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let loaded = load_from_reader(file, catalog)?;

    tracing::info!(
        path = %path.display(),
        records = loaded.dataset.len(),
        entities = loaded.dataset.entities().len(),
        "dataset loaded"
    );
    Ok(loaded)
}

/// Load CSV text from any reader and derive catalog fields.
pub fn load_from_reader<R: Read>(reader: R, catalog: &Catalog) -> Result<LoadedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .iter()
        .map(normalize_header_name)
        .collect();

    ensure_identity_columns(&headers, catalog)?;

    let schema = RowSchema {
        entity_column: catalog.entity_column.clone(),
        year_column: catalog.year_column.clone(),
        excluded: catalog.identifier_columns.clone(),
    };

    let excluded = catalog.excluded_columns();
    let fields: BTreeSet<String> = headers
        .iter()
        .filter(|h| !h.is_empty() && !excluded.contains(&h.as_str()))
        .cloned()
        .collect();

    let mut records = Vec::new();
    let mut report = LoadReport::default();
    let mut malformed: HashMap<String, usize> = HashMap::new();

    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, and CSV lines are 1-based.
        let line = idx + 2;
        report.rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                report.row_errors.push(RowError {
                    line,
                    entity: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let raw = raw_row(&headers, &record);
        match normalize_row(&raw, &schema) {
            Ok(row) => {
                for column in row.malformed {
                    *malformed.entry(column).or_insert(0) += 1;
                }
                records.push(row.record);
            }
            Err(message) => report.row_errors.push(RowError {
                line,
                entity: raw.get(&catalog.entity_column).cloned().filter(|s| !s.is_empty()),
                message,
            }),
        }
    }

    report.rows_used = records.len();
    report.malformed_cells = malformed.values().sum();
    let mut by_column: Vec<(String, usize)> = malformed.into_iter().collect();
    by_column.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    report.malformed_by_column = by_column;

    if !report.row_errors.is_empty() {
        tracing::warn!(skipped = report.row_errors.len(), "rows skipped during ingest");
    }
    if report.malformed_cells > 0 {
        tracing::warn!(cells = report.malformed_cells, "malformed numeric cells coerced to missing");
    }

    if records.is_empty() {
        return Err(AppError::no_data("No valid rows found in CSV."));
    }

    let mut dataset = Dataset::new(records, fields)?;
    let derive = derive_fields(&mut dataset, &catalog.derived)?;

    Ok(LoadedData {
        dataset,
        report,
        derive,
    })
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, the entity column is not found.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn ensure_identity_columns(headers: &[String], catalog: &Catalog) -> Result<(), AppError> {
    for column in [&catalog.entity_column, &catalog.year_column] {
        if !headers.iter().any(|h| h == column) {
            return Err(AppError::input(format!("Missing required column: `{column}`")));
        }
    }
    Ok(())
}

fn raw_row(headers: &[String], record: &StringRecord) -> RawRow {
    headers
        .iter()
        .zip(record.iter())
        .filter(|(h, _)| !h.is_empty())
        .map(|(h, v)| (h.clone(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Value;

    const HEADER: &str = "\u{feff}area_name,year,fips,Enrollment.Final,Enrollment.Total,Enrollment.White,\
Expenditures.Local,Expenditures.State,Expenditures.Federal,Expenditures.Total";

    fn csv(rows: &[&str]) -> String {
        let mut out = HEADER.to_string();
        for r in rows {
            out.push('\n');
            out.push_str(r);
        }
        out
    }

    #[test]
    fn loads_and_derives() {
        let text = csv(&[
            "Wake County,2010,37183,\"1,000\",1200,500,100,700,200,1000",
            "Wake County,2011,37183,1000,1200,500,110,700,200,",
        ]);
        let loaded = load_from_reader(text.as_bytes(), &Catalog::nc_default()).unwrap();
        assert_eq!(loaded.report.rows_read, 2);
        assert_eq!(loaded.report.rows_used, 2);
        assert_eq!(loaded.report.malformed_cells, 0);
        assert!(!loaded.dataset.has_field("fips"));

        let r = &loaded.dataset.records()[0];
        assert_eq!(r.get("Enrollment.Final"), Value::Present(1000.0));
        assert_eq!(r.get("local_expenditure_per_pupil"), Value::Present(0.1));
        assert_eq!(r.get("local_funding_as_perc"), Value::Present(10.0));
        assert_eq!(loaded.dataset.records()[1].get("local_funding_as_perc"), Value::Missing);
    }

    #[test]
    fn bad_rows_are_reported_and_bad_cells_counted() {
        let text = csv(&[
            ",2010,,1,1,1,1,1,1,1",
            "Wake County,abc,,1,1,1,1,1,1,1",
            "Wake County,2012,,oops,1,1,1,1,1,1",
        ]);
        let loaded = load_from_reader(text.as_bytes(), &Catalog::nc_default()).unwrap();
        assert_eq!(loaded.report.rows_used, 1);
        assert_eq!(loaded.report.row_errors.len(), 2);
        assert_eq!(loaded.report.row_errors[1].line, 3);
        assert_eq!(loaded.report.row_errors[1].entity.as_deref(), Some("Wake County"));
        assert_eq!(loaded.report.malformed_cells, 1);
        assert_eq!(loaded.report.malformed_by_column, vec![("Enrollment.Final".to_string(), 1)]);
    }

    #[test]
    fn missing_formula_column_is_fatal() {
        let text = "area_name,year,Expenditures.Local\nWake County,2010,5";
        let err = load_from_reader(text.as_bytes(), &Catalog::nc_default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("Enrollment.Final"));
    }

    #[test]
    fn missing_identity_column_is_fatal() {
        let err = load_from_reader("county,year\nWake County,2010".as_bytes(), &Catalog::nc_default()).unwrap_err();
        assert_eq!(err.message(), "Missing required column: `area_name`");
    }

    #[test]
    fn duplicate_keys_are_fatal() {
        let text = csv(&["Wake County,2010,,1,1,1,1,1,1,1", "Wake County,2010,,2,2,2,2,2,2,2"]);
        let err = load_from_reader(text.as_bytes(), &Catalog::nc_default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn header_only_is_no_data() {
        let err = load_from_reader(HEADER.as_bytes(), &Catalog::nc_default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
