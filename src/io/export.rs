//! Export a computed series collection.
//!
//! - JSON: the full collection (groups, series, nullable points) plus run metadata
//! - CSV: long format, one row per point, easy to pivot in a spreadsheet

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{SeriesCollection, SeriesGroup};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

/// A saved collection (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub collection: SeriesCollection,
}

pub fn write_collection(
    path: &Path,
    collection: &SeriesCollection,
    format: ExportFormat,
    generated_at: DateTime<Utc>,
) -> Result<(), AppError> {
    match format {
        ExportFormat::Json => write_collection_json(path, collection, generated_at),
        ExportFormat::Csv => write_collection_csv(path, collection),
    }
}

/// Write the collection as pretty JSON; missing points are `null`.
pub fn write_collection_json(
    path: &Path,
    collection: &SeriesCollection,
    generated_at: DateTime<Utc>,
) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create export JSON '{}': {e}", path.display())))?;

    let export = ExportFile {
        tool: "edu".to_string(),
        generated_at,
        collection: collection.clone(),
    };

    serde_json::to_writer_pretty(file, &export)
        .map_err(|e| AppError::runtime(format!("Failed to write export JSON: {e}")))?;
    Ok(())
}

/// Read a JSON export back.
pub fn read_collection_json(path: &Path) -> Result<ExportFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open export JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid export JSON: {e}")))
}

/// Write the collection as long-format CSV.
pub fn write_collection_csv(path: &Path, collection: &SeriesCollection) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);
    write_csv_rows(&mut writer, collection)
        .and_then(|()| writer.flush().map_err(csv::Error::from))
        .map_err(|e| AppError::runtime(format!("Failed to write export CSV: {e}")))
}

fn write_csv_rows<W: Write>(writer: &mut csv::Writer<W>, collection: &SeriesCollection) -> csv::Result<()> {
    writer.write_record(["entity", "group", "section", "series", "mode", "role", "year", "value"])?;
    for group in &collection.groups {
        write_group_rows(writer, &collection.window.entity_id, group)?;
    }
    Ok(())
}

fn write_group_rows<W: Write>(writer: &mut csv::Writer<W>, entity: &str, group: &SeriesGroup) -> csv::Result<()> {
    for series in &group.series {
        for (year, value) in series.x.iter().zip(&series.y) {
            let year = year.to_string();
            let value = value.get().map(|v| v.to_string()).unwrap_or_default();
            writer.write_record([
                entity,
                group.id.as_str(),
                group.section.display_name(),
                series.label.as_str(),
                series.mode.display_name(),
                series.role.display_name(),
                year.as_str(),
                value.as_str(),
            ])?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Mode, Section, SelectionWindow, Series, SeriesRole, Value};

    fn collection() -> SeriesCollection {
        let mut s = Series::new("Local", Mode::Absolute, SeriesRole::Entity);
        s.push(2010, Value::Present(1.5));
        s.push(2011, Value::Missing);
        SeriesCollection {
            window: SelectionWindow::new("Wake County", 2010, 2011),
            years: vec![2010, 2011],
            groups: vec![SeriesGroup {
                id: "salaries".to_string(),
                title: "Salaries by Funding Source".to_string(),
                section: Section::Financials,
                y_label: "Expenditure".to_string(),
                series: vec![s],
            }],
        }
    }

    fn csv_text(collection: &SeriesCollection) -> String {
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_csv_rows(&mut writer, collection).unwrap();
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn csv_rows_are_long_format_with_blank_missing() {
        let text = csv_text(&collection());
        let expected = concat!(
            "entity,group,section,series,mode,role,year,value\n",
            "Wake County,salaries,Financials,Local,absolute,entity,2010,1.5\n",
            "Wake County,salaries,Financials,Local,absolute,entity,2011,\n",
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn json_export_flattens_collection() {
        let export = ExportFile {
            tool: "edu".to_string(),
            generated_at: DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z").unwrap().with_timezone(&Utc),
            collection: collection(),
        };
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["window"]["entity_id"], "Wake County");
        assert_eq!(json["groups"][0]["series"][0]["y"], serde_json::json!([1.5, null]));
        assert_eq!(json["groups"][0]["series"][0]["mode"], "absolute");
    }

    #[test]
    fn labels_with_quotes_and_newlines_are_escaped() {
        let mut c = collection();
        c.groups[0].series[0].label = "Say \"hi\"\nthere".to_string();
        c.groups[0].series[0].x.truncate(1);
        c.groups[0].series[0].y.truncate(1);
        let text = csv_text(&c);
        assert!(text.contains("Wake County,salaries,Financials,\"Say \"\"hi\"\"\nthere\",absolute,entity,2010,1.5\n"));

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[3], "Say \"hi\"\nthere");
    }
}
