//! Schema normalization: raw string cells → `Record`.
//!
//! Every non-excluded column becomes a finite `Value` or `Missing`. Parsing
//! never fails a row because of a bad numeric cell; the cell is coerced to
//! `Missing` and reported so the loader can log/count it.

use std::collections::BTreeMap;

use crate::domain::{Record, Value};

/// One raw row as produced by a loader: column name → cell text.
pub type RawRow = BTreeMap<String, String>;

/// Cell spellings treated as blank (same as a missing cell, not malformed).
const NULL_MARKERS: [&str; 6] = ["na", "n/a", "nan", "null", "none", "-"];

/// Outcome of coercing one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Number(f64),
    Blank,
    Malformed,
}

impl Coerced {
    pub fn value(self) -> Value {
        match self {
            Coerced::Number(v) => Value::new(v),
            Coerced::Blank | Coerced::Malformed => Value::Missing,
        }
    }
}

/// Columns that identify a row rather than carry data.
#[derive(Debug, Clone)]
pub struct RowSchema {
    pub entity_column: String,
    pub year_column: String,
    pub excluded: Vec<String>,
}

impl RowSchema {
    fn is_excluded(&self, column: &str) -> bool {
        column == self.entity_column || column == self.year_column || self.excluded.iter().any(|c| c == column)
    }
}

/// A normalized record plus the columns whose cells could not be parsed.
#[derive(Debug, Clone)]
pub struct NormalizedRow {
    pub record: Record,
    pub malformed: Vec<String>,
}

/// Coerce a numeric-looking cell. Grouping punctuation is removed before parsing.
pub fn coerce_cell(raw: &str) -> Coerced {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NULL_MARKERS.iter().any(|m| trimmed.eq_ignore_ascii_case(m)) {
        return Coerced::Blank;
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '\u{a0}' | '\u{202f}'))
        .collect();

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Coerced::Number(v),
        _ => Coerced::Malformed,
    }
}

/// Parse a year cell; tolerates float spellings such as `2010.0`.
pub fn parse_year(raw: &str) -> Option<i32> {
    let s = raw.trim();
    if let Ok(y) = s.parse::<i32>() {
        return Some(y);
    }
    match coerce_cell(s) {
        Coerced::Number(v) if v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 => Some(v as i32),
        _ => None,
    }
}

/// Normalize one raw row.
///
/// Errors only for row identity problems (blank entity, unparseable year);
/// data cells never produce an error.
pub fn normalize_row(raw: &RawRow, schema: &RowSchema) -> Result<NormalizedRow, String> {
    let entity_id = raw
        .get(&schema.entity_column)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing entity value in `{}`.", schema.entity_column))?;

    let year_cell = raw.get(&schema.year_column).map(String::as_str).unwrap_or("");
    let year = parse_year(year_cell)
        .ok_or_else(|| format!("Invalid year '{}' for {entity_id}.", year_cell.trim()))?;

    let mut record = Record::new(entity_id, year);
    let mut malformed = Vec::new();

    for (column, cell) in raw {
        if schema.is_excluded(column) {
            if column != &schema.entity_column && column != &schema.year_column {
                record.identifiers.insert(column.clone(), cell.clone());
            }
            continue;
        }

        let coerced = coerce_cell(cell);
        if coerced == Coerced::Malformed {
            tracing::debug!(entity = %record.entity_id, year, column = %column, cell = %cell, "malformed numeric cell");
            malformed.push(column.clone());
        }
        record.fields.insert(column.clone(), coerced.value());
    }

    Ok(NormalizedRow { record, malformed })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> RowSchema {
        RowSchema {
            entity_column: "area_name".to_string(),
            year_column: "year".to_string(),
            excluded: vec!["fips".to_string()],
        }
    }

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn strips_grouping_separators() {
        assert_eq!(coerce_cell("1,234,567.5"), Coerced::Number(1_234_567.5));
        assert_eq!(coerce_cell(" 12 345 "), Coerced::Number(12_345.0));
        assert_eq!(coerce_cell("-3"), Coerced::Number(-3.0));
    }

    #[test]
    fn blanks_and_garbage_become_missing() {
        assert_eq!(coerce_cell(""), Coerced::Blank);
        assert_eq!(coerce_cell("  N/A "), Coerced::Blank);
        assert_eq!(coerce_cell("abc"), Coerced::Malformed);
        assert_eq!(coerce_cell("inf"), Coerced::Malformed);
        assert_eq!(coerce_cell("abc").value(), Value::Missing);
    }

    #[test]
    fn year_accepts_float_spelling() {
        assert_eq!(parse_year("2010"), Some(2010));
        assert_eq!(parse_year("2010.0"), Some(2010));
        assert_eq!(parse_year("2010.5"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn identifiers_pass_through_and_data_is_coerced() {
        let raw = row(&[
            ("area_name", "Wake County"),
            ("year", "2010"),
            ("fips", "37183"),
            ("Expenditures.Local", "1,000"),
            ("Enrollment.Final", "oops"),
            ("Enrollment.Total", ""),
        ]);
        let out = normalize_row(&raw, &schema()).unwrap();
        assert_eq!(out.record.entity_id, "Wake County");
        assert_eq!(out.record.year, 2010);
        assert_eq!(out.record.identifiers.get("fips").map(String::as_str), Some("37183"));
        assert!(!out.record.fields.contains_key("fips"));
        assert_eq!(out.record.get("Expenditures.Local"), Value::Present(1000.0));
        assert_eq!(out.record.get("Enrollment.Final"), Value::Missing);
        assert_eq!(out.record.get("Enrollment.Total"), Value::Missing);
        assert_eq!(out.malformed, vec!["Enrollment.Final".to_string()]);
    }

    #[test]
    fn row_without_entity_or_year_is_rejected() {
        assert!(normalize_row(&row(&[("area_name", " "), ("year", "2010")]), &schema()).is_err());
        assert!(normalize_row(&row(&[("area_name", "Wake County"), ("year", "x")]), &schema()).is_err());
    }
}
