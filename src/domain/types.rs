//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory while computing a selection
//! - exported to JSON/CSV
//! - handed to any rendering front-end (text report, ASCII plot, TUI)

use std::collections::{BTreeMap, BTreeSet, HashMap};

use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

/// A nullable measurement.
///
/// `Missing` is a valid data state, not an error. A `Present` value is always
/// finite: every constructor routes through [`Value::new`], which maps `NaN`
/// and `±Inf` to `Missing`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    Present(f64),
    #[default]
    Missing,
}

impl Value {
    pub fn new(v: f64) -> Self {
        if v.is_finite() { Value::Present(v) } else { Value::Missing }
    }

    pub fn from_option(v: Option<f64>) -> Self {
        v.map(Value::new).unwrap_or(Value::Missing)
    }

    pub fn get(self) -> Option<f64> {
        match self {
            Value::Present(v) => Some(v),
            Value::Missing => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Value::Missing)
    }

    /// The value, with `Missing` read as `0.0`.
    pub fn or_zero(self) -> f64 {
        self.get().unwrap_or(0.0)
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Value {
        match self {
            Value::Present(v) => Value::new(f(v)),
            Value::Missing => Value::Missing,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::new(v)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Value::from_option(Option::<f64>::deserialize(deserializer)?))
    }
}

/// Safe division: a missing operand or a zero denominator yields `Missing`.
pub fn safe_div(numerator: Value, denominator: Value) -> Value {
    match (numerator, denominator) {
        (Value::Present(n), Value::Present(d)) if d != 0.0 => Value::new(n / d),
        _ => Value::Missing,
    }
}

/// One `(entity, year)` row after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub entity_id: String,
    pub year: i32,
    /// Numeric fields (raw and derived).
    pub fields: HashMap<String, Value>,
    /// Non-data columns passed through untouched.
    pub identifiers: BTreeMap<String, String>,
}

impl Record {
    pub fn new(entity_id: impl Into<String>, year: i32) -> Self {
        Self {
            entity_id: entity_id.into(),
            year,
            fields: HashMap::new(),
            identifiers: BTreeMap::new(),
        }
    }

    /// Field lookup; absent fields read as `Missing`.
    pub fn get(&self, name: &str) -> Value {
        self.fields.get(name).copied().unwrap_or(Value::Missing)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

#[cfg(test)]
impl Record {
    pub(crate) fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value.into());
        self
    }
}

/// The normalized table: records ordered by entity then year, plus the set of
/// known field names.
///
/// Built once by the loader and extended once by the derive step; after that
/// it is shared read-only by every query.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Record>,
    fields: BTreeSet<String>,
}

impl Dataset {
    /// Sort records and enforce `(entity, year)` uniqueness.
    pub fn new(mut records: Vec<Record>, fields: BTreeSet<String>) -> Result<Self, AppError> {
        records.sort_by(|a, b| a.entity_id.cmp(&b.entity_id).then(a.year.cmp(&b.year)));

        if let Some(pair) = records
            .windows(2)
            .find(|w| w[0].entity_id == w[1].entity_id && w[0].year == w[1].year)
        {
            return Err(AppError::input(
                format!(
                    "Duplicate record for ({}, {}): (entity, year) pairs must be unique.",
                    pair[0].entity_id, pair[0].year
                ),
            ));
        }

        Ok(Self { records, fields })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    pub(crate) fn insert_field(&mut self, name: &str) {
        self.fields.insert(name.to_string());
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct entity ids, sorted.
    pub fn entities(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for r in &self.records {
            if out.last() != Some(&r.entity_id.as_str()) {
                out.push(&r.entity_id);
            }
        }
        out
    }

    /// `(min_year, max_year)` across all records.
    pub fn year_bounds(&self) -> Option<(i32, i32)> {
        let min = self.records.iter().map(|r| r.year).min()?;
        let max = self.records.iter().map(|r| r.year).max()?;
        Some((min, max))
    }
}

/// `(entity, year_min, year_max)`, both years inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionWindow {
    pub entity_id: String,
    pub year_min: i32,
    pub year_max: i32,
}

impl SelectionWindow {
    pub fn new(entity_id: impl Into<String>, year_min: i32, year_max: i32) -> Self {
        Self {
            entity_id: entity_id.into(),
            year_min,
            year_max,
        }
    }

    pub fn contains_year(&self, year: i32) -> bool {
        self.year_min <= year && year <= self.year_max
    }
}

/// Which view of a quantity a series carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Absolute,
    Percentage,
}

impl Mode {
    pub fn toggled(self) -> Mode {
        match self {
            Mode::Absolute => Mode::Percentage,
            Mode::Percentage => Mode::Absolute,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Mode::Absolute => "absolute",
            Mode::Percentage => "percentage",
        }
    }
}

/// Whether a series belongs to the selected entity or is a cross-entity reference line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesRole {
    Entity,
    Reference,
}

impl SeriesRole {
    pub fn display_name(self) -> &'static str {
        match self {
            SeriesRole::Entity => "entity",
            SeriesRole::Reference => "reference",
        }
    }
}

/// One plotted line: `x` and `y` always have equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    pub mode: Mode,
    pub role: SeriesRole,
    pub x: Vec<i32>,
    pub y: Vec<Value>,
}

impl Series {
    pub fn new(label: impl Into<String>, mode: Mode, role: SeriesRole) -> Self {
        Self {
            label: label.into(),
            mode,
            role,
            x: Vec::new(),
            y: Vec::new(),
        }
    }

    pub fn push(&mut self, year: i32, value: Value) {
        self.x.push(year);
        self.y.push(value);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn is_aligned(&self) -> bool {
        self.x.len() == self.y.len()
    }

    /// `(year, value)` pairs for the present points only.
    pub fn present_points(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .filter_map(|(&x, y)| y.get().map(|v| (x, v)))
    }

    /// Runs of consecutive present points as `(year, value)`; a missing year
    /// ends the current run.
    pub fn present_runs(&self) -> Vec<Vec<(f64, f64)>> {
        let mut out = Vec::new();
        let mut current: Vec<(f64, f64)> = Vec::new();
        for (&year, value) in self.x.iter().zip(&self.y) {
            match value.get() {
                Some(v) => current.push((year as f64, v)),
                None if !current.is_empty() => out.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }
}

/// Dashboard section a chart belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Financials,
    Education,
    Demographics,
}

impl Section {
    pub fn display_name(self) -> &'static str {
        match self {
            Section::Financials => "Financials",
            Section::Education => "Education",
            Section::Demographics => "Demographics",
        }
    }
}

/// A named chart unit: absolute series plus (optionally) their percentage twins.
///
/// Percentage series are paired 1:1 by label with absolute series. Which mode
/// is displayed is the consumer's decision; [`Mode::Absolute`] is the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesGroup {
    pub id: String,
    pub title: String,
    pub section: Section,
    pub y_label: String,
    pub series: Vec<Series>,
}

impl SeriesGroup {
    pub fn default_mode(&self) -> Mode {
        Mode::Absolute
    }

    pub fn has_percentage(&self) -> bool {
        self.series.iter().any(|s| s.mode == Mode::Percentage)
    }

    pub fn series_for(&self, mode: Mode) -> impl Iterator<Item = &Series> + '_ {
        self.series.iter().filter(move |s| s.mode == mode)
    }

    pub fn find(&self, label: &str, mode: Mode) -> Option<&Series> {
        self.series.iter().find(|s| s.label == label && s.mode == mode)
    }

    /// Resolve the requested mode against what this group offers.
    pub fn effective_mode(&self, requested: Mode) -> Mode {
        if requested == Mode::Percentage && !self.has_percentage() {
            Mode::Absolute
        } else {
            requested
        }
    }
}

/// Every group computed for one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesCollection {
    pub window: SelectionWindow,
    /// Years of the filtered records, in order; the x-axis of every series.
    pub years: Vec<i32>,
    pub groups: Vec<SeriesGroup>,
}

impl SeriesCollection {
    pub fn group(&self, id: &str) -> Option<&SeriesGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}
