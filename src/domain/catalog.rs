//! Declarative chart/formula catalog.
//!
//! Every derived metric and every funding-source breakdown is described as data
//! and evaluated by one generic engine (`crate::metrics`). Adding a chart means
//! adding an entry here, not writing a new computation.

use serde::{Deserialize, Serialize};

use crate::domain::Section;

/// Personnel funding-by-source rows before this year that sum to zero were not collected.
pub const PERSONNEL_ERA_CUTOFF: i32 = 2005;

/// Default dashboard year bounds (inclusive).
pub const DEFAULT_YEAR_MIN: i32 = 1970;
pub const DEFAULT_YEAR_MAX: i32 = 2025;

pub const ENTITY_COLUMN: &str = "area_name";
pub const YEAR_COLUMN: &str = "year";

/// How a derived field is computed from raw fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Formula {
    /// `numerator * scale / denominator`, with safe division.
    Ratio {
        numerator: String,
        denominator: String,
        scale: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedField {
    pub name: String,
    pub formula: Formula,
}

impl DerivedField {
    pub fn ratio(name: &str, numerator: &str, denominator: &str, scale: f64) -> Self {
        Self {
            name: name.to_string(),
            formula: Formula::Ratio {
                numerator: numerator.to_string(),
                denominator: denominator.to_string(),
                scale,
            },
        }
    }

    /// Field names the formula reads.
    pub fn inputs(&self) -> Vec<&str> {
        match &self.formula {
            Formula::Ratio { numerator, denominator, .. } => vec![numerator.as_str(), denominator.as_str()],
        }
    }
}

/// One labelled source column of a breakdown (e.g. "Local" → `Salaries.Local`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceField {
    pub label: String,
    pub field: String,
}

impl SourceField {
    pub fn new(label: &str, field: &str) -> Self {
        Self {
            label: label.to_string(),
            field: field.to_string(),
        }
    }
}

/// Era-aware missing policy: before `cutoff_year`, an all-zero row means "not collected".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraPolicy {
    pub cutoff_year: i32,
}

impl EraPolicy {
    pub fn suppresses(&self, year: i32, source_sum: f64) -> bool {
        year < self.cutoff_year && source_sum == 0.0
    }
}

/// A funding category broken down by source, with absolute and percentage views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownCategory {
    pub id: String,
    pub title: String,
    pub section: Section,
    pub y_label: String,
    pub sources: Vec<SourceField>,
    pub era_policy: Option<EraPolicy>,
}

/// A single-metric chart: the selected entity's series plus an optional
/// cross-entity yearly average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricChart {
    pub id: String,
    pub title: String,
    pub section: Section,
    pub y_label: String,
    pub field: String,
    pub label: String,
    pub with_average: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "chart", rename_all = "snake_case")]
pub enum ChartSpec {
    Metric(MetricChart),
    Breakdown(BreakdownCategory),
}

impl ChartSpec {
    pub fn id(&self) -> &str {
        match self {
            ChartSpec::Metric(m) => &m.id,
            ChartSpec::Breakdown(b) => &b.id,
        }
    }
}

/// Full configuration of the engine: schema columns, derived fields, charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub entity_column: String,
    pub year_column: String,
    /// Non-data columns that are never coerced to numbers.
    pub identifier_columns: Vec<String>,
    /// Evaluated in order; a later formula may read an earlier one.
    pub derived: Vec<DerivedField>,
    /// Charts in display order.
    pub charts: Vec<ChartSpec>,
}

impl Catalog {
    /// Columns excluded from numeric coercion (entity, year, identifiers).
    pub fn excluded_columns(&self) -> Vec<&str> {
        let mut out = vec![self.entity_column.as_str(), self.year_column.as_str()];
        out.extend(self.identifier_columns.iter().map(String::as_str));
        out
    }

    /// The NC county public-school catalog.
    pub fn nc_default() -> Self {
        let derived = vec![
            DerivedField::ratio("local_expenditure_per_pupil", "Expenditures.Local", "Enrollment.Final", 1.0),
            DerivedField::ratio("state_expenditure_per_pupil", "Expenditures.State", "Enrollment.Final", 1.0),
            DerivedField::ratio("federal_expenditure_per_pupil", "Expenditures.Federal", "Enrollment.Final", 1.0),
            DerivedField::ratio("local_funding_as_perc", "Expenditures.Local", "Expenditures.Total", 100.0),
            DerivedField::ratio("public_school_enrollment_perc", "Enrollment.Final", "Enrollment.Total", 100.0),
            DerivedField::ratio("perc_of_white_enrollment", "Enrollment.White", "Enrollment.Final", 100.0),
        ];

        let personnel_era = Some(EraPolicy {
            cutoff_year: PERSONNEL_ERA_CUTOFF,
        });

        let charts = vec![
            metric(
                "local_expenditure_per_pupil",
                "Local Public School Expenditure Per Pupil",
                Section::Financials,
                "Expenditure (000s)",
                "local_expenditure_per_pupil",
                "Local Expenditure Per Pupil",
                true,
            ),
            metric(
                "local_funding_as_perc",
                "Local Public School Funding as % of Total Expenditure",
                Section::Financials,
                "%",
                "local_funding_as_perc",
                "Local Public School Funding %",
                true,
            ),
            ChartSpec::Breakdown(BreakdownCategory {
                id: "per_pupil_by_source".to_string(),
                title: "Public School Expenditure Per Pupil by Source".to_string(),
                section: Section::Financials,
                y_label: "Expenditure (000s)".to_string(),
                sources: vec![
                    SourceField::new("Local", "local_expenditure_per_pupil"),
                    SourceField::new("State", "state_expenditure_per_pupil"),
                    SourceField::new("Federal", "federal_expenditure_per_pupil"),
                ],
                era_policy: None,
            }),
            by_source("salaries", "Salaries by Funding Source", "Salaries"),
            by_source("benefits", "Benefits by Funding Source", "Benefits"),
            by_source(
                "instructional_equipment",
                "Instructional Equipment by Funding Source",
                "Equipment",
            ),
            by_source("supplies", "Supplies by Funding Source", "Supplies"),
            ChartSpec::Breakdown(BreakdownCategory {
                id: "teachers".to_string(),
                title: "Teachers by Funding Source".to_string(),
                section: Section::Financials,
                y_label: "Positions".to_string(),
                sources: local_state_federal("Personnel.Teachers", ""),
                era_policy: personnel_era,
            }),
            ChartSpec::Breakdown(BreakdownCategory {
                id: "personnel".to_string(),
                title: "Personnel by Funding Source".to_string(),
                section: Section::Financials,
                y_label: "Positions".to_string(),
                sources: local_state_federal("Personnel.Teachers", "Teachers ")
                    .into_iter()
                    .chain(local_state_federal("Personnel.Assistants", "Assistants "))
                    .collect(),
                era_policy: personnel_era,
            }),
            metric(
                "final_enrollment",
                "Total Public School Enrollment",
                Section::Education,
                "Enrollment",
                "Enrollment.Final",
                "Total Enrollment",
                false,
            ),
            metric(
                "public_school_enrollment_perc",
                "Public School Enrollment as % of Total Enrollment",
                Section::Education,
                "%",
                "public_school_enrollment_perc",
                "Public School Enrollment %",
                true,
            ),
            ChartSpec::Breakdown(BreakdownCategory {
                id: "enrollment_by_race".to_string(),
                title: "Public School Enrollment by Race".to_string(),
                section: Section::Demographics,
                y_label: "Enrollment".to_string(),
                sources: vec![
                    SourceField::new("White", "Enrollment.White"),
                    SourceField::new("Black", "Enrollment.Black"),
                    SourceField::new("Hispanic", "Enrollment.Hispanic"),
                    SourceField::new("Other", "Enrollment.Other"),
                ],
                era_policy: None,
            }),
            metric(
                "perc_of_white_enrollment",
                "% of White Enrollment",
                Section::Demographics,
                "%",
                "perc_of_white_enrollment",
                "% of White Enrollment",
                true,
            ),
        ];

        Self {
            entity_column: ENTITY_COLUMN.to_string(),
            year_column: YEAR_COLUMN.to_string(),
            identifier_columns: vec!["area_type".to_string(), "fips".to_string()],
            derived,
            charts,
        }
    }
}

fn metric(
    id: &str,
    title: &str,
    section: Section,
    y_label: &str,
    field: &str,
    label: &str,
    with_average: bool,
) -> ChartSpec {
    ChartSpec::Metric(MetricChart {
        id: id.to_string(),
        title: title.to_string(),
        section,
        y_label: y_label.to_string(),
        field: field.to_string(),
        label: label.to_string(),
        with_average,
    })
}

fn by_source(id: &str, title: &str, prefix: &str) -> ChartSpec {
    ChartSpec::Breakdown(BreakdownCategory {
        id: id.to_string(),
        title: title.to_string(),
        section: Section::Financials,
        y_label: "Expenditure".to_string(),
        sources: local_state_federal(prefix, ""),
        era_policy: None,
    })
}

fn local_state_federal(prefix: &str, label_prefix: &str) -> Vec<SourceField> {
    ["Local", "State", "Federal"]
        .into_iter()
        .map(|source| SourceField {
            label: format!("{label_prefix}{source}"),
            field: format!("{prefix}.{source}"),
        })
        .collect()
}
