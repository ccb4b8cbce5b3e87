//! Derived field calculator.
//!
//! Evaluates the catalog's declarative formulas once per record at load time.
//! Evaluation is total: a missing operand or a zero denominator yields
//! `Missing`, never `Inf`/`NaN`. The one fatal condition is structural: a
//! formula that reads a column the dataset does not have.

use rayon::prelude::*;

use crate::domain::{Dataset, DerivedField, Formula, Record, Value, safe_div};
use crate::error::AppError;

/// Summary of a derive pass.
#[derive(Debug, Clone)]
pub struct DeriveReport {
    /// `(field, records with a present value)` in catalog order.
    pub present_counts: Vec<(String, usize)>,
    pub records: usize,
}

/// Evaluate one formula for one record.
pub fn evaluate(record: &Record, field: &DerivedField) -> Value {
    match &field.formula {
        Formula::Ratio {
            numerator,
            denominator,
            scale,
        } => {
            let scale = *scale;
            safe_div(record.get(numerator).map(|n| n * scale), record.get(denominator))
        }
    }
}

/// Pure form: return a copy of `record` with every derived field added.
pub fn compute(record: &Record, derived: &[DerivedField]) -> Record {
    let mut out = record.clone();
    apply(&mut out, derived);
    out
}

fn apply(record: &mut Record, derived: &[DerivedField]) {
    for field in derived {
        let value = evaluate(record, field);
        record.set(&field.name, value);
    }
}

/// Verify every formula input exists, either as a dataset column or as an
/// earlier derived field. Reports all missing columns at once.
pub fn check_required_columns(dataset: &Dataset, derived: &[DerivedField]) -> Result<(), AppError> {
    let mut missing: Vec<String> = Vec::new();
    let mut available_derived: Vec<&str> = Vec::new();

    for field in derived {
        for input in field.inputs() {
            let known = dataset.has_field(input) || available_derived.contains(&input);
            if !known && !missing.iter().any(|m| m == input) {
                missing.push(input.to_string());
            }
        }
        available_derived.push(&field.name);
    }

    if missing.is_empty() {
        return Ok(());
    }

    let list = missing.iter().map(|m| format!("`{m}`")).collect::<Vec<_>>().join(", ");
    Err(AppError::input(format!(
        "Dataset is missing column(s) required by derived fields: {list}"
    )))
}

/// Add every derived field to the dataset in place.
///
/// Records are independent, so evaluation runs in parallel.
pub fn derive_fields(dataset: &mut Dataset, derived: &[DerivedField]) -> Result<DeriveReport, AppError> {
    check_required_columns(dataset, derived)?;

    dataset.records_mut().par_iter_mut().for_each(|record| apply(record, derived));
    for field in derived {
        dataset.insert_field(&field.name);
    }

    let present_counts: Vec<(String, usize)> = derived
        .iter()
        .map(|field| {
            let n = dataset
                .records()
                .iter()
                .filter(|r| !r.get(&field.name).is_missing())
                .count();
            (field.name.clone(), n)
        })
        .collect();

    for (name, n) in &present_counts {
        tracing::debug!(field = %name, present = n, records = dataset.len(), "derived field evaluated");
    }

    Ok(DeriveReport {
        present_counts,
        records: dataset.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::domain::Catalog;

    fn per_pupil() -> DerivedField {
        DerivedField::ratio("local_expenditure_per_pupil", "Expenditures.Local", "Enrollment.Final", 1.0)
    }

    fn funding_perc() -> DerivedField {
        DerivedField::ratio("local_funding_as_perc", "Expenditures.Local", "Expenditures.Total", 100.0)
    }

    fn fields(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn zero_enrollment_gives_missing_per_pupil() {
        let r = Record::new("Wake County", 2010)
            .with("Expenditures.Local", 100.0)
            .with("Enrollment.Final", 0.0);
        assert_eq!(evaluate(&r, &per_pupil()), Value::Missing);
    }

    #[test]
    fn missing_or_zero_total_gives_missing_funding_perc() {
        let zero = Record::new("Wake County", 2010)
            .with("Expenditures.Local", 10.0)
            .with("Expenditures.Total", 0.0);
        let missing = Record::new("Wake County", 2011).with("Expenditures.Local", 10.0);
        assert_eq!(evaluate(&zero, &funding_perc()), Value::Missing);
        assert_eq!(evaluate(&missing, &funding_perc()), Value::Missing);

        let ok = Record::new("Wake County", 2012)
            .with("Expenditures.Local", 25.0)
            .with("Expenditures.Total", 200.0);
        assert_eq!(evaluate(&ok, &funding_perc()), Value::Present(12.5));
    }

    #[test]
    fn per_pupil_example_series() {
        let records = vec![
            Record::new("Wake County", 2010)
                .with("Expenditures.Local", 100.0)
                .with("Enrollment.Final", 1000.0),
            Record::new("Wake County", 2011)
                .with("Expenditures.Local", 110.0)
                .with("Enrollment.Final", 1000.0),
            Record::new("Wake County", 2012)
                .with("Expenditures.Local", Value::Missing)
                .with("Enrollment.Final", 1000.0),
        ];
        let got: Vec<Value> = records
            .iter()
            .map(|r| compute(r, &[per_pupil()]).get("local_expenditure_per_pupil"))
            .collect();
        assert_eq!(got, vec![Value::Present(0.1), Value::Present(0.11), Value::Missing]);
    }

    #[test]
    fn compute_leaves_input_untouched() {
        let r = Record::new("Wake County", 2010).with("Expenditures.Local", 1.0);
        let out = compute(&r, &[per_pupil()]);
        assert!(!r.fields.contains_key("local_expenditure_per_pupil"));
        assert!(out.fields.contains_key("local_expenditure_per_pupil"));
    }

    #[test]
    fn missing_column_is_a_structural_error() {
        let mut ds = Dataset::new(
            vec![Record::new("Wake County", 2010)],
            fields(&["Expenditures.Local"]),
        )
        .unwrap();
        let err = derive_fields(&mut ds, &[per_pupil(), funding_perc()]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("`Enrollment.Final`"));
        assert!(err.message().contains("`Expenditures.Total`"));
    }

    #[test]
    fn later_formula_may_read_earlier_derived_field() {
        let chained = DerivedField::ratio("double_ratio", "local_expenditure_per_pupil", "Enrollment.Final", 1.0);
        let ds = Dataset::new(Vec::new(), fields(&["Expenditures.Local", "Enrollment.Final"])).unwrap();
        assert!(check_required_columns(&ds, &[per_pupil(), chained.clone()]).is_ok());
        assert!(check_required_columns(&ds, &[chained, per_pupil()]).is_err());
    }

    #[test]
    fn derive_fields_extends_dataset() {
        let catalog = Catalog::nc_default();
        let inputs: BTreeSet<String> = catalog
            .derived
            .iter()
            .flat_map(|d| d.inputs())
            .filter(|i| !catalog.derived.iter().any(|d| d.name == *i))
            .map(str::to_string)
            .collect();
        let mut ds = Dataset::new(
            vec![
                Record::new("Wake County", 2010)
                    .with("Expenditures.Local", 50.0)
                    .with("Expenditures.Total", 200.0)
                    .with("Enrollment.Final", 10.0),
            ],
            inputs,
        )
        .unwrap();

        let report = derive_fields(&mut ds, &catalog.derived).unwrap();
        assert_eq!(report.records, 1);
        assert!(ds.has_field("local_funding_as_perc"));
        let r = &ds.records()[0];
        assert_eq!(r.get("local_funding_as_perc"), Value::Present(25.0));
        assert_eq!(r.get("local_expenditure_per_pupil"), Value::Present(5.0));
        assert_eq!(r.get("public_school_enrollment_perc"), Value::Missing);
    }
}
