//! Funding-source breakdowns.
//!
//! For a category with N source fields, each record yields:
//!
//! - the absolute value of every source (as stored; absent reads as `Missing`)
//! - a safe total: the sum of sources with `Missing` counted as 0, or `Missing`
//!   when that sum is 0 (so it is never used as a zero divisor)
//! - each source's share of the safe total, in percent
//!
//! Categories carrying an [`EraPolicy`] additionally treat a zero-sum row from
//! before the cutoff year as "not collected": every output for that year is
//! `Missing`. From the cutoff on, a zero sum is a real zero.

use crate::domain::{BreakdownCategory, EraPolicy, Mode, Record, Series, SeriesGroup, SeriesRole, Value, safe_div};

/// Breakdown of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownPoint {
    pub year: i32,
    /// One entry per source, in category order.
    pub absolute: Vec<Value>,
    pub percentage: Vec<Value>,
    pub total: Value,
    /// True when the era policy marked the row as not collected.
    pub suppressed: bool,
}

/// Sum of source values, `Missing` counted as 0.
fn source_sum(values: &[Value]) -> f64 {
    values.iter().map(|v| v.or_zero()).sum()
}

/// A zero total is not a usable divisor.
fn safe_total(sum: f64) -> Value {
    if sum == 0.0 { Value::Missing } else { Value::new(sum) }
}

fn is_suppressed(policy: Option<EraPolicy>, year: i32, sum: f64) -> bool {
    policy.is_some_and(|p| p.suppresses(year, sum))
}

/// Compute absolute values, safe total, and percentages for one record.
pub fn breakdown_point(record: &Record, category: &BreakdownCategory) -> BreakdownPoint {
    let absolute: Vec<Value> = category.sources.iter().map(|s| record.get(&s.field)).collect();
    let sum = source_sum(&absolute);

    if is_suppressed(category.era_policy, record.year, sum) {
        let n = absolute.len();
        return BreakdownPoint {
            year: record.year,
            absolute: vec![Value::Missing; n],
            percentage: vec![Value::Missing; n],
            total: Value::Missing,
            suppressed: true,
        };
    }

    let total = safe_total(sum);

    // A source that is itself missing has no share to report, but it still
    // counted as 0 in the total so the other shares stay computable.
    let percentage = absolute
        .iter()
        .map(|v| match v {
            Value::Present(x) => safe_div(Value::Present(*x), total).map(|share| share * 100.0),
            Value::Missing => Value::Missing,
        })
        .collect();

    BreakdownPoint {
        year: record.year,
        absolute,
        percentage,
        total,
        suppressed: false,
    }
}

/// Build the dual-mode series group for a category over the selected records.
///
/// Every series has one point per record, in record order.
pub fn breakdown(records: &[Record], category: &BreakdownCategory) -> SeriesGroup {
    let mut absolute: Vec<Series> = category
        .sources
        .iter()
        .map(|s| Series::new(&s.label, Mode::Absolute, SeriesRole::Entity))
        .collect();
    let mut percentage: Vec<Series> = category
        .sources
        .iter()
        .map(|s| Series::new(&s.label, Mode::Percentage, SeriesRole::Entity))
        .collect();

    let mut suppressed = 0usize;
    for record in records {
        let point = breakdown_point(record, category);
        if point.suppressed {
            suppressed += 1;
        }
        for (i, series) in absolute.iter_mut().enumerate() {
            series.push(point.year, point.absolute[i]);
        }
        for (i, series) in percentage.iter_mut().enumerate() {
            series.push(point.year, point.percentage[i]);
        }
    }

    if suppressed > 0 {
        tracing::debug!(category = %category.id, suppressed, "rows treated as not collected");
    }

    absolute.extend(percentage);

    SeriesGroup {
        id: category.id.clone(),
        title: category.title.clone(),
        section: category.section,
        y_label: category.y_label.clone(),
        series: absolute,
    }
}
