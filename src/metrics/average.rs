//! Cross-entity yearly averages (the grey reference line on metric charts).

use std::collections::BTreeMap;

use crate::domain::{Dataset, SelectionWindow};

/// Mean of one metric over every qualifying entity in one year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearlyMean {
    pub year: i32,
    pub mean: f64,
    /// Number of entities that contributed.
    pub count: usize,
}

/// Per-year mean of `metric` across all entities within the window's years.
///
/// The window's entity is ignored. Missing, negative, and non-finite values are
/// excluded (negative funding/per-pupil values are upstream defects). Years
/// with no qualifying entity are omitted rather than reported as missing.
pub fn average(dataset: &Dataset, metric: &str, window: &SelectionWindow) -> Vec<YearlyMean> {
    let mut acc: BTreeMap<i32, (f64, usize)> = BTreeMap::new();

    for record in dataset.records() {
        if !window.contains_year(record.year) {
            continue;
        }
        let Some(v) = record.get(metric).get() else {
            continue;
        };
        if !v.is_finite() || v < 0.0 {
            continue;
        }
        let slot = acc.entry(record.year).or_insert((0.0, 0));
        slot.0 += v;
        slot.1 += 1;
    }

    acc.into_iter()
        .map(|(year, (sum, count))| YearlyMean {
            year,
            mean: sum / count as f64,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::domain::{Record, Value};

    const M: &str = "local_funding_as_perc";

    fn dataset() -> Dataset {
        let records = vec![
            Record::new("Ashe County", 2010).with(M, 10.0),
            Record::new("Wake County", 2010).with(M, 30.0),
            Record::new("Yancey County", 2010).with(M, -5.0),
            Record::new("Ashe County", 2011).with(M, Value::Missing),
            Record::new("Wake County", 2011).with(M, -1.0),
            Record::new("Ashe County", 2012).with(M, 40.0),
            Record::new("Ashe County", 2013).with(M, 7.0),
        ];
        Dataset::new(records, BTreeSet::new()).unwrap()
    }

    #[test]
    fn negatives_and_missing_are_excluded() {
        let out = average(&dataset(), M, &SelectionWindow::new("Wake County", 2010, 2012));
        assert_eq!(
            out,
            vec![
                YearlyMean { year: 2010, mean: 20.0, count: 2 },
                YearlyMean { year: 2012, mean: 40.0, count: 1 },
            ]
        );
    }

    #[test]
    fn years_without_contributors_are_absent() {
        let out = average(&dataset(), M, &SelectionWindow::new("Wake County", 2011, 2011));
        assert!(out.is_empty());
    }

    #[test]
    fn window_entity_does_not_restrict_average() {
        let out = average(&dataset(), M, &SelectionWindow::new("Nowhere", 2013, 2020));
        assert_eq!(out, vec![YearlyMean { year: 2013, mean: 7.0, count: 1 }]);
    }

    #[test]
    fn unknown_metric_is_empty() {
        assert!(average(&dataset(), "no_such_metric", &SelectionWindow::new("x", 1970, 2025)).is_empty());
    }
}
