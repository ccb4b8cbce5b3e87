//! Series collection assembly.
//!
//! Runs the selection filter once and fans out to every chart in the catalog.
//! No numeric logic lives here; the one invariant it owns is alignment: every
//! series has one point per filtered year, in order, with gaps as `Missing`.

use std::collections::HashMap;

use crate::domain::{
    Catalog, ChartSpec, Dataset, MetricChart, Mode, Record, SelectionWindow, Series, SeriesCollection, SeriesGroup,
    SeriesRole, Value,
};
use crate::metrics::{average, breakdown, select};

/// Label of the cross-entity reference series.
pub const AVERAGE_LABEL: &str = "Yearly Average for All Counties";

/// Compute every configured group for one selection.
pub fn assemble(dataset: &Dataset, catalog: &Catalog, window: &SelectionWindow) -> SeriesCollection {
    let records = select(dataset, window);
    let years: Vec<i32> = records.iter().map(|r| r.year).collect();

    if records.is_empty() {
        tracing::info!(entity = %window.entity_id, year_min = window.year_min, year_max = window.year_max, "selection is empty");
    }

    let groups: Vec<SeriesGroup> = catalog
        .charts
        .iter()
        .map(|chart| match chart {
            ChartSpec::Metric(metric) => metric_group(dataset, records, &years, metric, window),
            ChartSpec::Breakdown(category) => breakdown(records, category),
        })
        .collect();

    debug_assert!(
        groups
            .iter()
            .flat_map(|g| &g.series)
            .all(|s| s.is_aligned() && s.x == years),
        "every series must follow the filtered years"
    );

    SeriesCollection {
        window: window.clone(),
        years,
        groups,
    }
}

fn metric_group(
    dataset: &Dataset,
    records: &[Record],
    years: &[i32],
    metric: &MetricChart,
    window: &SelectionWindow,
) -> SeriesGroup {
    let mut entity = Series::new(&metric.label, Mode::Absolute, SeriesRole::Entity);
    for record in records {
        entity.push(record.year, record.get(&metric.field));
    }

    let mut series = vec![entity];

    if metric.with_average {
        let means: HashMap<i32, f64> = average(dataset, &metric.field, window)
            .into_iter()
            .map(|m| (m.year, m.mean))
            .collect();

        let mut reference = Series::new(AVERAGE_LABEL, Mode::Absolute, SeriesRole::Reference);
        for &year in years {
            reference.push(year, Value::from_option(means.get(&year).copied()));
        }
        series.push(reference);
    }

    SeriesGroup {
        id: metric.id.clone(),
        title: metric.title.clone(),
        section: metric.section,
        y_label: metric.y_label.clone(),
        series,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::metrics::derive_fields;

    fn raw_fields() -> BTreeSet<String> {
        [
            "Enrollment.Final",
            "Enrollment.Total",
            "Enrollment.White",
            "Expenditures.Local",
            "Expenditures.State",
            "Expenditures.Federal",
            "Expenditures.Total",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn wake(year: i32, local: Value) -> Record {
        Record::new("Wake County", year)
            .with("Expenditures.Local", local)
            .with("Expenditures.Total", 1000.0)
            .with("Enrollment.Final", 1000.0)
    }

    fn dataset() -> Dataset {
        let records = vec![
            wake(2010, Value::Present(100.0)),
            wake(2011, Value::Present(110.0)),
            wake(2012, Value::Missing),
            Record::new("Ashe County", 2010)
                .with("Expenditures.Local", 300.0)
                .with("Enrollment.Final", 1000.0),
            Record::new("Ashe County", 2013)
                .with("Expenditures.Local", 5.0)
                .with("Enrollment.Final", 10.0),
        ];
        let mut ds = Dataset::new(records, raw_fields()).unwrap();
        derive_fields(&mut ds, &Catalog::nc_default().derived).unwrap();
        ds
    }

    #[test]
    fn per_pupil_example_with_average_reference() {
        let ds = dataset();
        let out = assemble(&ds, &Catalog::nc_default(), &SelectionWindow::new("Wake County", 2010, 2012));
        assert_eq!(out.years, vec![2010, 2011, 2012]);

        let group = out.group("local_expenditure_per_pupil").unwrap();
        let entity = &group.series[0];
        assert_eq!(entity.role, SeriesRole::Entity);
        assert_eq!(entity.y, vec![Value::Present(0.1), Value::Present(0.11), Value::Missing]);

        let reference = &group.series[1];
        assert_eq!(reference.label, AVERAGE_LABEL);
        assert_eq!(reference.x, vec![2010, 2011, 2012]);
        // 2010: mean(0.1, 0.3); 2011: Wake only; 2012: nobody.
        let r0 = reference.y[0].get().unwrap();
        assert!((r0 - 0.2).abs() < 1e-12);
        assert_eq!(reference.y[1], Value::Present(0.11));
        assert_eq!(reference.y[2], Value::Missing);
    }

    #[test]
    fn every_series_is_aligned_to_filtered_years() {
        let ds = dataset();
        let catalog = Catalog::nc_default();
        let out = assemble(&ds, &catalog, &SelectionWindow::new("Wake County", 1970, 2025));
        assert_eq!(out.groups.len(), catalog.charts.len());
        for g in &out.groups {
            for s in &g.series {
                assert_eq!(s.x, out.years, "{} / {}", g.id, s.label);
                assert_eq!(s.y.len(), s.x.len());
            }
        }
    }

    #[test]
    fn single_year_window_gives_length_one_series() {
        let ds = dataset();
        let out = assemble(&ds, &Catalog::nc_default(), &SelectionWindow::new("Wake County", 2011, 2011));
        assert!(out.groups.iter().flat_map(|g| &g.series).all(|s| s.len() == 1));
    }

    #[test]
    fn unknown_entity_degrades_to_empty_series() {
        let ds = dataset();
        let out = assemble(&ds, &Catalog::nc_default(), &SelectionWindow::new("Nowhere County", 2010, 2012));
        assert!(out.is_empty());
        assert!(!out.groups.is_empty());
        assert!(out.groups.iter().flat_map(|g| &g.series).all(|s| s.is_empty()));
    }

    #[test]
    fn groups_follow_catalog_order() {
        let ds = dataset();
        let catalog = Catalog::nc_default();
        let out = assemble(&ds, &catalog, &SelectionWindow::new("Wake County", 2010, 2012));
        let ids: Vec<&str> = out.groups.iter().map(|g| g.id.as_str()).collect();
        let expected: Vec<&str> = catalog.charts.iter().map(|c| c.id()).collect();
        assert_eq!(ids, expected);
    }
}
