//! Selection filter: one entity, an inclusive year range.

use crate::domain::{Dataset, Record, SelectionWindow};

/// Records for `window.entity_id` with `year_min <= year <= year_max`, in year order.
///
/// Unknown entities and inverted windows yield an empty slice.
pub fn select<'a>(dataset: &'a Dataset, window: &SelectionWindow) -> &'a [Record] {
    if window.year_min > window.year_max {
        return &[];
    }

    // Records are sorted by (entity, year), so the window is one contiguous run.
    let records = dataset.records();
    let entity = window.entity_id.as_str();
    let lo = records.partition_point(|r| (r.entity_id.as_str(), r.year) < (entity, window.year_min));
    let hi = records.partition_point(|r| (r.entity_id.as_str(), r.year) <= (entity, window.year_max));

    &records[lo..hi.max(lo)]
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn dataset() -> Dataset {
        let mut records = Vec::new();
        for entity in ["Ashe County", "Wake County", "Yancey County"] {
            for year in 2008..=2012 {
                records.push(Record::new(entity, year));
            }
        }
        Dataset::new(records, BTreeSet::new()).unwrap()
    }

    fn years(records: &[Record]) -> Vec<i32> {
        records.iter().map(|r| r.year).collect()
    }

    #[test]
    fn selects_entity_and_inclusive_range() {
        let ds = dataset();
        let out = select(&ds, &SelectionWindow::new("Wake County", 2009, 2011));
        assert!(out.iter().all(|r| r.entity_id == "Wake County"));
        assert_eq!(years(out), vec![2009, 2010, 2011]);
    }

    #[test]
    fn window_wider_than_data_is_clamped() {
        let ds = dataset();
        let out = select(&ds, &SelectionWindow::new("Yancey County", 1970, 2025));
        assert_eq!(years(out), vec![2008, 2009, 2010, 2011, 2012]);
    }

    #[test]
    fn single_year_returns_at_most_one_record() {
        let ds = dataset();
        assert_eq!(select(&ds, &SelectionWindow::new("Ashe County", 2010, 2010)).len(), 1);
        assert_eq!(select(&ds, &SelectionWindow::new("Ashe County", 1990, 1990)).len(), 0);
    }

    #[test]
    fn unknown_entity_and_inverted_window_are_empty() {
        let ds = dataset();
        assert!(select(&ds, &SelectionWindow::new("Durham Public Schools", 2008, 2012)).is_empty());
        assert!(select(&ds, &SelectionWindow::new("Wake County", 2012, 2008)).is_empty());
    }
}
