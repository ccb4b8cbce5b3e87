//! Shared query logic used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV load -> normalize -> derive -> (per query) select -> average/breakdown -> collection
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use std::path::Path;
use std::sync::Arc;

use crate::domain::{Catalog, Dataset, SelectionWindow, SeriesCollection};
use crate::error::AppError;
use crate::io::ingest::{LoadReport, load_dataset};
use crate::metrics::{DeriveReport, assemble};

/// A loaded dataset plus the catalog it was derived with.
///
/// Both halves are immutable after load, so clones are cheap and queries are
/// pure functions of the window.
#[derive(Debug, Clone)]
pub struct Engine {
    pub dataset: Arc<Dataset>,
    pub catalog: Arc<Catalog>,
    pub report: LoadReport,
    pub derive: DeriveReport,
}

impl Engine {
    pub fn load(path: &Path, catalog: Catalog) -> Result<Self, AppError> {
        let loaded = load_dataset(path, &catalog)?;
        Ok(Self {
            dataset: Arc::new(loaded.dataset),
            catalog: Arc::new(catalog),
            report: loaded.report,
            derive: loaded.derive,
        })
    }

    /// Build the full series collection for one window.
    pub fn query(&self, window: &SelectionWindow) -> SeriesCollection {
        let collection = assemble(&self.dataset, &self.catalog, window);
        tracing::debug!(
            entity = %window.entity_id,
            year_min = window.year_min,
            year_max = window.year_max,
            points = collection.years.len(),
            "collection assembled"
        );
        collection
    }

    /// Counties offered in pickers.
    pub fn counties(&self) -> Vec<&str> {
        selectable_counties(&self.dataset)
    }
}

/// Entities shown to users: county rows only, not the per-district "Schools"
/// rows or the state total.
pub fn selectable_counties(dataset: &Dataset) -> Vec<&str> {
    dataset
        .entities()
        .into_iter()
        .filter(|name| name.contains("County") && !name.contains("Schools"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Record;

    #[test]
    fn picker_filters_out_districts_and_state() {
        let records = vec![
            Record::new("Wake County", 2010),
            Record::new("Wake County Schools", 2010),
            Record::new("North Carolina", 2010),
            Record::new("Alamance County", 2010),
        ];
        let ds = Dataset::new(records, Default::default()).unwrap();
        assert_eq!(selectable_counties(&ds), vec!["Alamance County", "Wake County"]);
    }
}
