//! Cached feature dataset
//!
//! Read-only table of precomputed per-(client, item) rows served by the
//! feature-cache role. Rows are kept in file order; "latest" means the last
//! matching row.

use std::path::{Path, PathBuf};

use crate::forecast::{FeatureRecord, FeatureTable, ITEM_FEATURES, TIME_SERIES_FEATURES};
use crate::{AppError, AppResult};

/// File name of the dataset inside the data directory
pub const DATASET_FILE: &str = "cached_features.json";

#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    table: FeatureTable,
}

impl FeatureStore {
    pub fn from_records(records: &[FeatureRecord]) -> Self {
        Self {
            table: FeatureTable::from_records(records),
        }
    }

    /// Load `data_dir/cached_features.json`, a JSON array of flat records
    pub fn load(data_dir: &Path) -> AppResult<Self> {
        let path: PathBuf = data_dir.join(DATASET_FILE);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| AppError::Internal(format!("Failed to read dataset {}: {}", path.display(), e)))?;
        let records: Vec<FeatureRecord> = serde_json::from_str(&raw)
            .map_err(|e| AppError::Internal(format!("Failed to parse dataset {}: {}", path.display(), e)))?;

        let store = Self::from_records(&records);
        tracing::info!(
            "Loaded {} cached feature rows ({} columns) from {}",
            store.len(),
            store.table.columns().len(),
            path.display()
        );
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Time-series features of the most recent row for `client` and `item`
    pub fn time_features(&self, client: &str, item: &str) -> AppResult<FeatureRecord> {
        self.require_columns(&["cust_id", "item"])?;

        let row = self
            .last_row(|row| self.matches(row, "cust_id", client) && self.matches(row, "item", item))
            .ok_or_else(|| AppError::NotFound(format!("No data for client={} and item={}", client, item)))?;

        self.require_columns(&TIME_SERIES_FEATURES)?;
        Ok(self.project(row, &TIME_SERIES_FEATURES))
    }

    /// Item attributes from the most recent row of `item`
    pub fn item_info(&self, item: &str) -> AppResult<FeatureRecord> {
        self.require_columns(&["item"])?;

        let row = self
            .last_row(|row| self.matches(row, "item", item))
            .ok_or_else(|| AppError::NotFound(format!("No data for item={}", item)))?;

        self.require_columns(&ITEM_FEATURES)?;
        Ok(self.project(row, &ITEM_FEATURES))
    }

    fn require_columns(&self, names: &[&str]) -> AppResult<()> {
        let missing: Vec<&str> = names.iter().copied().filter(|n| !self.table.has_column(n)).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Missing required features in dataset: {:?}", missing)))
        }
    }

    fn matches(&self, row: usize, column: &str, wanted: &str) -> bool {
        self.table
            .get(row, column)
            .and_then(|v| v.as_key())
            .is_some_and(|k| k == wanted)
    }

    fn last_row<P>(&self, predicate: P) -> Option<usize>
    where
        P: Fn(usize) -> bool,
    {
        (0..self.table.len()).rev().find(|&row| predicate(row))
    }

    fn project(&self, row: usize, names: &[&str]) -> FeatureRecord {
        names
            .iter()
            .filter_map(|n| self.table.get(row, n).map(|v| (n.to_string(), v.clone())))
            .collect()
    }
}
