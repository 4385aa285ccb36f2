//! Feature records and tables
//!
//! A [`FeatureRecord`] is one flat row of named scalars as it arrives over the
//! wire. A [`FeatureTable`] is the column-ordered form adaptors hand to models.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

/// Largest magnitude below which every integer is an exact `f64`
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// One scalar feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FeatureValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FeatureValue::Missing)
    }

    /// Key used when matching identifiers that may be stored as numbers or text.
    ///
    /// Integral numbers inside the exactly representable range render as
    /// integers; anything larger keeps its full float text.
    pub fn as_key(&self) -> Option<String> {
        match self {
            FeatureValue::Text(s) => Some(s.clone()),
            FeatureValue::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER => {
                Some(format!("{}", *n as i64))
            }
            FeatureValue::Number(n) => Some(n.to_string()),
            FeatureValue::Missing => None,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Number(n) => write!(f, "{}", n),
            FeatureValue::Text(s) => write!(f, "{}", s),
            FeatureValue::Missing => write!(f, "null"),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Number(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        FeatureValue::Text(value)
    }
}

/// Flat mapping of named scalar features
pub type FeatureRecord = BTreeMap<String, FeatureValue>;

/// Column-ordered table of feature values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<FeatureValue>>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<FeatureValue>>) -> AppResult<Self> {
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(AppError::Validation(format!(
                "Row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from records; columns are the union of all keys, absent cells are `Missing`
    pub fn from_records(records: &[FeatureRecord]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).cloned().unwrap_or(FeatureValue::Missing))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&FeatureValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn column(&self, name: &str) -> Option<Vec<&FeatureValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Names from `required` that are not columns of this table, in `required` order
    pub fn missing_columns(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|name| !self.has_column(name))
            .cloned()
            .collect()
    }

    /// Add a column, or replace it in place if it already exists
    pub fn set_column(&mut self, name: &str, values: Vec<FeatureValue>) -> AppResult<()> {
        if values.len() != self.rows.len() {
            return Err(AppError::Validation(format!(
                "Column '{}' has {} values, table has {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Project onto `names`, in that order
    pub fn select(&self, names: &[&str]) -> AppResult<FeatureTable> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| !self.has_column(n))
            .map(|n| n.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::MissingFeatures(missing));
        }

        let indices: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();

        Ok(FeatureTable {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows,
        })
    }

    pub fn record(&self, row: usize) -> Option<FeatureRecord> {
        let values = self.rows.get(row)?;
        Some(self.columns.iter().cloned().zip(values.iter().cloned()).collect())
    }
}

impl From<FeatureRecord> for FeatureTable {
    fn from(record: FeatureRecord) -> Self {
        let (columns, values): (Vec<String>, Vec<FeatureValue>) = record.into_iter().unzip();
        FeatureTable {
            columns,
            rows: vec![values],
        }
    }
}
