//! Parameter adaptors

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate};

use super::{FeatureTable, FeatureValue, ParameterAdaptor};
use crate::{AppError, AppResult};

/// Lag and rolling statistics served by the feature cache
pub const TIME_SERIES_FEATURES: [&str; 12] = [
    "qty_lag1",
    "qty_lag5",
    "qty_lag10",
    "qty_lag20",
    "rolling_mean_3",
    "rolling_std_3",
    "rolling_mean_5",
    "rolling_std_5",
    "rolling_mean_10",
    "rolling_std_10",
    "days_since_client_purchase",
    "days_since_client_item_purchase",
];

/// Per-item attributes served by the feature cache
pub const ITEM_FEATURES: [&str; 3] = ["area", "color", "container"];

/// Immutable, non-empty list of feature names an adaptor requires
#[derive(Debug, Clone)]
pub struct RequiredFeatures(Vec<String>);

impl RequiredFeatures {
    pub fn new(features: Vec<String>) -> AppResult<Self> {
        if features.is_empty() {
            return Err(AppError::Validation(
                "There must be at least 1 required feature".to_string(),
            ));
        }
        Ok(Self(features))
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Fails naming exactly the required columns absent from `table`
    pub fn validate(&self, table: &FeatureTable) -> AppResult<()> {
        let missing = table.missing_columns(&self.0);
        if !missing.is_empty() {
            return Err(AppError::MissingFeatures(missing));
        }
        Ok(())
    }
}

/// Columns the client × item quantile models are trained on, in model order
const FORECAST_FEATURES: [&str; 28] = [
    "cust_code",
    "price",
    "cust_id",
    "item",
    "currency",
    "region",
    "category",
    "day_sin",
    "day_cos",
    "month",
    "dayofweek_cos",
    "dayofweek_sin",
    "dayofyear_sin",
    "dayofyear_cos",
    "quarter_sin",
    "quarter_cos",
    "qty_lag1",
    "qty_lag5",
    "qty_lag10",
    "qty_lag20",
    "rolling_mean_3",
    "rolling_std_3",
    "rolling_mean_5",
    "rolling_std_5",
    "rolling_mean_10",
    "rolling_std_10",
    "days_since_client_purchase",
    "days_since_client_item_purchase",
];

/// Adaptor for client × item demand models
///
/// Derives a `category` column (`color_container`), cyclical encodings of the
/// request date and `log1p(price)`. Lag and rolling statistics must already be
/// present in the input; they are served precomputed by the feature cache.
#[derive(Debug, Clone)]
pub struct ClientItemAdaptor {
    required: RequiredFeatures,
    input: FeatureTable,
    features: FeatureTable,
}

impl ClientItemAdaptor {
    pub fn new() -> Self {
        let mut names: Vec<String> = [
            "item", "date", "cust_id", "cust_code", "price", "region", "area", "color",
            "container", "currency",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        names.extend(TIME_SERIES_FEATURES.iter().map(|s| s.to_string()));

        Self {
            // Non-empty by construction
            required: RequiredFeatures(names),
            input: FeatureTable::default(),
            features: FeatureTable::default(),
        }
    }

    /// Full transformed table, including derived columns the model does not consume
    pub fn input(&self) -> &FeatureTable {
        &self.input
    }
}

impl Default for ClientItemAdaptor {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterAdaptor for ClientItemAdaptor {
    fn required_features(&self) -> &[String] {
        self.required.names()
    }

    fn transform(&mut self, input: FeatureTable) -> AppResult<()> {
        self.required.validate(&input)?;
        let mut df = input;
        let rows = df.len();

        let mut category = Vec::with_capacity(rows);
        let mut price = Vec::with_capacity(rows);
        let mut dates = Vec::with_capacity(rows);
        for row in 0..rows {
            let color = text_cell(&df, row, "color")?;
            let container = text_cell(&df, row, "container")?;
            category.push(FeatureValue::Text(format!("{}_{}", color, container)));

            let raw_price = numeric_cell(&df, row, "price")?;
            if raw_price <= -1.0 {
                return Err(AppError::Validation(format!("Invalid price {}", raw_price)));
            }
            price.push(FeatureValue::Number(raw_price.ln_1p()));

            dates.push(date_cell(&df, row)?);
        }
        df.set_column("category", category)?;
        df.set_column("price", price)?;

        let derive = |f: &dyn Fn(&NaiveDate) -> f64| -> Vec<FeatureValue> {
            dates.iter().map(|d| FeatureValue::Number(f(d))).collect()
        };

        // pandas conventions: Monday = 0, months and days 1-based
        df.set_column("dayofweek", derive(&|d: &NaiveDate| d.weekday().num_days_from_monday() as f64))?;
        df.set_column("dayofweek_sin", derive(&|d: &NaiveDate| cyclical_sin(d.weekday().num_days_from_monday(), 7.0)))?;
        df.set_column("dayofweek_cos", derive(&|d: &NaiveDate| cyclical_cos(d.weekday().num_days_from_monday(), 7.0)))?;
        df.set_column("month", derive(&|d: &NaiveDate| d.month() as f64))?;
        df.set_column("month_sin", derive(&|d: &NaiveDate| cyclical_sin(d.month(), 12.0)))?;
        df.set_column("month_cos", derive(&|d: &NaiveDate| cyclical_cos(d.month(), 12.0)))?;
        df.set_column("dayofyear", derive(&|d: &NaiveDate| d.ordinal() as f64))?;
        df.set_column("dayofyear_sin", derive(&|d: &NaiveDate| cyclical_sin(d.ordinal(), 365.0)))?;
        df.set_column("dayofyear_cos", derive(&|d: &NaiveDate| cyclical_cos(d.ordinal(), 365.0)))?;
        df.set_column("day", derive(&|d: &NaiveDate| d.day() as f64))?;
        df.set_column("day_sin", derive(&|d: &NaiveDate| cyclical_sin(d.day(), 30.0)))?;
        df.set_column("day_cos", derive(&|d: &NaiveDate| cyclical_cos(d.day(), 30.0)))?;
        df.set_column("year", derive(&|d: &NaiveDate| d.year() as f64))?;
        df.set_column("quarter", derive(&|d: &NaiveDate| quarter(d) as f64))?;
        df.set_column("quarter_sin", derive(&|d: &NaiveDate| cyclical_sin(quarter(d), 4.0)))?;
        df.set_column("quarter_cos", derive(&|d: &NaiveDate| cyclical_cos(quarter(d), 4.0)))?;

        self.features = df.select(&FORECAST_FEATURES)?;
        self.input = df;
        Ok(())
    }

    fn parameters(&self) -> &FeatureTable {
        &self.features
    }
}

fn quarter(date: &NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

fn cyclical_sin(value: u32, period: f64) -> f64 {
    (2.0 * PI * value as f64 / period).sin()
}

fn cyclical_cos(value: u32, period: f64) -> f64 {
    (2.0 * PI * value as f64 / period).cos()
}

fn text_cell(table: &FeatureTable, row: usize, column: &str) -> AppResult<String> {
    match table.get(row, column) {
        Some(FeatureValue::Missing) | None => Err(AppError::Validation(format!(
            "Column '{}' has no value in row {}",
            column, row
        ))),
        Some(value) => Ok(value.to_string()),
    }
}

fn numeric_cell(table: &FeatureTable, row: usize, column: &str) -> AppResult<f64> {
    table
        .get(row, column)
        .and_then(FeatureValue::as_f64)
        .ok_or_else(|| AppError::Validation(format!("Column '{}' must be numeric", column)))
}

/// Accepts `YYYY-MM-DD` or any RFC 3339 timestamp
fn date_cell(table: &FeatureTable, row: usize) -> AppResult<NaiveDate> {
    let raw = table
        .get(row, "date")
        .and_then(FeatureValue::as_str)
        .ok_or_else(|| AppError::Validation("Column 'date' must be a date string".to_string()))?;

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| AppError::Validation(format!("Invalid date '{}'", raw)))
}
