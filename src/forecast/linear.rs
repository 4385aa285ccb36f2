//! Linear regressor artifacts
//!
//! Default artifact format for quantile sub-models: a JSON document holding
//! an intercept, per-column coefficients for numeric features and per-level
//! offsets for categorical ones. Outputs are in the same (log) space the model
//! was fitted in.
//!
//! ```json
//! {
//!   "intercept": 0.4,
//!   "coefficients": { "price": 0.12, "qty_lag1": 0.3 },
//!   "categorical": { "region": { "BRAZIL": 0.05 } }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::{FeatureTable, FeatureValue, ModelLoader, Regressor};
use crate::{AppError, AppResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,

    #[serde(default)]
    pub coefficients: BTreeMap<String, f64>,

    /// column -> level -> additive offset; unseen levels contribute nothing
    #[serde(default)]
    pub categorical: BTreeMap<String, BTreeMap<String, f64>>,
}

impl LinearModel {
    fn numeric_matrix(&self, features: &FeatureTable) -> AppResult<(Array2<f64>, Array1<f64>)> {
        let names: Vec<&String> = self.coefficients.keys().collect();
        let mut matrix = Array2::<f64>::zeros((features.len(), names.len()));

        for (j, name) in names.iter().enumerate() {
            let column = features
                .column(name)
                .ok_or_else(|| AppError::MissingFeatures(vec![name.to_string()]))?;

            for (i, value) in column.into_iter().enumerate() {
                matrix[[i, j]] = match value {
                    FeatureValue::Number(n) => *n,
                    // absent numeric inputs contribute nothing
                    FeatureValue::Missing => 0.0,
                    FeatureValue::Text(t) => {
                        return Err(AppError::Validation(format!(
                            "Feature '{}' must be numeric, got '{}'",
                            name, t
                        )))
                    }
                };
            }
        }

        let weights = Array1::from_iter(self.coefficients.values().copied());
        Ok((matrix, weights))
    }
}

impl Regressor for LinearModel {
    fn predict(&self, features: &FeatureTable) -> AppResult<Vec<f64>> {
        let (matrix, weights) = self.numeric_matrix(features)?;
        let mut output = matrix.dot(&weights) + self.intercept;

        for (name, levels) in &self.categorical {
            let column = features
                .column(name)
                .ok_or_else(|| AppError::MissingFeatures(vec![name.clone()]))?;

            for (i, value) in column.into_iter().enumerate() {
                if let Some(offset) = value.as_key().and_then(|k| levels.get(&k)) {
                    output[i] += offset;
                }
            }
        }

        Ok(output.to_vec())
    }
}

/// Loads [`LinearModel`] artifacts from `{path}.json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModelLoader;

impl JsonModelLoader {
    pub fn artifact_path(path: &Path) -> PathBuf {
        let mut file = path.as_os_str().to_owned();
        file.push(".json");
        PathBuf::from(file)
    }
}

impl ModelLoader for JsonModelLoader {
    fn load(&self, path: &Path) -> AppResult<Box<dyn Regressor>> {
        let file = Self::artifact_path(path);
        if !file.exists() {
            return Err(AppError::ArtifactNotFound(file));
        }

        let raw = std::fs::read_to_string(&file).map_err(|e| AppError::ArtifactCorrupt {
            path: file.clone(),
            message: e.to_string(),
        })?;
        let model: LinearModel = serde_json::from_str(&raw).map_err(|e| AppError::ArtifactCorrupt {
            path: file.clone(),
            message: e.to_string(),
        })?;

        tracing::debug!(
            "Loaded linear artifact {} ({} numeric, {} categorical)",
            file.display(),
            model.coefficients.len(),
            model.categorical.len()
        );
        Ok(Box::new(model))
    }
}
