//! Direct multi-quantile ensemble
//!
//! One sub-model per quantile level. Sub-models are fitted on `log1p(qty)`, so
//! every raw output is decoded with `exp(x) - 1` before it is reported.

use std::path::Path;

use super::{JsonModelLoader, ModelLoader, ParameterAdaptor, Prediction, PredictiveModel, Regressor};
use crate::{AppError, AppResult};

struct QuantileSlot {
    label: String,
    model: Option<Box<dyn Regressor>>,
}

pub struct QuantileEnsemble {
    model_name: String,
    horizon: u32,
    slots: Vec<QuantileSlot>,
}

impl QuantileEnsemble {
    /// Seeds one unloaded slot per quantile, labelled `q{level}`
    pub fn new(model_name: impl Into<String>, quantiles: &[u32], horizon: u32) -> Self {
        let mut slots: Vec<QuantileSlot> = Vec::with_capacity(quantiles.len());
        for q in quantiles {
            let label = format!("q{}", q);
            if slots.iter().any(|s| s.label == label) {
                continue;
            }
            slots.push(QuantileSlot { label, model: None });
        }

        Self {
            model_name: model_name.into(),
            horizon,
            slots,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    /// Quantile labels in declaration order
    pub fn labels(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn is_loaded(&self, label: &str) -> bool {
        self.slots.iter().any(|s| s.label == label && s.model.is_some())
    }

    pub fn is_fully_loaded(&self) -> bool {
        self.slots.iter().all(|s| s.model.is_some())
    }

    /// Artifact location of one quantile under `directory`, without extension
    pub fn artifact_path(&self, directory: &Path, label: &str) -> std::path::PathBuf {
        directory.join(format!("{}_{}", self.model_name, label))
    }
}

impl std::fmt::Debug for QuantileEnsemble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuantileEnsemble")
            .field("model_name", &self.model_name)
            .field("horizon", &self.horizon)
            .field("labels", &self.labels())
            .field("fully_loaded", &self.is_fully_loaded())
            .finish()
    }
}

impl PredictiveModel for QuantileEnsemble {
    /// Loads `directory/{model_name}_{label}` for every quantile.
    ///
    /// Stops at the first failing artifact; slots loaded before it keep their
    /// new model.
    fn load(&mut self, directory: &Path, loader: Option<&dyn ModelLoader>) -> AppResult<()> {
        let loader: &dyn ModelLoader = loader.unwrap_or(&JsonModelLoader);

        for i in 0..self.slots.len() {
            let path = self.artifact_path(directory, &self.slots[i].label);
            let model = loader.load(&path)?;
            self.slots[i].model = Some(model);
        }

        tracing::debug!(
            "Loaded {} quantile models for {} (h{})",
            self.slots.len(),
            self.model_name,
            self.horizon
        );
        Ok(())
    }

    fn predict(&self, parameters: &dyn ParameterAdaptor) -> AppResult<Prediction> {
        let features = parameters.parameters();

        // Batches are not supported; one record per call
        if features.len() != 1 {
            return Err(AppError::Validation(format!(
                "Quantile ensemble predicts exactly one row, got {}",
                features.len()
            )));
        }

        let mut predictions = Prediction::new();
        for slot in &self.slots {
            let model = slot
                .model
                .as_ref()
                .ok_or_else(|| AppError::ModelNotLoaded(format!("{}_{}", self.model_name, slot.label)))?;

            let raw = model
                .predict(features)?
                .first()
                .copied()
                .ok_or_else(|| AppError::Internal(format!("Model {} returned no output", slot.label)))?;

            predictions.insert(slot.label.clone(), raw.exp_m1());
        }

        Ok(predictions)
    }
}
