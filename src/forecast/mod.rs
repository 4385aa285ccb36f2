//! Forecasting model contract
//!
//! Separates "adapt raw input" ([`ParameterAdaptor`]) from "run the model"
//! ([`PredictiveModel`]) so the pool and the services never see feature
//! engineering, and any model family can be dropped in behind the same two
//! traits.
//!
//! ```text
//!  FeatureRecord ──▶ ParameterAdaptor::transform ──▶ parameters()
//!                                                        │
//!                      ModelLoader ──▶ Regressor ◀── PredictiveModel::predict
//! ```

pub mod table;
pub mod adaptor;
pub mod quantile;
pub mod linear;

use std::collections::BTreeMap;
use std::path::Path;

use crate::AppResult;

pub use table::{FeatureRecord, FeatureTable, FeatureValue};
pub use adaptor::{ClientItemAdaptor, RequiredFeatures, TIME_SERIES_FEATURES, ITEM_FEATURES};
pub use quantile::QuantileEnsemble;
pub use linear::{LinearModel, JsonModelLoader};

/// Named numeric outputs of one prediction, e.g. `{"q10": 4.2, "q90": 11.0}`
pub type Prediction = BTreeMap<String, f64>;

/// Translates raw feature data into the exact table a model expects
pub trait ParameterAdaptor: Send + Sync {
    /// Feature names `transform` input must contain
    fn required_features(&self) -> &[String];

    /// Validate, convert and derive model-specific columns; re-calling recomputes from scratch
    fn transform(&mut self, input: FeatureTable) -> AppResult<()>;

    /// Model input from the last `transform`; empty before the first call
    fn parameters(&self) -> &FeatureTable;
}

/// A loadable forecasting model
pub trait PredictiveModel: Send {
    /// Load artifacts from `path`; `None` selects the implementation's default loader
    fn load(&mut self, path: &Path, loader: Option<&dyn ModelLoader>) -> AppResult<()>;

    fn predict(&self, parameters: &dyn ParameterAdaptor) -> AppResult<Prediction>;
}

/// An opaque loaded model handle: one output per input row
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &FeatureTable) -> AppResult<Vec<f64>>;
}

/// Strategy for turning an artifact path into a [`Regressor`]
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> AppResult<Box<dyn Regressor>>;
}

impl<F> ModelLoader for F
where
    F: Fn(&Path) -> AppResult<Box<dyn Regressor>> + Send + Sync,
{
    fn load(&self, path: &Path) -> AppResult<Box<dyn Regressor>> {
        self(path)
    }
}
