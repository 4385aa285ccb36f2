//! Prediction handlers

use axum::{extract::State, Json};

use crate::app::PredictState;
use crate::extract::ValidatedJson;
use crate::forecast::{ClientItemAdaptor, FeatureTable, ParameterAdaptor, Prediction};
use crate::models::{PredictRequest, ReloadResponse};
use crate::{AppError, AppResult};

/// Fetch cached features, adapt them and run one pooled prediction
pub async fn predict(
    State(state): State<PredictState>,
    ValidatedJson(req): ValidatedJson<PredictRequest>,
) -> AppResult<Json<Prediction>> {
    let cached = state.features.fetch(&req.client_name, &req.item).await?;

    let today = chrono::Local::now().date_naive();
    let record = req.to_record(today, cached);

    let mut adaptor = ClientItemAdaptor::new();
    adaptor.transform(FeatureTable::from(record))?;

    let prediction = state.pool.predict(adaptor, state.config.pool_timeout).await?;

    tracing::info!(
        "Predicted h{} for client={} item={}: {:?}",
        state.config.predict_horizon,
        req.client_name,
        req.item,
        prediction
    );
    Ok(Json(prediction))
}

/// Reload every pooled ensemble from the artifact directory
pub async fn reload(State(state): State<PredictState>) -> AppResult<Json<ReloadResponse>> {
    let pool = state.pool.clone();
    let directory = state.artifact_dir.clone();

    tokio::task::spawn_blocking(move || pool.load(&directory))
        .await
        .map_err(|e| AppError::Internal(format!("Reload task failed: {}", e)))??;

    Ok(Json(ReloadResponse {
        reloaded: true,
        instances: state.pool.size(),
    }))
}
