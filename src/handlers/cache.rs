//! Feature-cache handlers

use axum::{
    extract::{Path, State},
    Json,
};

use crate::app::CacheState;
use crate::extract::ValidatedJson;
use crate::forecast::FeatureRecord;
use crate::models::FeatureRequest;
use crate::AppResult;

/// Latest time-series features for a client/item pair
pub async fn time_features(
    State(state): State<CacheState>,
    ValidatedJson(req): ValidatedJson<FeatureRequest>,
) -> AppResult<Json<FeatureRecord>> {
    tracing::info!("time-features client={} item={}", req.client_name, req.item);

    let features = state.store.time_features(&req.client_name, &req.item)?;
    Ok(Json(features))
}

/// Category attributes of an item
pub async fn item_info(
    State(state): State<CacheState>,
    Path(item_id): Path<String>,
) -> AppResult<Json<FeatureRecord>> {
    tracing::info!("item item={}", item_id);

    let info = state.store.item_info(&item_id)?;
    Ok(Json(info))
}
