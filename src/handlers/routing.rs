//! Routing handlers

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::header,
    response::Response,
    Json,
};

use crate::app::RoutingState;
use crate::models::ModelsResponse;
use crate::{AppError, AppResult};

/// Forward a prediction request to an instance serving `horizon`
pub async fn predict(
    State(state): State<RoutingState>,
    Path(horizon): Path<String>,
    body: Bytes,
) -> AppResult<Response> {
    let forwarded = state.router.forward(&horizon, body).await?;

    let mut builder = Response::builder().status(forwarded.status);
    if let Some(content_type) = forwarded.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    builder
        .body(Body::from(forwarded.body))
        .map_err(|e| AppError::Internal(format!("Failed to build forwarded response: {}", e)))
}

/// Horizons currently served by healthy prediction instances
pub async fn models(State(state): State<RoutingState>) -> AppResult<Json<ModelsResponse>> {
    let models = state.router.models().await?;
    Ok(Json(ModelsResponse { models }))
}
