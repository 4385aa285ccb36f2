//! Application state and routers, one per service role
//!
//! ```text
//! ┌────────────────┐     ┌────────────────┐     ┌────────────────┐
//! │ routing        │ h5  │ predict (h5)   │     │ feature cache  │
//! │ /predict/{h}   │────▶│ /predict       │────▶│ /time-features │
//! │ /models        │     │ /admin/reload  │     │ /item/{item}   │
//! └───────┬────────┘     └───────┬────────┘     └───────┬────────┘
//!         └──────── lookup ──────┴──── register ────────┘
//!                          Consul / static directory
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::forecast::QuantileEnsemble;
use crate::handlers::{self, health::ServiceInfo};
use crate::pool::ModelPool;
use crate::routing::{FeatureCacheClient, PredictionRouter};
use crate::store::FeatureStore;

/// Feature-cache role state
#[derive(Clone, FromRef)]
pub struct CacheState {
    pub info: ServiceInfo,
    pub store: Arc<FeatureStore>,
}

/// Prediction role state
#[derive(Clone, FromRef)]
pub struct PredictState {
    pub info: ServiceInfo,
    pub config: Config,
    pub pool: ModelPool<QuantileEnsemble>,
    pub features: FeatureCacheClient,
    /// Directory holding the `Qhorizon{h}_q{level}` artifacts
    pub artifact_dir: PathBuf,
}

/// Routing role state
#[derive(Clone, FromRef)]
pub struct RoutingState {
    pub info: ServiceInfo,
    pub router: PredictionRouter,
}

pub fn create_cache_router(state: CacheState) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/time-features", post(handlers::cache::time_features))
        .route("/item/:item_id", get(handlers::cache::item_info));

    with_layers(routes).with_state(state)
}

pub fn create_predict_router(state: PredictState) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/predict", post(handlers::predict::predict))
        .route("/admin/reload", post(handlers::predict::reload));

    with_layers(routes).with_state(state)
}

pub fn create_routing_router(state: RoutingState) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/predict/:horizon", post(handlers::routing::predict))
        .route("/models", get(handlers::routing::models));

    with_layers(routes).with_state(state)
}

fn with_layers<S>(routes: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    routes
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
