//! Feature-cache service
//!
//! Serves precomputed time-series and item features from
//! `DATA_DIR/cached_features.json`.

use std::sync::Arc;

use anyhow::Context;
use forecast_services::{
    app::{self, CacheState},
    config::{Config, ServiceRole},
    discovery,
    handlers::health::ServiceInfo,
    server,
    store::FeatureStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    forecast_services::init_tracing("forecast_services=debug,feature_cache=debug,tower_http=debug");

    let config = Config::from_env(ServiceRole::FeatureCache);
    tracing::info!("Feature cache starting ({})...", config.environment);

    let store = FeatureStore::load(&config.data_dir).context("Failed to load cached features")?;

    let http_client = discovery::http_client(config.http_timeout)?;
    let directory = discovery::from_config(&config, http_client)?;

    let state = CacheState {
        info: ServiceInfo::from_config(&config),
        store: Arc::new(store),
    };

    server::run(&config, app::create_cache_router(state), directory, Vec::new()).await
}
