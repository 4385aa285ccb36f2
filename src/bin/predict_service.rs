//! Prediction service
//!
//! Serves one forecast horizon from a pool of quantile ensembles and
//! registers under the `h{horizon}` tag.

use std::sync::Arc;

use anyhow::Context;
use forecast_services::{
    app::{self, PredictState},
    config::{Config, ServiceRole},
    discovery,
    forecast::{JsonModelLoader, ModelLoader, QuantileEnsemble},
    handlers::health::ServiceInfo,
    pool::ModelPool,
    routing::FeatureCacheClient,
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    forecast_services::init_tracing("forecast_services=debug,predict_service=debug,tower_http=debug");

    let config = Config::from_env(ServiceRole::Prediction);
    tracing::info!(
        "Prediction service starting: horizon h{}, quantiles {:?}, pool {}",
        config.predict_horizon,
        config.quantiles,
        config.model_pool_size
    );

    let loader: Arc<dyn ModelLoader> = Arc::new(JsonModelLoader);
    let model_name = config.model_name();
    let pool = ModelPool::new(config.model_pool_size, Some(loader), || {
        QuantileEnsemble::new(model_name.clone(), &config.quantiles, config.predict_horizon)
    })?;

    let artifact_dir = config.models_dir.join("quantile_forecast");
    pool.load(&artifact_dir)
        .with_context(|| format!("Failed to load models from {}", artifact_dir.display()))?;

    let http_client = discovery::http_client(config.http_timeout)?;
    let directory = discovery::from_config(&config, http_client.clone())?;
    let features = FeatureCacheClient::new(directory.clone(), http_client, config.feature_cache_service.clone());

    let state = PredictState {
        info: ServiceInfo::from_config(&config),
        config: config.clone(),
        pool,
        features,
        artifact_dir,
    };

    let tags = vec![config.horizon_tag()];
    server::run(&config, app::create_predict_router(state), directory, tags).await
}
