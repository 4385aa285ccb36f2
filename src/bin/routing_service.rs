//! Routing service
//!
//! Forwards `/predict/{horizon}` to a healthy prediction instance tagged with
//! that horizon.

use forecast_services::{
    app::{self, RoutingState},
    config::{Config, ServiceRole},
    discovery,
    handlers::health::ServiceInfo,
    routing::PredictionRouter,
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    forecast_services::init_tracing("forecast_services=debug,routing_service=debug,tower_http=debug");

    let config = Config::from_env(ServiceRole::Routing);
    tracing::info!("Routing service starting, forwarding to {}", config.predict_service);

    let http_client = discovery::http_client(config.http_timeout)?;
    let directory = discovery::from_config(&config, http_client.clone())?;

    let state = RoutingState {
        info: ServiceInfo::from_config(&config),
        router: PredictionRouter::new(directory.clone(), http_client, config.predict_service.clone()),
    };

    server::run(&config, app::create_routing_router(state), directory, Vec::new()).await
}
