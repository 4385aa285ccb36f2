//! Process lifecycle shared by the service binaries

use std::sync::Arc;

use anyhow::Context;
use axum::Router;

use crate::config::Config;
use crate::discovery::{Directory, ServiceRegistration};

/// Bind, register with the directory, serve until Ctrl-C, then deregister
pub async fn run(config: &Config, app: Router, directory: Arc<dyn Directory>, tags: Vec<String>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let registration = ServiceRegistration::from_config(config, tags);
    let identity = directory
        .register(&registration)
        .await
        .with_context(|| format!("Failed to register {}", registration.identity()))?;
    tracing::info!("{} registered as {}", config.service_name, identity);

    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Err(e) = directory.deregister(&identity).await {
        tracing::warn!("Failed to deregister {}: {}", identity, e);
    }
    tracing::info!("{} stopped", identity);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
