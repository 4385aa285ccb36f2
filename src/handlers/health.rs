//! Health check handler
//!
//! The directory probes this endpoint; any 200 keeps the instance passing.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::Config;

/// Identity of the running service, shared by every role's state
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub name: String,
    pub role: &'static str,
}

impl ServiceInfo {
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.service_name.clone(),
            role: config.role.default_name(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: String,
    role: &'static str,
    version: &'static str,
    timestamp: i64,
}

pub async fn check(State(info): State<ServiceInfo>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: info.name,
        role: info.role,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
