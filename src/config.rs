//! Configuration module

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::pool::DEFAULT_ACQUIRE_TIMEOUT;

/// Role a process plays in the forecasting mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    FeatureCache,
    Prediction,
    Routing,
}

impl ServiceRole {
    pub fn default_port(&self) -> u16 {
        match self {
            ServiceRole::FeatureCache => 8520,
            ServiceRole::Prediction => 8420,
            ServiceRole::Routing => 8620,
        }
    }

    pub fn default_name(&self) -> &'static str {
        match self {
            ServiceRole::FeatureCache => "feature-cache",
            ServiceRole::Prediction => "predict-service",
            ServiceRole::Routing => "routing-service",
        }
    }
}

/// Which directory implementation backs service discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryBackend {
    Consul,
    /// Fixed instance list, for running without a directory
    Static,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub role: ServiceRole,

    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Address advertised to the directory
    pub service_address: String,

    /// Registered service name
    pub service_name: String,

    /// Unique part of the `name_port_id` identity
    pub service_id: String,

    pub discovery_backend: DiscoveryBackend,
    pub consul_host: String,
    pub consul_port: u16,

    /// `name[#tag,...]=host:port;...` used by the static backend
    pub static_instances: String,

    /// Health probe interval, in the directory's duration syntax
    pub health_check_interval: String,

    /// Name the feature cache registers under
    pub feature_cache_service: String,

    /// Name prediction instances register under
    pub predict_service: String,

    pub data_dir: PathBuf,
    pub models_dir: PathBuf,

    /// Forecast horizon served by a prediction instance
    pub predict_horizon: u32,

    /// Quantile levels of the ensemble
    pub quantiles: Vec<u32>,

    pub model_pool_size: usize,
    pub pool_timeout: Duration,

    /// Deadline for every outbound HTTP call
    pub http_timeout: Duration,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env(role: ServiceRole) -> Self {
        Self {
            role,

            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: parse_var("PORT").unwrap_or_else(|| role.default_port()),

            service_address: env::var("SERVICE_ADDRESS")
                .unwrap_or_else(|_| "localhost".to_string()),

            service_name: env::var("PNAME")
                .unwrap_or_else(|_| role.default_name().to_string()),

            service_id: env::var("SERVICE_ID").unwrap_or_else(|_| "1".to_string()),

            discovery_backend: match env::var("DISCOVERY_BACKEND").as_deref() {
                Ok("static") => DiscoveryBackend::Static,
                _ => DiscoveryBackend::Consul,
            },

            consul_host: env::var("CONSUL_HOST").unwrap_or_else(|_| "localhost".to_string()),

            consul_port: parse_var("CONSUL_PORT").unwrap_or(8500),

            static_instances: env::var("STATIC_INSTANCES").unwrap_or_default(),

            health_check_interval: env::var("HEALTH_CHECK_INTERVAL")
                .unwrap_or_else(|_| "10s".to_string()),

            feature_cache_service: env::var("DNAME")
                .unwrap_or_else(|_| ServiceRole::FeatureCache.default_name().to_string()),

            predict_service: env::var("PREDICT_SERVICE")
                .unwrap_or_else(|_| ServiceRole::Prediction.default_name().to_string()),

            data_dir: env::var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("data")),

            models_dir: env::var("MODEL_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("models")),

            predict_horizon: parse_var("PHORIZON").unwrap_or(1),

            quantiles: env::var("QUANTILES")
                .ok()
                .and_then(|q| parse_quantiles(&q))
                .unwrap_or_else(|| vec![10, 50, 70, 90]),

            model_pool_size: parse_var("MODEL_POOL_SIZE").unwrap_or(3),

            pool_timeout: parse_var("POOL_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT),

            http_timeout: Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS").unwrap_or(10)),

            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Base URL of the Consul HTTP API
    pub fn consul_url(&self) -> String {
        format!("http://{}:{}", self.consul_host, self.consul_port)
    }

    /// Discovery tag of this prediction instance, e.g. `h5`
    pub fn horizon_tag(&self) -> String {
        format!("h{}", self.predict_horizon)
    }

    /// Base name of the quantile artifacts, e.g. `Qhorizon5`
    pub fn model_name(&self) -> String {
        format!("Qhorizon{}", self.predict_horizon)
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse `"10,50,90"` (brackets tolerated); `None` if any level is invalid or the list is empty
pub fn parse_quantiles(raw: &str) -> Option<Vec<u32>> {
    let levels: Option<Vec<u32>> = raw
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok().filter(|q| (1..100).contains(q)))
        .collect();

    levels.filter(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantiles() {
        assert_eq!(parse_quantiles("10,50,90"), Some(vec![10, 50, 90]));
        assert_eq!(parse_quantiles("[10, 70]"), Some(vec![10, 70]));
        assert_eq!(parse_quantiles(""), None);
        assert_eq!(parse_quantiles("10,abc"), None);
        assert_eq!(parse_quantiles("0,50"), None);
    }

    #[test]
    fn test_role_defaults() {
        assert_eq!(ServiceRole::FeatureCache.default_port(), 8520);
        assert_eq!(ServiceRole::Prediction.default_name(), "predict-service");
    }

    #[test]
    fn test_horizon_naming() {
        let mut config = Config::from_env(ServiceRole::Prediction);
        config.predict_horizon = 5;
        assert_eq!(config.horizon_tag(), "h5");
        assert_eq!(config.model_name(), "Qhorizon5");
    }
}
