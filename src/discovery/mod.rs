//! Service discovery
//!
//! Services register under a name plus optional tags and find each other by
//! asking the directory for healthy instances. Every call re-resolves its
//! target; nothing is cached client-side.

pub mod consul;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::{Config, DiscoveryBackend};
use crate::{AppError, AppResult};

pub use consul::ConsulDirectory;
pub use memory::InMemoryDirectory;

/// What a service announces about itself
#[derive(Debug, Clone)]
pub struct ServiceRegistration {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub unique_id: String,
    pub tags: Vec<String>,
    /// Health probe interval, e.g. `10s`
    pub health_check_interval: String,
}

impl ServiceRegistration {
    pub fn from_config(config: &Config, tags: Vec<String>) -> Self {
        Self {
            name: config.service_name.clone(),
            address: config.service_address.clone(),
            port: config.port,
            unique_id: config.service_id.clone(),
            tags,
            health_check_interval: config.health_check_interval.clone(),
        }
    }

    /// Directory identity, `name_port_uniqueId`
    pub fn identity(&self) -> String {
        service_identity(&self.name, self.port, &self.unique_id)
    }

    /// URL the directory probes for liveness
    pub fn health_url(&self) -> String {
        format!("http://{}:{}/health", self.address, self.port)
    }
}

/// One healthy instance returned by a lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
}

impl InstanceDescriptor {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

pub fn service_identity(name: &str, port: u16, unique_id: &str) -> String {
    format!("{}_{}_{}", name, port, unique_id)
}

/// A service directory
#[axum::async_trait]
pub trait Directory: Send + Sync {
    /// Register (or re-register) an instance; returns its identity
    async fn register(&self, registration: &ServiceRegistration) -> AppResult<String>;

    async fn deregister(&self, identity: &str) -> AppResult<()>;

    /// Healthy instances of `name`, optionally narrowed to those carrying `tag`.
    /// No match is an empty list, not an error.
    async fn lookup(&self, name: &str, tag: Option<&str>) -> AppResult<Vec<InstanceDescriptor>>;
}

/// Look up `name` and pick one healthy instance uniformly at random
pub async fn resolve(directory: &dyn Directory, name: &str, tag: Option<&str>) -> AppResult<InstanceDescriptor> {
    let instances = directory.lookup(name, tag).await?;

    let chosen = pick(&instances).ok_or_else(|| {
        AppError::ServiceUnavailable(match tag {
            Some(tag) => format!("{} tagged {}", name, tag),
            None => name.to_string(),
        })
    })?;

    tracing::debug!(
        "Resolved {} ({}) to {} among {} instances",
        name,
        tag.unwrap_or("-"),
        chosen.id,
        instances.len()
    );
    Ok(chosen)
}

fn pick(instances: &[InstanceDescriptor]) -> Option<InstanceDescriptor> {
    instances.choose(&mut rand::thread_rng()).cloned()
}

/// Outbound HTTP client shared by discovery and peer calls
pub fn http_client(timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Directory selected by `DISCOVERY_BACKEND`
pub fn from_config(config: &Config, client: reqwest::Client) -> AppResult<Arc<dyn Directory>> {
    match config.discovery_backend {
        DiscoveryBackend::Consul => Ok(Arc::new(ConsulDirectory::new(config.consul_url(), client))),
        DiscoveryBackend::Static => Ok(Arc::new(InMemoryDirectory::from_static(&config.static_instances)?)),
    }
}
