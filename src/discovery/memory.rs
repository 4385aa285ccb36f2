//! In-process directory
//!
//! Backs the `static` discovery backend and the test suite. Registrations are
//! kept in a map keyed by identity; every instance is healthy until marked
//! otherwise.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{service_identity, Directory, InstanceDescriptor, ServiceRegistration};
use crate::{AppError, AppResult};

struct Entry {
    instance: InstanceDescriptor,
    healthy: bool,
}

#[derive(Default)]
pub struct InMemoryDirectory {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `name[#tag,...]=host:port;...`, e.g.
    /// `feature-cache=cache:8520;predict-service#h5=predict5:8420`
    pub fn from_static(instances: &str) -> AppResult<Self> {
        let directory = Self::new();

        for (index, item) in instances.split(';').map(str::trim).filter(|s| !s.is_empty()).enumerate() {
            let invalid = || AppError::Validation(format!("Invalid static instance '{}'", item));

            let (service, target) = item.split_once('=').ok_or_else(invalid)?;
            let (name, tags): (&str, Vec<String>) = match service.split_once('#') {
                Some((name, tags)) => (
                    name.trim(),
                    tags.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect(),
                ),
                None => (service.trim(), Vec::new()),
            };
            let (address, port) = target.trim().rsplit_once(':').ok_or_else(invalid)?;
            let port: u16 = port.parse().map_err(|_| invalid())?;

            if name.is_empty() || address.is_empty() {
                return Err(invalid());
            }

            directory.insert(InstanceDescriptor {
                id: service_identity(name, port, &index.to_string()),
                name: name.to_string(),
                address: address.to_string(),
                port,
                tags,
            });
        }

        tracing::info!("Static directory holds {} instances", directory.entries.read().len());
        Ok(directory)
    }

    /// Mark an instance passing or failing its health check
    pub fn set_healthy(&self, identity: &str, healthy: bool) -> bool {
        match self.entries.write().get_mut(identity) {
            Some(entry) => {
                entry.healthy = healthy;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn insert(&self, instance: InstanceDescriptor) {
        self.entries
            .write()
            .insert(instance.id.clone(), Entry { instance, healthy: true });
    }
}

#[axum::async_trait]
impl Directory for InMemoryDirectory {
    async fn register(&self, registration: &ServiceRegistration) -> AppResult<String> {
        let identity = registration.identity();
        self.insert(InstanceDescriptor {
            id: identity.clone(),
            name: registration.name.clone(),
            address: registration.address.clone(),
            port: registration.port,
            tags: registration.tags.clone(),
        });
        tracing::debug!("Registered {} in memory", identity);
        Ok(identity)
    }

    async fn deregister(&self, identity: &str) -> AppResult<()> {
        self.entries.write().remove(identity);
        Ok(())
    }

    async fn lookup(&self, name: &str, tag: Option<&str>) -> AppResult<Vec<InstanceDescriptor>> {
        let entries = self.entries.read();
        Ok(entries
            .values()
            .filter(|e| e.healthy && e.instance.name == name)
            .filter(|e| tag.map_or(true, |t| e.instance.tags.iter().any(|x| x == t)))
            .map(|e| e.instance.clone())
            .collect())
    }
}
