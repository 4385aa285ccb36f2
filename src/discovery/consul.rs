//! Consul agent HTTP API directory

use serde::{Deserialize, Serialize};

use super::{Directory, InstanceDescriptor, ServiceRegistration};
use crate::{AppError, AppResult};

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterServiceRequest {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub check: HealthCheck,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    #[serde(rename = "HTTP")]
    pub http: String,
    pub interval: String,
}

impl From<&ServiceRegistration> for RegisterServiceRequest {
    fn from(registration: &ServiceRegistration) -> Self {
        Self {
            id: registration.identity(),
            name: registration.name.clone(),
            address: registration.address.clone(),
            port: registration.port,
            tags: registration.tags.clone(),
            check: HealthCheck {
                http: registration.health_url(),
                interval: registration.health_check_interval.clone(),
            },
        }
    }
}

/// One entry of `/v1/health/service/{name}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthEntry {
    pub service: AgentService,
    #[serde(default)]
    pub node: Option<Node>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentService {
    #[serde(rename = "ID")]
    pub id: String,
    pub service: String,
    #[serde(default)]
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    #[serde(default)]
    pub address: String,
}

impl From<HealthEntry> for InstanceDescriptor {
    fn from(entry: HealthEntry) -> Self {
        // Consul leaves the service address empty when it equals the node's
        let address = if entry.service.address.is_empty() {
            entry.node.map(|n| n.address).unwrap_or_default()
        } else {
            entry.service.address
        };

        Self {
            id: entry.service.id,
            name: entry.service.service,
            address,
            port: entry.service.port,
            tags: entry.service.tags.unwrap_or_default(),
        }
    }
}

/// Directory backed by a Consul agent
pub struct ConsulDirectory {
    base_url: String,
    http_client: reqwest::Client,
}

impl ConsulDirectory {
    pub fn new(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        }
    }

    async fn check(response: reqwest::Response, action: &str) -> AppResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!("Consul {} failed ({}): {}", action, status, error_text);
        Err(AppError::DiscoveryUnreachable(format!(
            "{} returned {}: {}",
            action, status, error_text
        )))
    }
}

#[axum::async_trait]
impl Directory for ConsulDirectory {
    async fn register(&self, registration: &ServiceRegistration) -> AppResult<String> {
        let url = format!("{}/v1/agent/service/register", self.base_url);
        let request = RegisterServiceRequest::from(registration);

        let response = self
            .http_client
            .put(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::DiscoveryUnreachable(e.to_string()))?;
        Self::check(response, "register").await?;

        tracing::info!("Registered {} with Consul at {}", request.id, self.base_url);
        Ok(request.id)
    }

    async fn deregister(&self, identity: &str) -> AppResult<()> {
        let url = format!("{}/v1/agent/service/deregister/{}", self.base_url, identity);

        let response = self
            .http_client
            .put(&url)
            .send()
            .await
            .map_err(|e| AppError::DiscoveryUnreachable(e.to_string()))?;
        Self::check(response, "deregister").await?;

        tracing::info!("Deregistered {} from Consul", identity);
        Ok(())
    }

    async fn lookup(&self, name: &str, tag: Option<&str>) -> AppResult<Vec<InstanceDescriptor>> {
        let url = format!("{}/v1/health/service/{}", self.base_url, name);

        let mut query = vec![("passing", "true")];
        if let Some(tag) = tag {
            query.push(("tag", tag));
        }

        let response = self
            .http_client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::DiscoveryUnreachable(e.to_string()))?;
        let response = Self::check(response, "lookup").await?;

        let entries: Vec<HealthEntry> = response
            .json()
            .await
            .map_err(|e| AppError::DiscoveryUnreachable(format!("Invalid lookup response: {}", e)))?;

        Ok(entries.into_iter().map(InstanceDescriptor::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::{Path as UrlPath, Query, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, put};
    use axum::{Json, Router};
    use parking_lot::Mutex;

    #[test]
    fn test_register_payload() {
        let registration = ServiceRegistration {
            name: "predict-service".to_string(),
            address: "10.0.0.5".to_string(),
            port: 8420,
            unique_id: "2".to_string(),
            tags: vec!["h5".to_string()],
            health_check_interval: "10s".to_string(),
        };

        let body = serde_json::to_value(RegisterServiceRequest::from(&registration)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "ID": "predict-service_8420_2",
                "Name": "predict-service",
                "Address": "10.0.0.5",
                "Port": 8420,
                "Tags": ["h5"],
                "Check": { "HTTP": "http://10.0.0.5:8420/health", "Interval": "10s" }
            })
        );
    }

    #[test]
    fn test_parse_health_entries() {
        let raw = r#"[
            {
                "Node": { "Node": "agent-one", "Address": "172.18.0.2" },
                "Service": { "ID": "predict-service_8420_1", "Service": "predict-service",
                             "Tags": ["h5"], "Address": "172.18.0.9", "Port": 8420 },
                "Checks": []
            },
            {
                "Node": { "Node": "agent-one", "Address": "172.18.0.2" },
                "Service": { "ID": "predict-service_8421_1", "Service": "predict-service",
                             "Tags": null, "Address": "", "Port": 8421 },
                "Checks": []
            }
        ]"#;

        let entries: Vec<HealthEntry> = serde_json::from_str(raw).unwrap();
        let instances: Vec<InstanceDescriptor> = entries.into_iter().map(Into::into).collect();

        assert_eq!(instances[0].base_url(), "http://172.18.0.9:8420");
        assert_eq!(instances[0].tags, vec!["h5"]);
        assert_eq!(instances[1].address, "172.18.0.2");
        assert!(instances[1].tags.is_empty());
    }

    /// What the stub agent saw
    #[derive(Default)]
    struct Seen {
        registered: Vec<serde_json::Value>,
        deregistered: Vec<String>,
        queries: Vec<(String, HashMap<String, String>)>,
    }

    type Shared = Arc<Mutex<Seen>>;

    async fn stub_register(State(seen): State<Shared>, Json(body): Json<serde_json::Value>) -> StatusCode {
        seen.lock().registered.push(body);
        StatusCode::OK
    }

    async fn stub_deregister(State(seen): State<Shared>, UrlPath(id): UrlPath<String>) -> StatusCode {
        seen.lock().deregistered.push(id);
        StatusCode::OK
    }

    async fn stub_health(
        State(seen): State<Shared>,
        UrlPath(name): UrlPath<String>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Response {
        seen.lock().queries.push((name.clone(), query));

        match name.as_str() {
            "predict-service" => Json(serde_json::json!([
                {
                    "Node": { "Node": "agent-one", "Address": "1.2.3.4" },
                    "Service": { "ID": "predict-service_8420_1", "Service": "predict-service",
                                 "Tags": ["h5"], "Address": "", "Port": 8420 },
                    "Checks": []
                }
            ]))
            .into_response(),
            "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
            _ => Json(serde_json::json!([])).into_response(),
        }
    }

    async fn stub_agent() -> (ConsulDirectory, Shared) {
        let seen = Shared::default();
        let app = Router::new()
            .route("/v1/agent/service/register", put(stub_register))
            .route("/v1/agent/service/deregister/:id", put(stub_deregister))
            .route("/v1/health/service/:name", get(stub_health))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build().unwrap();
        (ConsulDirectory::new(format!("http://{}/", addr), client), seen)
    }

    #[tokio::test]
    async fn test_lookup_against_agent() {
        let (directory, seen) = stub_agent().await;

        let instances = directory.lookup("predict-service", Some("h5")).await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].id, "predict-service_8420_1");
        assert_eq!(instances[0].base_url(), "http://1.2.3.4:8420");
        assert_eq!(instances[0].tags, vec!["h5"]);

        assert!(directory.lookup("feature-cache", None).await.unwrap().is_empty());

        let seen = seen.lock();
        let queries = &seen.queries;
        assert_eq!(queries[0].0, "predict-service");
        assert_eq!(
            queries[0].1,
            HashMap::from([("passing".to_string(), "true".to_string()), ("tag".to_string(), "h5".to_string())])
        );
        assert_eq!(queries[1].0, "feature-cache");
        assert_eq!(queries[1].1, HashMap::from([("passing".to_string(), "true".to_string())]));
    }

    #[tokio::test]
    async fn test_register_and_deregister_against_agent() {
        let (directory, seen) = stub_agent().await;
        let registration = ServiceRegistration {
            name: "feature-cache".to_string(),
            address: "10.0.0.8".to_string(),
            port: 8520,
            unique_id: "1".to_string(),
            tags: vec![],
            health_check_interval: "5s".to_string(),
        };

        let identity = directory.register(&registration).await.unwrap();
        assert_eq!(identity, "feature-cache_8520_1");
        directory.deregister(&identity).await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.registered.len(), 1);
        assert_eq!(seen.registered[0]["ID"], "feature-cache_8520_1");
        assert_eq!(seen.registered[0]["Check"]["HTTP"], "http://10.0.0.8:8520/health");
        assert_eq!(seen.registered[0]["Check"]["Interval"], "5s");
        assert_eq!(seen.deregistered, vec!["feature-cache_8520_1"]);
    }

    #[tokio::test]
    async fn test_agent_error_status_is_unreachable() {
        let (directory, _) = stub_agent().await;

        match directory.lookup("broken", None).await {
            Err(AppError::DiscoveryUnreachable(message)) => {
                assert!(message.contains("500"), "{}", message);
                assert!(message.contains("boom"), "{}", message);
            }
            other => panic!("Expected DiscoveryUnreachable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_directory() {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let directory = ConsulDirectory::new("http://127.0.0.1:1", client);

        assert!(matches!(
            directory.lookup("feature-cache", None).await,
            Err(AppError::DiscoveryUnreachable(_))
        ));
    }
}
