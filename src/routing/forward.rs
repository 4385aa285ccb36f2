//! Horizon fan-out to prediction instances

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderValue, StatusCode};

use super::{horizon_tag, horizon_tags, transport_error};
use crate::discovery::{self, Directory};
use crate::error::Peer;
use crate::{AppError, AppResult};

/// An upstream prediction response, passed back untouched
#[derive(Debug)]
pub struct Forwarded {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct PredictionRouter {
    directory: Arc<dyn Directory>,
    http_client: reqwest::Client,
    service_name: String,
}

impl PredictionRouter {
    pub fn new(directory: Arc<dyn Directory>, http_client: reqwest::Client, service_name: impl Into<String>) -> Self {
        Self {
            directory,
            http_client,
            service_name: service_name.into(),
        }
    }

    /// Send `body` verbatim to `/predict` on a random instance tagged with `horizon`
    pub async fn forward(&self, horizon: &str, body: Bytes) -> AppResult<Forwarded> {
        let tag = horizon_tag(horizon)?;
        let instance = discovery::resolve(self.directory.as_ref(), &self.service_name, Some(&tag)).await?;
        let url = format!("{}/predict", instance.base_url());

        tracing::debug!("Forwarding {} prediction to {}", tag, instance.id);

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(Peer::Prediction, e))?;

        let status = response.status();
        let content_type = response.headers().get(reqwest::header::CONTENT_TYPE).cloned();

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!("Prediction instance {} responded {}: {}", instance.id, status, detail);
            return Err(AppError::Downstream {
                peer: Peer::Prediction,
                status: Some(status.as_u16()),
                detail,
                context: format!("Prediction service for {} failed", tag),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(Peer::Prediction, e))?;

        Ok(Forwarded {
            status,
            content_type,
            body,
        })
    }

    /// Horizon tags advertised by healthy prediction instances
    pub async fn models(&self) -> AppResult<Vec<String>> {
        let instances = self.directory.lookup(&self.service_name, None).await?;
        Ok(horizon_tags(instances.iter().flat_map(|i| i.tags.iter())))
    }
}
