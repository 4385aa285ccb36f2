//! Two-hop feature fetch against the feature cache

use std::sync::Arc;

use serde::Serialize;

use super::{read_json, transport_error};
use crate::discovery::{self, Directory};
use crate::error::Peer;
use crate::forecast::FeatureRecord;
use crate::{AppError, AppResult};

#[derive(Debug, Serialize)]
struct TimeFeaturesQuery<'a> {
    item: &'a str,
    client_name: &'a str,
}

/// Client for the feature-cache role
#[derive(Clone)]
pub struct FeatureCacheClient {
    directory: Arc<dyn Directory>,
    http_client: reqwest::Client,
    service_name: String,
}

impl FeatureCacheClient {
    pub fn new(directory: Arc<dyn Directory>, http_client: reqwest::Client, service_name: impl Into<String>) -> Self {
        Self {
            directory,
            http_client,
            service_name: service_name.into(),
        }
    }

    /// Time-series features, then item attributes, from one cache instance.
    ///
    /// The item call is skipped when the first call fails. On key collisions
    /// the item attributes win.
    pub async fn fetch(&self, client_name: &str, item: &str) -> AppResult<FeatureRecord> {
        let instance = discovery::resolve(self.directory.as_ref(), &self.service_name, None).await?;
        let base_url = instance.base_url();

        let mut features = self.time_features(&base_url, client_name, item).await?;
        let attributes = self.item_info(&base_url, item).await?;
        features.extend(attributes);

        tracing::debug!(
            "Fetched {} cached features for client={} item={} from {}",
            features.len(),
            client_name,
            item,
            instance.id
        );
        Ok(features)
    }

    async fn time_features(&self, base_url: &str, client_name: &str, item: &str) -> AppResult<FeatureRecord> {
        let url = format!("{}/time-features", base_url);

        let response = self
            .http_client
            .post(&url)
            .json(&TimeFeaturesQuery { item, client_name })
            .send()
            .await
            .map_err(|e| transport_error(Peer::FeatureCache, e))?;

        read_json(response, Peer::FeatureCache, "Unable to retrieve cached time features").await
    }

    async fn item_info(&self, base_url: &str, item: &str) -> AppResult<FeatureRecord> {
        let mut url = reqwest::Url::parse(base_url)
            .map_err(|e| AppError::Internal(format!("Invalid feature cache URL {}: {}", base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Internal(format!("Feature cache URL {} cannot take a path", base_url)))?
            .pop_if_empty()
            .push("item")
            .push(item);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(Peer::FeatureCache, e))?;

        read_json(response, Peer::FeatureCache, "Unable to retrieve cached item features").await
    }
}
