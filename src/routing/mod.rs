//! Cross-service orchestration
//!
//! ```text
//!   routing ──(tag hN)──▶ predict ──▶ feature cache: POST /time-features
//!                                 └─▶ feature cache: GET  /item/{item}
//! ```
//!
//! Every hop resolves its target through the directory first. Peer failures
//! surface as [`AppError::Downstream`] with the upstream status and body.

pub mod features;
pub mod forward;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::error::Peer;
use crate::{AppError, AppResult};

pub use features::FeatureCacheClient;
pub use forward::{Forwarded, PredictionRouter};

/// Normalize a horizon path segment (`h5` or `5`) to its discovery tag
pub fn horizon_tag(raw: &str) -> AppResult<String> {
    let invalid = || AppError::Validation(format!("Invalid horizon '{}', expected e.g. h5 or 5", raw));

    let digits = raw.trim().strip_prefix('h').unwrap_or(raw.trim());
    if !is_horizon_number(digits) {
        return Err(invalid());
    }
    digits.parse::<u32>().map(|h| format!("h{}", h)).map_err(|_| invalid())
}

/// Non-empty run of ASCII digits, no sign
fn is_horizon_number(digits: &str) -> bool {
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Horizon tags (`h\d+`) among `tags`, de-duplicated and ordered by horizon
pub fn horizon_tags<'a, I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let horizons: BTreeMap<u32, &String> = tags
        .into_iter()
        .filter_map(|tag| {
            let digits = tag.strip_prefix('h')?;
            if !is_horizon_number(digits) {
                return None;
            }
            digits.parse::<u32>().ok().map(|h| (h, tag))
        })
        .collect();

    horizons.into_values().cloned().collect()
}

fn transport_error(peer: Peer, error: reqwest::Error) -> AppError {
    AppError::Downstream {
        peer,
        status: None,
        detail: error.to_string(),
        context: format!("Could not reach {}", peer),
    }
}

/// Decode a successful peer response, or wrap a failing one with its status and body
async fn read_json<T>(response: reqwest::Response, peer: Peer, context: &str) -> AppResult<T>
where
    T: DeserializeOwned,
{
    let status = response.status().as_u16();

    if !response.status().is_success() {
        let detail = response.text().await.unwrap_or_default();
        tracing::warn!("{} responded {}: {}", peer, status, detail);
        return Err(AppError::Downstream {
            peer,
            status: Some(status),
            detail,
            context: context.to_string(),
        });
    }

    response.json().await.map_err(|e| AppError::Downstream {
        peer,
        status: Some(status),
        detail: e.to_string(),
        context: format!("Invalid response from {}", peer),
    })
}
