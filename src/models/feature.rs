//! Feature-cache request bodies

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Time-series feature lookup
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeatureRequest {
    #[validate(length(min = 1, message = "item must not be empty"))]
    pub item: String,

    #[validate(length(min = 1, message = "client_name must not be empty"))]
    pub client_name: String,
}
