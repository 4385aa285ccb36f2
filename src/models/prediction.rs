//! Prediction and routing bodies

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::forecast::FeatureRecord;

/// Client × item forecast request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PredictRequest {
    #[validate(length(min = 1, message = "item must not be empty"))]
    pub item: String,

    #[validate(length(min = 1, message = "client_name must not be empty"))]
    pub client_name: String,

    #[validate(length(min = 1, message = "customer_code must not be empty"))]
    pub customer_code: String,

    #[validate(length(min = 1, message = "region must not be empty"))]
    pub region: String,

    #[validate(length(min = 1, message = "area must not be empty"))]
    pub area: String,

    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: f64,

    #[validate(length(min = 1, message = "currency must not be empty"))]
    pub currency: String,
}

impl PredictRequest {
    /// Raw adaptor input for `date`: request fields overlaid with `cached` features
    pub fn to_record(&self, date: NaiveDate, cached: FeatureRecord) -> FeatureRecord {
        let mut record = FeatureRecord::new();
        record.insert("item".to_string(), self.item.as_str().into());
        record.insert("date".to_string(), date.format("%Y-%m-%d").to_string().into());
        record.insert("cust_code".to_string(), self.customer_code.as_str().into());
        record.insert("cust_id".to_string(), self.client_name.as_str().into());
        record.insert("price".to_string(), self.price.into());
        record.insert("region".to_string(), self.region.as_str().into());
        record.insert("area".to_string(), self.area.as_str().into());
        record.insert("currency".to_string(), self.currency.as_str().into());
        record.extend(cached);
        record
    }
}

/// Horizon tags currently served
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub reloaded: bool,
    pub instances: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::FeatureValue;

    fn request() -> PredictRequest {
        PredictRequest {
            item: "X".to_string(),
            client_name: "A".to_string(),
            customer_code: "C-1".to_string(),
            region: "BRAZIL".to_string(),
            area: "south".to_string(),
            price: 12.5,
            currency: "BRL".to_string(),
        }
    }

    #[test]
    fn test_validation() {
        assert!(request().validate().is_ok());

        let mut empty = request();
        empty.client_name = String::new();
        assert!(empty.validate().is_err());

        let mut negative = request();
        negative.price = -1.0;
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_cached_features_override_request_fields() {
        let mut cached = FeatureRecord::new();
        cached.insert("area".to_string(), "north".into());
        cached.insert("qty_lag1".to_string(), 4.0.into());

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let record = request().to_record(date, cached);

        assert_eq!(record["area"], FeatureValue::Text("north".to_string()));
        assert_eq!(record["cust_id"], FeatureValue::Text("A".to_string()));
        assert_eq!(record["date"], FeatureValue::Text("2024-03-01".to_string()));
        assert_eq!(record["qty_lag1"], FeatureValue::Number(4.0));
    }
}
