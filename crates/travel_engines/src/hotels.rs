#![forbid(unsafe_code)]

use serde_json::Value;
use travel_kernel_contracts::hotel::HotelSearchCriteria;

use crate::provider::{self, ProviderCallError};

const PROVIDER: &str = "hotels";

/// Opaque pass-through to a hotel-search provider. Results are returned as the provider sent them.
pub trait HotelSearch: Send + Sync {
    fn search_hotels(&self, criteria: &HotelSearchCriteria) -> Result<Vec<Value>, ProviderCallError>;
}

#[derive(Debug, Clone)]
pub struct HotelSearchConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout_ms: u32,
    pub user_agent: String,
}

pub struct HttpHotelSearch {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

impl HttpHotelSearch {
    pub fn new(config: HotelSearchConfig) -> Result<Self, String> {
        if config.endpoint.trim().is_empty() {
            return Err("hotel search endpoint must not be empty".to_string());
        }
        let agent = provider::build_http_agent(config.timeout_ms, &config.user_agent)?;
        Ok(Self {
            agent,
            endpoint: config.endpoint,
            api_key: config.api_key,
        })
    }
}

impl HotelSearch for HttpHotelSearch {
    fn search_hotels(&self, criteria: &HotelSearchCriteria) -> Result<Vec<Value>, ProviderCallError> {
        let mut request = self
            .agent
            .get(&self.endpoint)
            .set("Accept", "application/json");
        if !self.api_key.is_empty() {
            request = request.set("Authorization", &format!("Bearer {}", self.api_key));
        }
        for (name, value) in query_pairs(criteria) {
            request = request.query(name, &value);
        }
        let response = request
            .call()
            .map_err(|e| provider::provider_error_from_ureq(PROVIDER, e))?;
        let body = provider::read_json(PROVIDER, response)?;
        results_from_response(&body, usize::from(criteria.max_results_or_default()))
            .ok_or_else(|| ProviderCallError::new(PROVIDER, "unexpected_shape", None))
    }
}

fn query_pairs(criteria: &HotelSearchCriteria) -> Vec<(&'static str, String)> {
    let mut pairs = vec![("cityCode", criteria.city_code.clone())];
    if let Some(check_in) = &criteria.check_in {
        pairs.push(("checkInDate", check_in.clone()));
    }
    if let Some(check_out) = &criteria.check_out {
        pairs.push(("checkOutDate", check_out.clone()));
    }
    if let Some(adults) = criteria.adults {
        pairs.push(("adults", adults.to_string()));
    }
    pairs.push(("max", criteria.max_results_or_default().to_string()));
    pairs
}

// Providers answer either with a bare array or with `{"data": [...]}`.
fn results_from_response(body: &Value, max_results: usize) -> Option<Vec<Value>> {
    let items = body
        .as_array()
        .or_else(|| body.pointer("/data").and_then(Value::as_array))?;
    Some(items.iter().take(max_results).cloned().collect())
}
