#![forbid(unsafe_code)]

use std::env;
use std::net::SocketAddr;

use travel_engines::hotels::HotelSearchConfig;
use travel_engines::keywords::KeywordExtractorConfig;
use travel_engines::provider::DEFAULT_USER_AGENT;
use travel_storage::StoreLocation;

pub const DEFAULT_HTTP_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("TRAVEL_HTTP_BIND is not a socket address: {0}")]
    InvalidBind(String),
    #[error("TRAVEL_STORE_URL is invalid: {0}")]
    InvalidStoreUrl(String),
    #[error("TRAVEL_IDENTITY_SECRET must be set")]
    MissingIdentitySecret,
}

/// Startup configuration, read once from the process environment.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub bind: SocketAddr,
    pub store: StoreLocation,
    pub identity_secret: String,
    pub identity_issuer: Option<String>,
    pub keywords: Option<KeywordExtractorConfig>,
    pub hotels: Option<HotelSearchConfig>,
}

impl AdapterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_var_map(|key| env::var(key).ok())
    }

    pub fn from_env_var_map<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = non_empty("TRAVEL_HTTP_BIND").unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBind(bind_raw.clone()))?;

        let store = StoreLocation::parse(&non_empty("TRAVEL_STORE_URL").unwrap_or_default())
            .map_err(|e| ConfigError::InvalidStoreUrl(e.to_string()))?;

        let identity_secret =
            non_empty("TRAVEL_IDENTITY_SECRET").ok_or(ConfigError::MissingIdentitySecret)?;
        let identity_issuer = non_empty("TRAVEL_IDENTITY_ISSUER");

        let timeout_ms = parse_upstream_timeout_ms(get("TRAVEL_UPSTREAM_TIMEOUT_MS"));

        let keywords = non_empty("OPENAI_API_KEY").map(|api_key| {
            let mut config = KeywordExtractorConfig::new(api_key);
            if let Some(model) = non_empty("TRAVEL_KEYWORD_MODEL") {
                config.model = model;
            }
            if let Some(endpoint) = non_empty("TRAVEL_KEYWORD_ENDPOINT") {
                config.endpoint = endpoint;
            }
            config.timeout_ms = timeout_ms;
            config
        });

        let hotels = non_empty("TRAVEL_HOTEL_SEARCH_URL").map(|endpoint| HotelSearchConfig {
            endpoint,
            api_key: non_empty("TRAVEL_HOTEL_API_KEY").unwrap_or_default(),
            timeout_ms,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        });

        Ok(Self {
            bind,
            store,
            identity_secret,
            identity_issuer,
            keywords,
            hotels,
        })
    }
}

fn parse_upstream_timeout_ms(raw: Option<String>) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| (100..=60_000).contains(v))
        .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_MS)
}
