#![forbid(unsafe_code)]

use serde_json::Value;

use crate::provider::{self, ProviderCallError};

const PROVIDER: &str = "openai";

pub const DEFAULT_KEYWORD_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_KEYWORD_MODEL: &str = "gpt-3.5-turbo";

const SYSTEM_INSTRUCTION: &str = "You will be provided with a block of text, and your task is to extract a list of keywords from it.";

/// Free text in, short comma-style keyword list out. One call, no retry.
pub trait KeywordExtractor: Send + Sync {
    fn extract_keywords(&self, text: &str) -> Result<String, ProviderCallError>;
}

#[derive(Debug, Clone)]
pub struct KeywordExtractorConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u32,
    pub user_agent: String,
}

impl KeywordExtractorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_KEYWORD_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_KEYWORD_MODEL.to_string(),
            timeout_ms: 10_000,
            user_agent: provider::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Chat-completions backed extractor.
pub struct OpenAiKeywordExtractor {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiKeywordExtractor {
    pub fn new(config: KeywordExtractorConfig) -> Result<Self, String> {
        if config.api_key.trim().is_empty() {
            return Err("keyword extractor api key must not be empty".to_string());
        }
        let agent = provider::build_http_agent(config.timeout_ms, &config.user_agent)?;
        Ok(Self {
            agent,
            endpoint: config.endpoint,
            api_key: config.api_key,
            model: config.model,
        })
    }
}

impl KeywordExtractor for OpenAiKeywordExtractor {
    fn extract_keywords(&self, text: &str) -> Result<String, ProviderCallError> {
        let payload = completion_payload(&self.model, text);
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Accept", "application/json")
            .send_json(payload)
            .map_err(|e| provider::provider_error_from_ureq(PROVIDER, e))?;
        let body = provider::read_json(PROVIDER, response)?;
        keywords_from_completion(&body)
            .ok_or_else(|| ProviderCallError::new(PROVIDER, "empty_results", None))
    }
}

fn completion_payload(model: &str, text: &str) -> Value {
    serde_json::json!({
        "model": model,
        "messages": [
            {"role": "system", "content": SYSTEM_INSTRUCTION},
            {"role": "user", "content": text},
        ],
        "temperature": 0.5,
        "max_tokens": 64,
        "top_p": 1,
    })
}

fn keywords_from_completion(body: &Value) -> Option<String> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
