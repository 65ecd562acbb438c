//! HTTP sampling client for a Messages-style endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::sampling::{SamplingClient, SamplingRequest, SamplingResponse, Usage};
use super::AiError;
use crate::config::AiConfig;

const API_VERSION: &str = "2023-06-01";

/// Response body of a Messages-style endpoint.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Sampling client that POSTs to an HTTP endpoint.
pub struct HttpSamplingClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpSamplingClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("containercheck/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Build a client from configuration. The API key comes from the environment.
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| AiError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(
            config.endpoint.clone(),
            api_key,
            config.model.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    fn body(&self, request: &SamplingRequest) -> serde_json::Value {
        build_body(&self.model, request)
    }
}

pub(crate) fn build_body(default_model: &str, request: &SamplingRequest) -> serde_json::Value {
    let mut body = json!({
        "model": request.model.as_deref().unwrap_or(default_model),
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "messages": request.messages,
    });
    if let Some(system) = &request.system {
        body["system"] = json!(system);
    }
    body
}

pub(crate) fn parse_response(body: &str) -> Result<SamplingResponse, AiError> {
    let parsed: MessagesResponse = serde_json::from_str(body).map_err(|e| AiError::MalformedResponse {
        attempts: 1,
        message: format!("unreadable sampling response: {}", e),
    })?;

    let text = parsed
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    Ok(SamplingResponse {
        text,
        model: parsed.model,
        usage: parsed.usage,
    })
}

#[async_trait]
impl SamplingClient for HttpSamplingClient {
    async fn create_message(&self, request: SamplingRequest) -> Result<SamplingResponse, AiError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout
                } else {
                    AiError::Transport(e)
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AiError::RateLimited);
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AiError::Timeout
            } else {
                AiError::Transport(e)
            }
        })?;

        if !status.is_success() {
            return Err(AiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        parse_response(&body)
    }
}
