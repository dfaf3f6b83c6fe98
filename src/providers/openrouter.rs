//! OpenRouter client (OpenAI-compatible chat completions API).

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::{ChatModel, ModelRole};
use crate::config::RoleConfig;
use crate::error::{ConfigError, ProviderError, ProviderErrorKind};

/// HTTP attribution headers required by OpenRouter's free tier.
const REFERER: &str = "http://localhost:3000";
const TITLE: &str = "Verity";

/// A chat model reached through OpenRouter's chat completions endpoint.
pub struct OpenRouterClient {
    client: reqwest::Client,
    role: ModelRole,
    model: String,
    base_url: String,
    api_key: String,
    temperature: f32,
    max_tokens: usize,
    timeout: Duration,
}

impl OpenRouterClient {
    /// Build a client for one role, resolving the API key from the
    /// environment variable named in the config.
    pub fn from_role_config(role: ModelRole, config: &RoleConfig) -> Result<Self, ConfigError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ConfigError::EnvVarMissing {
                var: config.api_key_env.clone(),
            }
        })?;
        Ok(Self::new(role, config, api_key))
    }

    pub fn new(role: ModelRole, config: &RoleConfig, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            role,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn build_request_body(&self, system_prompt: &str, user_content: &str) -> Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_content},
            ],
        })
    }

    fn map_http_error(
        &self,
        status: reqwest::StatusCode,
        retry_after_secs: u64,
        body: &str,
    ) -> ProviderError {
        let kind = match status.as_u16() {
            401 | 403 => ProviderErrorKind::AuthFailed {
                model: self.model.clone(),
            },
            429 => ProviderErrorKind::RateLimited { retry_after_secs },
            _ => ProviderErrorKind::ApiRequest {
                message: format!("HTTP {status}: {body}"),
            },
        };
        ProviderError::new(self.role, kind)
    }

    fn parse_response(&self, body: &Value) -> Result<String, ProviderError> {
        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ProviderError::new(
                    self.role,
                    ProviderErrorKind::ResponseParse {
                        message: "missing choices[0].message.content".to_string(),
                    },
                )
            })
    }
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(system_prompt, user_content);

        debug!(role = %self.role, model = %self.model, "sending chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    ProviderErrorKind::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    ProviderErrorKind::ApiRequest {
                        message: e.to_string(),
                    }
                };
                ProviderError::new(self.role, kind)
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let text = response.text().await.unwrap_or_default();
            return Err(self.map_http_error(status, retry_after_secs, &text));
        }

        let parsed: Value = response.json().await.map_err(|e| {
            ProviderError::new(
                self.role,
                ProviderErrorKind::ResponseParse {
                    message: e.to_string(),
                },
            )
        })?;

        self.parse_response(&parsed)
    }

    fn role(&self) -> ModelRole {
        self.role
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
