//! Web search grounding via the Tavily API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::SearchHit;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// A web search backend producing grounding context for the verifier.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;
}

/// Tavily-backed search.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: Option<String>,
    max_results: usize,
    search_depth: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
    /// The credential is resolved lazily from the configured environment
    /// variable. A missing key is reported per search, not at startup, so
    /// the service can still answer from model knowledge alone.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: std::env::var(&config.api_key_env).ok(),
            max_results: config.max_results,
            search_depth: config.search_depth.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let api_key = self.api_key.as_ref().ok_or(SearchError::MissingCredential {
            var: "TAVILY_API_KEY".to_string(),
        })?;

        let body = json!({
            "api_key": api_key,
            "query": query,
            "max_results": self.max_results,
            "search_depth": self.search_depth,
            "include_answer": true,
            "include_raw_content": false,
        });

        debug!(query, "sending web search request");

        let response = self
            .client
            .post(TAVILY_SEARCH_URL)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::ApiRequest {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiRequest {
                message: format!("HTTP {status}: {text}"),
            });
        }

        let parsed: TavilyResponse =
            response.json().await.map_err(|e| SearchError::ResponseParse {
                message: e.to_string(),
            })?;

        let hits = parsed
            .results
            .into_iter()
            .take(self.max_results)
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                content: r.content,
            })
            .collect();

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing_tolerates_missing_fields() {
        let raw = r#"{"results": [{"title": "Rust", "url": "https://rust-lang.org"}]}"#;
        let parsed: TavilyResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].title, "Rust");
        assert_eq!(parsed.results[0].content, "");
    }

    #[test]
    fn test_response_parsing_empty() {
        let parsed: TavilyResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.results.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_errors_per_search() {
        let search = TavilySearch {
            client: reqwest::Client::new(),
            api_key: None,
            max_results: 5,
            search_depth: "advanced".to_string(),
            timeout: Duration::from_secs(5),
        };
        let err = search.search("anything").await.unwrap_err();
        assert!(matches!(err, SearchError::MissingCredential { .. }));
    }
}
