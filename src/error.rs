//! Error types for the verity service.
//!
//! Uses `thiserror` for structured error variants covering validation,
//! configuration, model providers, web search, and chat storage, plus the
//! HTTP status mapping applied at the API boundary.

use crate::providers::ModelRole;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

/// Top-level error type for the verity service.
#[derive(Debug, thiserror::Error)]
pub enum VerityError {
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("search error: {0}")]
    Search(#[from] SearchError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("pipeline timed out after {timeout_secs}s")]
    PipelineTimeout { timeout_secs: u64 },
}

/// Errors from the configuration system. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error("configuration parse error: {message}")]
    ParseError { message: String },
}

/// A failed model call, tagged with the pipeline role it was serving.
#[derive(Debug, thiserror::Error)]
#[error("{role} model call failed: {kind}")]
pub struct ProviderError {
    /// Which pipeline role the failing client was bound to.
    pub role: ModelRole,
    #[source]
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(role: ModelRole, kind: ProviderErrorKind) -> Self {
        Self { role, kind }
    }
}

/// The concrete failure mode of a model call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderErrorKind {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("authentication failed for model {model}")]
    AuthFailed { model: String },

    #[error("rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Errors from the web search client.
///
/// These never cross the pipeline boundary: the orchestrator recovers by
/// verifying without grounding context.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search credential missing (env var '{var}' not set)")]
    MissingCredential { var: String },

    #[error("search request failed: {message}")]
    ApiRequest { message: String },

    #[error("search response parse error: {message}")]
    ResponseParse { message: String },
}

/// Errors from the chat store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("chat not found: {chat_id}")]
    ChatNotFound { chat_id: Uuid },

    #[error("database error: {message}")]
    Database { message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database {
            message: e.to_string(),
        }
    }
}

/// A type alias for results using the top-level `VerityError`.
pub type Result<T> = std::result::Result<T, VerityError>;

impl VerityError {
    /// Map this error to the HTTP status code returned at the API boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            VerityError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            VerityError::Store(StoreError::ChatNotFound { .. }) => StatusCode::NOT_FOUND,
            VerityError::Provider(_) => StatusCode::BAD_GATEWAY,
            VerityError::PipelineTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            VerityError::Config(_)
            | VerityError::Search(_)
            | VerityError::Store(StoreError::Database { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for VerityError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}
