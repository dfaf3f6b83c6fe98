//! Configuration system for verity.
//!
//! Uses `figment` for layered configuration: defaults -> TOML file ->
//! environment. Environment variables are prefixed with `VERITY_` and use
//! `__` as the section separator (e.g. `VERITY_SERVER__PORT=9000`).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Default OpenRouter API base URL.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub models: ModelsConfig,
    pub search: SearchConfig,
    pub store: StoreConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by the CORS layer (the local frontend).
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

/// Pipeline orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Aggregate bound for one full pipeline run. A hung provider cannot
    /// block the caller past this.
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
        }
    }
}

/// Per-role model configuration for the three pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub generator: RoleConfig,
    pub verifier: RoleConfig,
    pub synthesizer: RoleConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            generator: RoleConfig {
                model: "meta-llama/llama-3.3-70b-instruct:free".to_string(),
                api_key_env: "OPENROUTER_API_KEY1".to_string(),
                base_url: OPENROUTER_BASE_URL.to_string(),
                temperature: 0.7,
                max_tokens: 4096,
                timeout_secs: 60,
            },
            verifier: RoleConfig {
                model: "tngtech/deepseek-r1t-chimera:free".to_string(),
                api_key_env: "OPENROUTER_API_KEY2".to_string(),
                base_url: OPENROUTER_BASE_URL.to_string(),
                temperature: 0.2,
                max_tokens: 4096,
                timeout_secs: 60,
            },
            synthesizer: RoleConfig {
                model: "nvidia/nemotron-nano-9b-v2:free".to_string(),
                api_key_env: "OPENROUTER_API_KEY3".to_string(),
                base_url: OPENROUTER_BASE_URL.to_string(),
                temperature: 0.2,
                max_tokens: 4096,
                timeout_secs: 60,
            },
        }
    }
}

/// Configuration for one model role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Model identifier on the provider (e.g. "meta-llama/llama-3.3-70b-instruct:free").
    pub model: String,
    /// Environment variable name containing the API key for this role.
    pub api_key_env: String,
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// Sampling temperature for this role.
    pub temperature: f32,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Per-call HTTP timeout.
    pub timeout_secs: u64,
}

/// Web search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Environment variable name containing the search API key. A missing
    /// key degrades search to empty results; it is not a startup error.
    pub api_key_env: String,
    /// Maximum number of hits passed downstream. Bounds prompt size.
    pub max_results: usize,
    /// Tavily search depth: "basic" or "advanced".
    pub search_depth: String,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: "TAVILY_API_KEY".to_string(),
            max_results: 5,
            search_depth: "advanced".to_string(),
            timeout_secs: 20,
        }
    }
}

/// Chat store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("chat_history.db"),
        }
    }
}

/// Load configuration with layered precedence.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `VERITY_`)
/// 2. Explicit config file, or `verity.toml` in the working directory
/// 3. Built-in defaults
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    match config_path {
        Some(path) => {
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let default_path = Path::new("verity.toml");
            if default_path.exists() {
                figment = figment.merge(Toml::file(default_path));
            }
        }
    }

    figment = figment.merge(Env::prefixed("VERITY_").split("__"));

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}
