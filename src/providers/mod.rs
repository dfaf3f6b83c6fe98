//! Model provider abstraction.
//!
//! Each pipeline stage talks to a chat model through the [`ChatModel`]
//! trait, so the pipeline can be exercised with mock models in tests and
//! pointed at any OpenAI-compatible endpoint in production.

pub mod openrouter;

pub use openrouter::OpenRouterClient;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::config::ModelsConfig;
use crate::error::{ConfigError, ProviderError};

/// The role a model plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    Generator,
    Verifier,
    Synthesizer,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Generator => "generator",
            ModelRole::Verifier => "verifier",
            ModelRole::Synthesizer => "synthesizer",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chat completion model bound to one pipeline role.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a single system + user exchange and return the assistant text.
    async fn complete(&self, system_prompt: &str, user_content: &str)
    -> Result<String, ProviderError>;

    /// The role this model is bound to.
    fn role(&self) -> ModelRole;

    /// The provider-side model identifier.
    fn model_name(&self) -> &str;
}

/// The three model clients the pipeline needs, one per role.
#[derive(Clone)]
pub struct RoleClients {
    pub generator: Arc<dyn ChatModel>,
    pub verifier: Arc<dyn ChatModel>,
    pub synthesizer: Arc<dyn ChatModel>,
}

impl RoleClients {
    /// Build all three clients from configuration, reading each role's API
    /// key from its configured environment variable. Fails fast if any key
    /// is missing so a misconfigured service does not start.
    pub fn from_config(models: &ModelsConfig) -> Result<Self, ConfigError> {
        let generator = OpenRouterClient::from_role_config(ModelRole::Generator, &models.generator)?;
        let verifier = OpenRouterClient::from_role_config(ModelRole::Verifier, &models.verifier)?;
        let synthesizer =
            OpenRouterClient::from_role_config(ModelRole::Synthesizer, &models.synthesizer)?;
        Ok(Self {
            generator: Arc::new(generator),
            verifier: Arc::new(verifier),
            synthesizer: Arc::new(synthesizer),
        })
    }
}
