//! Embeddings generation module
//!
//! Turns text into fixed-dimension vectors via an HTTP embedding endpoint
//! (OpenAI-compatible or Ollama). Models in the e5 family require literal
//! `query:` / `passage:` prefixes before encoding; the service applies them
//! and never double-prefixes text that already carries one.

pub mod client;
pub mod service;

pub use client::EmbeddingClient;
pub use client::EmbeddingProviderKind;
pub use service::EmbeddingService;

/// Maximum number of texts sent in one batch request
pub const MAX_BATCH_SIZE: usize = 100;

/// Configuration for embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub dimension: usize,
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl EmbeddingConfig {
    pub fn from_app_config(config: &crate::config::AppConfig) -> Self {
        let embeddings = &config.embeddings;

        // An API key implies an OpenAI-compatible endpoint; otherwise assume
        // a local Ollama-style server.
        let provider = if embeddings.api_key.is_some()
            || embeddings.endpoint.contains("api.openai.com")
        {
            EmbeddingProviderKind::OpenAi
        } else {
            EmbeddingProviderKind::Ollama
        };

        Self {
            provider,
            model: embeddings.model.clone(),
            dimension: embeddings.dimension,
            endpoint: embeddings.endpoint.clone(),
            api_key: embeddings.api_key.clone(),
        }
    }
}
