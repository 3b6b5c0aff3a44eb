//! LLM provider abstraction
//!
//! Each adapter speaks one vendor's chat-completion wire protocol behind the
//! uniform [`LlmProvider`] trait. Failures come back as `Err` values, never
//! panics; the generation layer decides whether to fall back to the
//! configured secondary provider. An unknown provider name resolves to the
//! offline [`DummyProvider`] so the system degrades instead of refusing to
//! start.

pub mod anthropic;
pub mod dummy;
pub mod openai;
pub mod streaming;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use tracing::warn;

pub use anthropic::AnthropicProvider;
pub use dummy::DummyProvider;
pub use openai::DeepSeekProvider;
pub use openai::OpenAiProvider;
pub use streaming::TokenStream;

use crate::config::AppConfig;
use crate::Result;

/// Options for a single completion call
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 4096,
        }
    }
}

/// A single LLM vendor/model behind a uniform completion contract
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate one completion for the prompt
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// Generate a streaming completion. Fragments arrive in generation order;
    /// a mid-stream failure ends the stream with one `Err` item.
    async fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<TokenStream>;

    /// Human-readable `provider/model` identifier, used in fallback
    /// disclosure messages
    fn name(&self) -> String;
}

/// Which configured surface a provider is being resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPurpose {
    Chat,
    Arguments,
}

/// Resolve a provider instance.
///
/// Resolution order: explicit `provider`/`model` arguments, then a
/// model-name prefix heuristic (a `claude-*` model implies Anthropic and so
/// on), then per-purpose configuration defaults. Unknown names and
/// construction failures resolve to the dummy provider rather than erroring,
/// so local/offline operation keeps working.
pub fn get_llm_provider(
    config: &AppConfig,
    provider: Option<&str>,
    model: Option<&str>,
    purpose: CallPurpose,
) -> Arc<dyn LlmProvider> {
    let llm = &config.llm;

    let mut provider_name = provider.map_or_else(
        || match purpose {
            CallPurpose::Chat => llm.chat_provider.clone(),
            CallPurpose::Arguments => llm.arguments_provider.clone(),
        },
        str::to_string,
    );
    let model_name = model.map_or_else(
        || match purpose {
            CallPurpose::Chat => llm.chat_model.clone(),
            CallPurpose::Arguments => llm.arguments_model.clone(),
        },
        str::to_string,
    );

    // The model name is authoritative when it clearly belongs to one vendor.
    if model_name.starts_with("claude-") {
        provider_name = "anthropic".to_string();
    } else if model_name.starts_with("gpt-")
        || model_name.starts_with("o3")
        || model_name == "text-davinci-003"
    {
        provider_name = "openai".to_string();
    } else if model_name.starts_with("deepseek-") {
        provider_name = "deepseek".to_string();
    }

    info!(
        purpose = ?purpose,
        provider = %provider_name,
        model = %model_name,
        "Resolved LLM provider"
    );

    let built: Result<Arc<dyn LlmProvider>> = match provider_name.to_lowercase().as_str() {
        "openai" => OpenAiProvider::new(llm.openai_api_key.clone(), model_name.clone())
            .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
        "deepseek" => DeepSeekProvider::new(llm.deepseek_api_key.clone(), model_name.clone())
            .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
        "anthropic" => AnthropicProvider::new(llm.anthropic_api_key.clone(), model_name.clone())
            .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
        other => {
            warn!("Unknown provider '{other}'. Using dummy provider.");
            Ok(Arc::new(DummyProvider::new("dummy")))
        }
    };

    built.unwrap_or_else(|e| {
        warn!("Failed to initialize provider '{provider_name}': {e}. Using dummy provider.");
        Arc::new(DummyProvider::new("dummy"))
    })
}

/// Resolve the one designated fallback provider from configuration
pub fn get_fallback_provider(config: &AppConfig) -> Arc<dyn LlmProvider> {
    get_llm_provider(
        config,
        Some(config.llm.fallback_provider.as_str()),
        Some(config.llm.fallback_model.as_str()),
        CallPurpose::Arguments,
    )
}
