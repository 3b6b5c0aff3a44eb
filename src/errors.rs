use thiserror::Error;

#[derive(Error, Debug)]
pub enum SatRagError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Reranker error: {0}")]
    Reranker(String),

    #[error("LLM provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SatRagError {
    /// Build a provider error carrying the provider/model label it came from.
    pub fn provider(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SatRagError>;
