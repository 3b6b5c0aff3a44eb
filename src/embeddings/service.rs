use tracing::debug;

use super::EmbeddingClient;
use super::EmbeddingConfig;
use crate::errors::SatRagError;
use crate::Result;

/// Service wrapping the embedding client with model-specific conventions.
///
/// e5-family models expect every encoded text to carry a role prefix:
/// `query:` for search queries, `passage:` for indexed text. Both helpers
/// skip prefixing when the text already starts with the marker.
pub struct EmbeddingService {
    client: EmbeddingClient,
    model: String,
    dimension: usize,
}

impl EmbeddingService {
    pub fn new(config: &crate::config::AppConfig) -> Result<Self> {
        let embedding_config = EmbeddingConfig::from_app_config(config);
        let client = EmbeddingClient::new(
            embedding_config.provider,
            embedding_config.model.clone(),
            embedding_config.endpoint,
            embedding_config.api_key,
        )?;

        Ok(Self {
            client,
            model: embedding_config.model,
            dimension: embedding_config.dimension,
        })
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed a query text, returning a plain `Vec<f32>` of the configured
    /// dimension.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let prepared = self.prepare_query(text);
        let embedding = self.client.generate(&prepared).await?;
        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    /// Embed a batch of query texts. Element-wise equivalent to calling
    /// [`embed`](Self::embed) per item, including the prefixing rule.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let prepared: Vec<String> = texts.iter().map(|t| self.prepare_query(t)).collect();
        let embeddings = self.client.generate_batch(&prepared).await?;
        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }
        debug!("Generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }

    /// Embed indexed text (used by the ingestion side of the corpus).
    pub async fn embed_passage(&self, text: &str) -> Result<Vec<f32>> {
        let prepared = self.prepare_passage(text);
        let embedding = self.client.generate(&prepared).await?;
        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    fn prepare_query(&self, text: &str) -> String {
        apply_prefix(&self.model, text, "query:")
    }

    fn prepare_passage(&self, text: &str) -> String {
        apply_prefix(&self.model, text, "passage:")
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() == self.dimension {
            Ok(())
        } else {
            Err(SatRagError::Embedding(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            )))
        }
    }
}

/// Prepend the e5 role prefix unless the model doesn't use prefixes or the
/// text already carries one.
fn apply_prefix(model: &str, text: &str, prefix: &str) -> String {
    if !model.to_lowercase().contains("e5") || text.starts_with(prefix) {
        text.to_string()
    } else {
        format!("{prefix} {text}")
    }
}
