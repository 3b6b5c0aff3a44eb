//! Retrieval layer
//!
//! Composes the vector store and the optional cross-encoder into top-K
//! document and chunk retrieval. Reranked variants over-fetch
//! `limit * candidate_multiplier` raw candidates first: embedding similarity
//! is a coarse recall filter, and the cross-encoder buys precision at a
//! bounded extra cost.
//!
//! Store-level failures never propagate out of this layer; they are logged
//! and surface as empty result lists.

pub mod reranker;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::error;
use tracing::info;
use tracing::warn;

pub use reranker::get_reranker;
pub use reranker::CrossEncoderReranker;
pub use reranker::Reranker;

use crate::config::RetrievalConfig;
use crate::database::VectorStore;
use crate::models::RetrievedChunk;
use crate::models::RetrievedDocument;

enum RerankerSource {
    Disabled,
    /// Loaded lazily on first use via the process-wide cache
    Lazy(PathBuf),
    /// Injected instance (tests, embedded deployments)
    Shared(Arc<dyn Reranker>),
}

/// Retrieval service over documents and chunks
pub struct Retriever {
    store: Arc<VectorStore>,
    reranker: RerankerSource,
}

impl Retriever {
    pub fn new(store: Arc<VectorStore>, config: &RetrievalConfig) -> Self {
        let reranker = if config.enable_reranking {
            RerankerSource::Lazy(PathBuf::from(&config.reranker_model_dir))
        } else {
            RerankerSource::Disabled
        };
        Self { store, reranker }
    }

    /// Build a retriever with an explicit reranker instance
    pub fn with_reranker(store: Arc<VectorStore>, reranker: Arc<dyn Reranker>) -> Self {
        Self {
            store,
            reranker: RerankerSource::Shared(reranker),
        }
    }

    fn reranker(&self) -> Option<Arc<dyn Reranker>> {
        match &self.reranker {
            RerankerSource::Disabled => None,
            RerankerSource::Shared(reranker) => Some(Arc::clone(reranker)),
            RerankerSource::Lazy(dir) => match get_reranker(dir) {
                Ok(reranker) => Some(reranker),
                Err(e) => {
                    warn!("Reranking unavailable ({e}), continuing without it");
                    None
                }
            },
        }
    }

    /// Retrieve the `limit` nearest documents, optionally filtered by topic.
    /// Returns an empty list on any store failure.
    pub async fn retrieve_documents(
        &self,
        query_embedding: &[f32],
        limit: i64,
        topic: Option<&str>,
    ) -> Vec<RetrievedDocument> {
        match self.store.search_documents(query_embedding, limit, topic).await {
            Ok(documents) => {
                info!("Retrieved {} documents from vector store", documents.len());
                documents
            }
            Err(e) => {
                error!("Error retrieving documents from vector store: {e}");
                Vec::new()
            }
        }
    }

    /// Retrieve the `limit` nearest chunks, optionally filtered by parent
    /// case and/or topic. Returns an empty list on any store failure.
    pub async fn retrieve_chunks(
        &self,
        query_embedding: &[f32],
        limit: i64,
        case_id: Option<&str>,
        topic: Option<&str>,
    ) -> Vec<RetrievedChunk> {
        match self
            .store
            .search_chunks(query_embedding, limit, case_id, topic)
            .await
        {
            Ok(chunks) => {
                info!("Retrieved {} case chunks from vector store", chunks.len());
                chunks
            }
            Err(e) => {
                error!("Error retrieving case chunks from vector store: {e}");
                Vec::new()
            }
        }
    }

    /// Two-stage document retrieval: over-fetch, rerank against the raw query
    /// text, return the top `limit` by rerank score. Falls back to the
    /// un-reranked top `limit` when reranking is unavailable or fails.
    pub async fn retrieve_with_reranking(
        &self,
        query_embedding: &[f32],
        query_text: &str,
        limit: i64,
        topic: Option<&str>,
        candidate_multiplier: i64,
    ) -> Vec<RetrievedDocument> {
        let candidate_limit = limit * candidate_multiplier;
        let candidates = self
            .retrieve_documents(query_embedding, candidate_limit, topic)
            .await;
        if candidates.is_empty() {
            return Vec::new();
        }

        let reranker = self.reranker();
        rerank_and_limit_documents(candidates, query_text, limit as usize, reranker.as_deref())
    }

    /// Chunk variant of [`retrieve_with_reranking`](Self::retrieve_with_reranking)
    pub async fn retrieve_case_chunks_with_reranking(
        &self,
        query_embedding: &[f32],
        query_text: &str,
        limit: i64,
        case_id: Option<&str>,
        topic: Option<&str>,
        candidate_multiplier: i64,
    ) -> Vec<RetrievedChunk> {
        let candidate_limit = limit * candidate_multiplier;
        let candidates = self
            .retrieve_chunks(query_embedding, candidate_limit, case_id, topic)
            .await;
        if candidates.is_empty() {
            return Vec::new();
        }

        let reranker = self.reranker();
        rerank_and_limit_chunks(candidates, query_text, limit as usize, reranker.as_deref())
    }
}

fn rerank_and_limit_documents(
    candidates: Vec<RetrievedDocument>,
    query_text: &str,
    limit: usize,
    reranker: Option<&dyn Reranker>,
) -> Vec<RetrievedDocument> {
    let mut documents = match reranker {
        Some(reranker) => rerank_documents(candidates, query_text, reranker),
        None => candidates,
    };
    documents.truncate(limit);
    documents
}

fn rerank_and_limit_chunks(
    candidates: Vec<RetrievedChunk>,
    query_text: &str,
    limit: usize,
    reranker: Option<&dyn Reranker>,
) -> Vec<RetrievedChunk> {
    let mut chunks = match reranker {
        Some(reranker) => rerank_chunks(candidates, query_text, reranker),
        None => candidates,
    };
    chunks.truncate(limit);
    chunks
}

/// Rerank documents by cross-encoder score, descending. On scorer failure the
/// original ordering is returned unchanged (degradation, not failure).
pub fn rerank_documents(
    mut documents: Vec<RetrievedDocument>,
    query_text: &str,
    reranker: &dyn Reranker,
) -> Vec<RetrievedDocument> {
    let passages: Vec<&str> = documents.iter().map(RetrievedDocument::rerank_text).collect();
    match reranker.score(query_text, &passages) {
        Ok(scores) => {
            for (document, score) in documents.iter_mut().zip(scores) {
                document.rerank_score = Some(score);
            }
            documents.sort_by(|a, b| {
                b.rerank_score
                    .partial_cmp(&a.rerank_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            info!("Reranked {} documents", documents.len());
            documents
        }
        Err(e) => {
            error!("Error reranking documents: {e}");
            documents
        }
    }
}

/// Chunk variant of [`rerank_documents`], scoring against the chunk text
pub fn rerank_chunks(
    mut chunks: Vec<RetrievedChunk>,
    query_text: &str,
    reranker: &dyn Reranker,
) -> Vec<RetrievedChunk> {
    let passages: Vec<&str> = chunks.iter().map(RetrievedChunk::rerank_text).collect();
    match reranker.score(query_text, &passages) {
        Ok(scores) => {
            for (chunk, score) in chunks.iter_mut().zip(scores) {
                chunk.rerank_score = Some(score);
            }
            chunks.sort_by(|a, b| {
                b.rerank_score
                    .partial_cmp(&a.rerank_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            info!("Reranked {} chunks", chunks.len());
            chunks
        }
        Err(e) => {
            error!("Error reranking chunks: {e}");
            chunks
        }
    }
}
