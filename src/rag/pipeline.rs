//! End-to-end RAG service: embed, retrieve, compose, generate.
//!
//! This is the entry point the web layer calls. Nothing below it raises to
//! the caller under normal operation: every failure mode resolves to a
//! well-formed outcome carrying either content or a clearly marked
//! error/empty state, with full detail logged server-side.

use std::sync::Arc;

use tracing::error;
use tracing::info;
use uuid::Uuid;

use super::classifier::QueryClassifier;
use super::context::serialize_history;
use super::context::ComposedContext;
use super::context::ContextBuilder;
use super::generation::ChunkCallback;
use super::generation::GenerationOrchestrator;
use super::generation::ReasoningMode;
use super::generation::StepCallback;
use super::prompts::LegalPrompts;
use super::GenerationResult;
use super::QueryClassification;
use crate::config::AppConfig;
use crate::database::VectorStore;
use crate::embeddings::EmbeddingService;
use crate::llm::get_llm_provider;
use crate::llm::CallPurpose;
use crate::llm::GenerationOptions;
use crate::models::ContextItem;
use crate::models::ConversationTurn;
use crate::models::RelatedCase;
use crate::retrieval::Retriever;
use crate::Result;

/// Document/chunk pool sizes for the chat surface
const CHAT_DOCUMENT_LIMIT: i64 = 3;
const CHAT_CHUNK_LIMIT: i64 = 5;

/// Pool sizes for the argument-building surface
const ARGUMENTS_DOCUMENT_LIMIT: i64 = 3;
const ARGUMENTS_CHUNK_LIMIT: i64 = 5;

/// A chat request from the web layer
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: Option<String>,
    pub history: Vec<ConversationTurn>,
}

/// Chat outcome. `response` is empty when the answer was streamed.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response: String,
    pub conversation_id: String,
    pub classification: QueryClassification,
}

/// An argument-building request
#[derive(Debug, Clone)]
pub struct ArgumentsRequest {
    pub case_content: String,
    pub case_topic: Option<String>,
    pub llm_model: Option<String>,
    pub mode: ReasoningMode,
    pub conversation_id: Option<String>,
}

/// Argument-building outcome
#[derive(Debug, Clone)]
pub struct ArgumentsOutcome {
    pub result: GenerationResult,
    pub related_cases: Vec<RelatedCase>,
    pub conversation_id: String,
    pub disclaimer: String,
}

/// Complete RAG service
pub struct RagService {
    embeddings: Arc<EmbeddingService>,
    retriever: Retriever,
    classifier: QueryClassifier,
    config: AppConfig,
}

impl RagService {
    /// Create a new RAG service
    ///
    /// # Errors
    /// - Database connection errors
    /// - Embedding service configuration errors
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let store = Arc::new(VectorStore::from_config(config).await?);
        let embeddings = Arc::new(EmbeddingService::new(config)?);
        Ok(Self::from_parts(store, embeddings, config.clone()))
    }

    /// Create from existing services
    #[must_use]
    pub fn from_parts(
        store: Arc<VectorStore>,
        embeddings: Arc<EmbeddingService>,
        config: AppConfig,
    ) -> Self {
        let retriever = Retriever::new(store, &config.retrieval);
        Self {
            embeddings,
            retriever,
            classifier: QueryClassifier::new(),
            config,
        }
    }

    #[must_use]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer a chat query against the corpus.
    ///
    /// With a `chunk_callback` (and streaming enabled in configuration) the
    /// answer is delivered incrementally and `response` comes back empty.
    /// Upstream failures never escape: the outcome carries a user-safe
    /// apologetic message and a generated conversation id instead.
    pub async fn chat(
        &self,
        request: &ChatRequest,
        chunk_callback: Option<ChunkCallback<'_>>,
    ) -> ChatOutcome {
        let classification = self.classifier.classify(&request.message);
        info!(
            "Query classification: {} (confidence: {:.2})",
            classification.label.as_str(),
            classification.confidence
        );

        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(|| format!("conv_{}", Uuid::new_v4()));

        match self.chat_inner(request, classification, chunk_callback).await {
            Ok(response) => ChatOutcome {
                response,
                conversation_id,
                classification,
            },
            Err(e) => {
                error!("Error processing chat request: {e}");
                ChatOutcome {
                    response: "I'm sorry, I encountered an error while processing your request. \
                               Please try again later."
                        .to_string(),
                    conversation_id,
                    classification,
                }
            }
        }
    }

    async fn chat_inner(
        &self,
        request: &ChatRequest,
        classification: QueryClassification,
        mut chunk_callback: Option<ChunkCallback<'_>>,
    ) -> Result<String> {
        let query_embedding = self.embeddings.embed(&request.message).await?;

        let documents = self
            .retriever
            .retrieve_documents(&query_embedding, CHAT_DOCUMENT_LIMIT, None)
            .await;
        let chunks = self
            .retriever
            .retrieve_chunks(&query_embedding, CHAT_CHUNK_LIMIT, None, None)
            .await;

        let mut pool: Vec<ContextItem> = documents
            .into_iter()
            .map(ContextItem::Document)
            .chain(chunks.into_iter().map(ContextItem::Chunk))
            .collect();
        ContextItem::sort_by_similarity(&mut pool);

        let builder = ContextBuilder::from_config(&self.config);
        let context = match builder.compose(&pool) {
            ComposedContext::Relevant(text) => text,
            ComposedContext::Insufficient => {
                // A defined terminal state, not an error.
                return Ok(format!(
                    "I'm sorry, but I couldn't find any relevant legal cases that match your \
                     query: '{}'. Could you try rephrasing your question or providing more \
                     specific details about the legal issue you're interested in?",
                    request.message
                ));
            }
        };

        let guidance = LegalPrompts::response_guidance(classification.label);
        let mut values = std::collections::HashMap::new();
        values.insert("query", request.message.clone());
        values.insert("context", context);
        values.insert("history", serialize_history(&request.history));
        values.insert("instruction", guidance.instruction.to_string());
        values.insert("format_template", guidance.format_template.to_string());
        let prompt = LegalPrompts::chat().render(&values);

        let provider = get_llm_provider(&self.config, None, None, CallPurpose::Chat);
        let options = GenerationOptions::from_config(&self.config);

        if let Some(cb) = chunk_callback.as_mut() {
            if self.config.llm.enable_streaming {
                match provider.generate_stream(&prompt, &options).await {
                    Ok(mut stream) => {
                        while let Some(item) = stream.next().await {
                            match item {
                                Ok(fragment) => cb(&fragment),
                                Err(e) => {
                                    error!("Streaming chat completion failed: {e}");
                                    cb(&format!("\nError generating response: {e}"));
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        error!("Failed to start chat stream: {e}");
                        cb(&format!("Error generating response: {e}"));
                    }
                }
                // Content was delivered through the callback.
                return Ok(String::new());
            }
        }

        match provider.generate(&prompt, &options).await {
            Ok(text) => Ok(text),
            Err(e) => {
                error!("Chat completion failed: {e}");
                Ok(format!("Error generating response: {e}"))
            }
        }
    }

    /// Build legal arguments for a case against its most similar precedents.
    ///
    /// Retrieval uses the two-stage rerank path for both documents and
    /// chunks. Upstream failures resolve to an apologetic result, never a
    /// raised error.
    pub async fn build_arguments(
        &self,
        request: &ArgumentsRequest,
        step_callback: Option<StepCallback<'_>>,
        chunk_callback: Option<ChunkCallback<'_>>,
    ) -> ArgumentsOutcome {
        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(|| format!("conv_{}", Uuid::new_v4()));

        let orchestrator = GenerationOrchestrator::from_config(&self.config, request.llm_model.as_deref());
        let disclaimer = format!(
            "This analysis was generated by {} and is not legal advice. Verify all citations \
             against the source decisions before relying on them.",
            orchestrator.primary_name()
        );

        let case_embedding = match self.embeddings.embed(&request.case_content).await {
            Ok(embedding) => embedding,
            Err(e) => {
                error!("Error embedding case content: {e}");
                return ArgumentsOutcome {
                    result: GenerationResult {
                        final_output: "I'm sorry, I encountered an error while processing your \
                                       request. Please try again later."
                            .to_string(),
                        steps: Vec::new(),
                        token_usage: super::TokenUsage::default(),
                        execution_time: 0.0,
                        error: Some(e.to_string()),
                    },
                    related_cases: Vec::new(),
                    conversation_id,
                    disclaimer,
                };
            }
        };

        let topic = request.case_topic.as_deref();
        let multiplier = self.config.retrieval.candidate_multiplier;

        let documents = self
            .retriever
            .retrieve_with_reranking(
                &case_embedding,
                &request.case_content,
                ARGUMENTS_DOCUMENT_LIMIT,
                topic,
                multiplier,
            )
            .await;
        let chunks = self
            .retriever
            .retrieve_case_chunks_with_reranking(
                &case_embedding,
                &request.case_content,
                ARGUMENTS_CHUNK_LIMIT,
                None,
                topic,
                multiplier,
            )
            .await;

        let related_cases: Vec<RelatedCase> = documents.iter().map(RelatedCase::from).collect();

        let mut pool: Vec<ContextItem> = documents
            .into_iter()
            .map(ContextItem::Document)
            .chain(chunks.into_iter().map(ContextItem::Chunk))
            .collect();
        ContextItem::sort_by_similarity(&mut pool);

        let result = orchestrator
            .run(
                &request.case_content,
                &pool,
                topic,
                request.mode,
                step_callback,
                chunk_callback,
            )
            .await;

        ArgumentsOutcome {
            result,
            related_cases,
            conversation_id,
            disclaimer,
        }
    }
}
