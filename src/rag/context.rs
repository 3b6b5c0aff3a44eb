//! Context composition from retrieved documents and chunks
//!
//! Items below the effective relevance cutoff are dropped before the
//! context block is rendered. The effective cutoff is deliberately looser
//! than the nominal threshold (`relevance_threshold * context_threshold_factor`)
//! so legitimate matches scoring under the nominal value still surface. When
//! nothing qualifies, composition refuses outright: the caller must answer
//! with a "no relevant documents" response instead of invoking the LLM.

use std::fmt::Write as _;

use tracing::warn;

use crate::models::ContextItem;
use crate::models::ConversationTurn;

/// Outcome of context composition
#[derive(Debug, Clone, PartialEq)]
pub enum ComposedContext {
    /// At least one item met the effective threshold
    Relevant(String),
    /// Nothing qualified; generation must not proceed
    Insufficient,
}

impl ComposedContext {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Relevant(text) => text,
            Self::Insufficient => "No sufficiently relevant documents found.",
        }
    }
}

/// Renders the labeled context block fed into prompts
pub struct ContextBuilder {
    effective_threshold: f32,
}

impl ContextBuilder {
    #[must_use]
    pub fn new(relevance_threshold: f32, threshold_factor: f32) -> Self {
        Self {
            effective_threshold: relevance_threshold * threshold_factor,
        }
    }

    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        Self::new(
            config.retrieval.relevance_threshold,
            config.retrieval.context_threshold_factor,
        )
    }

    #[must_use]
    pub fn effective_threshold(&self) -> f32 {
        self.effective_threshold
    }

    /// Compose the context block from a merged candidate pool.
    #[must_use]
    pub fn compose(&self, items: &[ContextItem]) -> ComposedContext {
        if items.is_empty() {
            warn!("No documents were provided for context composition");
            return ComposedContext::Insufficient;
        }

        let relevant: Vec<&ContextItem> = items
            .iter()
            .filter(|item| item.similarity() >= self.effective_threshold)
            .collect();

        if relevant.is_empty() {
            warn!(
                "No documents met the relevance threshold of {}",
                self.effective_threshold
            );
            return ComposedContext::Insufficient;
        }

        let mut parts = Vec::with_capacity(relevant.len());
        for (i, item) in relevant.iter().enumerate() {
            let mut block = String::new();
            match item {
                ContextItem::Chunk(chunk) => {
                    let _ = write!(
                        block,
                        "CHUNK {} [Similarity: {:.2}]:\n\
                         From case: {}\n\
                         Citation: {}\n\
                         Case URL: {}\n\
                         Text: {}\n",
                        i + 1,
                        chunk.similarity,
                        chunk.case_title,
                        item.citation_number(),
                        item.case_url(),
                        chunk.chunk_text,
                    );
                }
                ContextItem::Document(doc) => {
                    let case_url = item.case_url();
                    let _ = write!(
                        block,
                        "DOCUMENT {} [Similarity: {:.2}]:\n\
                         Title: {}\n\
                         Citation: {}\n\
                         Case URL: {}\n\
                         Content: {}\n\
                         IMPORTANT: Use this exact URL in markdown links: {}\n",
                        i + 1,
                        doc.similarity,
                        doc.case_title,
                        item.citation_number(),
                        case_url,
                        doc.reasons_summary.as_deref().unwrap_or(""),
                        case_url,
                    );
                }
            }
            parts.push(block);
        }

        tracing::info!("Formatted {} documents for context", relevant.len());
        ComposedContext::Relevant(parts.join("\n"))
    }
}

/// Serialize conversation history into the transcript block placed before
/// the query line. Returns an empty string for empty history.
#[must_use]
pub fn serialize_history(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return String::new();
    }

    let mut text = String::from("\nCONVERSATION HISTORY:\n");
    for turn in history {
        let role = capitalize(&turn.role);
        let _ = writeln!(text, "{}: {}", role, turn.content);
    }
    text
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RetrievedChunk;
    use crate::models::RetrievedDocument;

    fn document(similarity: f32) -> ContextItem {
        ContextItem::Document(RetrievedDocument {
            id: "case1".to_string(),
            case_title: "Smith v. Jones".to_string(),
            reasons_summary: Some("Summary of the dispute.".to_string()),
            reasons: None,
            citation_number: Some("2023 WASAT 123".to_string()),
            case_topic: Some("Commercial Tenancy".to_string()),
            catchwords: None,
            case_url: Some("https://example.com/case1".to_string()),
            similarity,
            rerank_score: None,
        })
    }

    fn chunk(similarity: f32) -> ContextItem {
        ContextItem::Chunk(RetrievedChunk {
            chunk_id: "chunk1".to_string(),
            chunk_text: "The notice period was held insufficient.".to_string(),
            chunk_index: 0,
            case_id: "case2".to_string(),
            case_topic: None,
            case_title: "Adams v. Miller".to_string(),
            reasons: None,
            citation_number: Some("2022 WASAT 456".to_string()),
            case_url: Some("https://example.com/case2".to_string()),
            similarity,
            rerank_score: None,
        })
    }

    #[test]
    fn effective_threshold_admits_loose_matches() {
        // Nominal 0.5 with factor 0.5: both 0.9 and 0.4 qualify.
        let builder = ContextBuilder::new(0.5, 0.5);
        let items = vec![document(0.9), document(0.4)];
        match builder.compose(&items) {
            ComposedContext::Relevant(text) => {
                assert!(text.contains("DOCUMENT 1"));
                assert!(text.contains("DOCUMENT 2"));
            }
            ComposedContext::Insufficient => panic!("both documents should qualify"),
        }
    }

    #[test]
    fn all_below_cutoff_is_a_hard_gate() {
        let builder = ContextBuilder::new(0.5, 0.5);
        let items = vec![document(0.1)];
        assert_eq!(builder.compose(&items), ComposedContext::Insufficient);
    }

    #[test]
    fn empty_pool_is_insufficient() {
        let builder = ContextBuilder::new(0.5, 0.5);
        assert_eq!(builder.compose(&[]), ComposedContext::Insufficient);
    }

    #[test]
    fn document_blocks_embed_the_exact_url() {
        let builder = ContextBuilder::new(0.5, 0.5);
        let composed = builder.compose(&[document(0.9)]);
        let ComposedContext::Relevant(text) = composed else {
            panic!("expected relevant context");
        };
        assert!(text.contains("IMPORTANT: Use this exact URL in markdown links: https://example.com/case1"));
    }

    #[test]
    fn chunks_render_with_their_own_label() {
        let builder = ContextBuilder::new(0.5, 0.5);
        let composed = builder.compose(&[chunk(0.8), document(0.7)]);
        let ComposedContext::Relevant(text) = composed else {
            panic!("expected relevant context");
        };
        assert!(text.contains("CHUNK 1"));
        assert!(text.contains("DOCUMENT 2"));
        assert!(text.contains("From case: Adams v. Miller"));
    }

    #[test]
    fn history_serializes_turn_by_turn() {
        let history = vec![
            ConversationTurn {
                role: "user".to_string(),
                content: "What is a strata scheme?".to_string(),
            },
            ConversationTurn {
                role: "assistant".to_string(),
                content: "A strata scheme divides a property...".to_string(),
            },
        ];
        let text = serialize_history(&history);
        assert!(text.contains("CONVERSATION HISTORY:"));
        assert!(text.contains("User: What is a strata scheme?"));
        assert!(text.contains("Assistant: A strata scheme divides a property..."));
    }

    #[test]
    fn empty_history_serializes_to_nothing() {
        assert_eq!(serialize_history(&[]), "");
    }
}
