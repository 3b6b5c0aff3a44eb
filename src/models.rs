use serde::Deserialize;
use serde::Serialize;
use sqlx::FromRow;

/// A tribunal decision returned by a vector search over the `satdata` table.
///
/// `similarity` is computed in SQL as `1 - distance` and is only comparable
/// within one query's result set. `rerank_score` is populated after an
/// optional cross-encoder pass and is an unbounded logit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RetrievedDocument {
    pub id: String,
    pub case_title: String,
    pub reasons_summary: Option<String>,
    pub reasons: Option<String>,
    pub citation_number: Option<String>,
    pub case_topic: Option<String>,
    pub catchwords: Option<String>,
    pub case_url: Option<String>,
    pub similarity: f32,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl RetrievedDocument {
    /// Text used when scoring this document against a query.
    /// The summary is preferred over the full reasons to avoid truncation.
    pub fn rerank_text(&self) -> &str {
        self.reasons_summary
            .as_deref()
            .or(self.reasons.as_deref())
            .unwrap_or("")
    }
}

/// A sub-span of a decision's full text, joined with its parent case fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub chunk_text: String,
    pub chunk_index: i32,
    pub case_id: String,
    pub case_topic: Option<String>,
    pub case_title: String,
    pub reasons: Option<String>,
    pub citation_number: Option<String>,
    pub case_url: Option<String>,
    pub similarity: f32,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl RetrievedChunk {
    pub fn rerank_text(&self) -> &str {
        if self.chunk_text.is_empty() {
            self.reasons.as_deref().unwrap_or("")
        } else {
            &self.chunk_text
        }
    }
}

/// One item of the merged candidate pool fed to prompt composition.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextItem {
    Document(RetrievedDocument),
    Chunk(RetrievedChunk),
}

impl ContextItem {
    pub fn similarity(&self) -> f32 {
        match self {
            Self::Document(doc) => doc.similarity,
            Self::Chunk(chunk) => chunk.similarity,
        }
    }

    pub fn case_title(&self) -> &str {
        match self {
            Self::Document(doc) => &doc.case_title,
            Self::Chunk(chunk) => &chunk.case_title,
        }
    }

    pub fn citation_number(&self) -> &str {
        match self {
            Self::Document(doc) => doc.citation_number.as_deref().unwrap_or("N/A"),
            Self::Chunk(chunk) => chunk.citation_number.as_deref().unwrap_or("N/A"),
        }
    }

    pub fn case_url(&self) -> &str {
        match self {
            Self::Document(doc) => doc.case_url.as_deref().unwrap_or("#"),
            Self::Chunk(chunk) => chunk.case_url.as_deref().unwrap_or("#"),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Document(doc) => doc.reasons_summary.as_deref().unwrap_or(""),
            Self::Chunk(chunk) => &chunk.chunk_text,
        }
    }

    /// Sort a mixed candidate pool by similarity, highest first.
    pub fn sort_by_similarity(items: &mut [ContextItem]) {
        items.sort_by(|a, b| {
            b.similarity()
                .partial_cmp(&a.similarity())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

/// One turn of conversation history, consumed when composing prompts.
/// This crate never creates or persists history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

/// Compact projection of a retrieved case for argument responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedCase {
    pub id: String,
    pub case_title: String,
    pub citation_number: Option<String>,
    pub case_url: Option<String>,
    pub similarity: f32,
}

impl From<&RetrievedDocument> for RelatedCase {
    fn from(doc: &RetrievedDocument) -> Self {
        Self {
            id: doc.id.clone(),
            case_title: doc.case_title.clone(),
            citation_number: doc.citation_number.clone(),
            case_url: doc.case_url.clone(),
            similarity: doc.similarity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, similarity: f32) -> ContextItem {
        ContextItem::Document(RetrievedDocument {
            id: id.to_string(),
            case_title: format!("Case {id}"),
            reasons_summary: Some("summary".to_string()),
            reasons: None,
            citation_number: None,
            case_topic: None,
            catchwords: None,
            case_url: None,
            similarity,
            rerank_score: None,
        })
    }

    #[test]
    fn pool_sorts_highest_similarity_first() {
        let mut items = vec![doc("a", 0.2), doc("b", 0.9), doc("c", 0.5)];
        ContextItem::sort_by_similarity(&mut items);
        let order: Vec<f32> = items.iter().map(ContextItem::similarity).collect();
        assert_eq!(order, vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn missing_url_and_citation_render_placeholders() {
        let item = doc("a", 0.5);
        assert_eq!(item.case_url(), "#");
        assert_eq!(item.citation_number(), "N/A");
    }
}
