use pgvector::Vector;

use super::VectorStore;
use crate::models::RetrievedDocument;
use crate::Result;

impl VectorStore {
    /// Nearest-neighbour search over decision summary embeddings.
    ///
    /// Results are ordered by ascending distance; `similarity` is projected
    /// as `1 - distance` so callers see descending similarity.
    pub async fn search_documents(
        &self,
        query_embedding: &[f32],
        limit: i64,
        topic: Option<&str>,
    ) -> Result<Vec<RetrievedDocument>> {
        let embedding = Vector::from(query_embedding.to_vec());

        let documents = if let Some(topic) = topic {
            sqlx::query_as::<_, RetrievedDocument>(
                r"
                SELECT
                    id,
                    case_title,
                    reasons_summary,
                    reasons,
                    citation_number,
                    case_topic,
                    catchwords,
                    case_url,
                    (1 - (reasons_summary_embedding <-> $1))::float4 AS similarity
                FROM satdata
                WHERE case_topic = $2
                ORDER BY reasons_summary_embedding <-> $1
                LIMIT $3
                ",
            )
            .bind(&embedding)
            .bind(topic)
            .bind(limit)
            .fetch_all(self.pool())
            .await?
        } else {
            sqlx::query_as::<_, RetrievedDocument>(
                r"
                SELECT
                    id,
                    case_title,
                    reasons_summary,
                    reasons,
                    citation_number,
                    case_topic,
                    catchwords,
                    case_url,
                    (1 - (reasons_summary_embedding <-> $1))::float4 AS similarity
                FROM satdata
                ORDER BY reasons_summary_embedding <-> $1
                LIMIT $2
                ",
            )
            .bind(&embedding)
            .bind(limit)
            .fetch_all(self.pool())
            .await?
        };

        Ok(documents)
    }
}
