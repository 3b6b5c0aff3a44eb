use pgvector::Vector;

use super::VectorStore;
use crate::models::RetrievedChunk;
use crate::Result;

impl VectorStore {
    /// Nearest-neighbour search over chunk embeddings, optionally restricted
    /// to one parent case and/or one topic.
    pub async fn search_chunks(
        &self,
        query_embedding: &[f32],
        limit: i64,
        case_id: Option<&str>,
        topic: Option<&str>,
    ) -> Result<Vec<RetrievedChunk>> {
        let embedding = Vector::from(query_embedding.to_vec());

        // The filter set varies per call, so the statement is assembled with
        // sequential placeholders and bound in the same order.
        let mut sql = String::from(
            r"
            SELECT
                rc.id AS chunk_id,
                rc.chunk_text,
                rc.chunk_index,
                rc.case_id,
                rc.case_topic,
                s.case_title,
                s.reasons,
                s.citation_number,
                s.case_url,
                (1 - (rc.chunk_embedding <-> $1))::float4 AS similarity
            FROM reasons_chunks rc
            JOIN satdata s ON rc.case_id = s.id
            WHERE 1=1",
        );

        let mut placeholder = 2;
        if case_id.is_some() {
            sql.push_str(&format!(" AND rc.case_id = ${placeholder}"));
            placeholder += 1;
        }
        if topic.is_some() {
            sql.push_str(&format!(" AND rc.case_topic = ${placeholder}"));
            placeholder += 1;
        }
        sql.push_str(&format!(
            " ORDER BY rc.chunk_embedding <-> $1 LIMIT ${placeholder}"
        ));

        let mut query = sqlx::query_as::<_, RetrievedChunk>(&sql).bind(&embedding);
        if let Some(case_id) = case_id {
            query = query.bind(case_id);
        }
        if let Some(topic) = topic {
            query = query.bind(topic);
        }
        let chunks = query.bind(limit).fetch_all(self.pool()).await?;

        Ok(chunks)
    }
}
