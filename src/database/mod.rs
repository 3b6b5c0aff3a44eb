//! Vector store access over Postgres + pgvector.
//!
//! Documents live in `satdata` (one summary embedding per decision) and
//! sub-document chunks in `reasons_chunks` (one embedding per chunk, joined
//! back to the parent decision). Both embedding columns use the same model
//! and dimension so their similarities are comparable when pools are merged.

use sqlx::PgPool;

use crate::Result;

mod chunks;
mod documents;

/// Database connection pool wrapper
#[derive(Debug, Clone)]
pub struct VectorStore {
    pool: PgPool,
}

impl VectorStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new store from configuration
    pub async fn from_config(config: &crate::config::AppConfig) -> Result<Self> {
        let pool_options = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections())
            .min_connections(config.min_connections())
            .acquire_timeout(std::time::Duration::from_secs(config.connection_timeout()));

        let pool = pool_options.connect(config.database_url()).await?;

        tracing::info!(
            "Vector store pool configured: max_connections={}, min_connections={}",
            config.max_connections(),
            config.min_connections()
        );

        Ok(Self::new(pool))
    }

    /// Get a reference to the pool for raw queries
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}
