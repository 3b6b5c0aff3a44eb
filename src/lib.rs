//! satrag — the retrieval-and-generation core of a RAG system over State
//! Administrative Tribunal decisions.
//!
//! The crate embeds queries, retrieves semantically similar decisions and
//! decision chunks from a pgvector-backed store (with optional cross-encoder
//! reranking), and feeds them to a pluggable LLM layer to produce grounded
//! answers — including a multi-step reasoning-chain mode for legal argument
//! generation with provider fallback and per-step metrics.
//!
//! The surrounding web API, authentication, conversation persistence and the
//! scraper/ETL that populates the corpus are external collaborators.

pub mod config;
pub mod database;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod models;
pub mod rag;
pub mod retrieval;

pub use config::AppConfig;
pub use errors::Result;
pub use errors::SatRagError;
