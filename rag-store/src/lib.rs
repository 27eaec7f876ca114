//! High-level RAG facade: persistence gateway + retrieval over Qdrant.
//!
//! This crate provides:
//! - [`gateway::PersistenceGateway`] — the database-gateway operations the
//!   indexing and review pipelines call (store chunk/relationship, search
//!   similar code, repository/review bookkeeping).
//! - [`embed`] — the embedding-service contract (skip policy, token-bounded
//!   chunking, retried provider calls) plus Ollama/OpenAI providers.
//! - [`RagStore`] — a thin facade over vector search and free-text RAG
//!   context building, for callers that just want top-K retrieval.

mod config;
pub mod embed;
mod errors;
mod filters;
pub mod gateway;
pub mod qdrant_facade;
pub mod record;
mod retrieve;

pub use config::{DistanceKind, RagConfig, VectorSpace};
pub use embed::ollama::{OllamaConfig, OllamaEmbedder};
pub use embed::openai::{OpenAiEmbedder, OpenAiEmbedderConfig};
pub use embed::{chunk_text, embed_file_text, should_skip, EmbeddedChunk, EmbeddingsProvider};
pub use errors::RagError;
pub use gateway::{
    ChunkMetadata, CodeRelationshipRecord, IndexingStatus, PersistenceGateway,
    PullRequestReviewRecord, RepositoryRecord, SimilarCodeHit,
};
pub use record::{RagFilter, RagHit, RagQuery, RagRecord};

use tracing::{debug, info};

/// Thin facade over Qdrant vector search and free-text RAG context building.
/// Kept separate from [`PersistenceGateway`]: this is read-only retrieval
/// against one collection, the gateway owns writes across several.
pub struct RagStore {
    cfg: RagConfig,
    client: qdrant_facade::QdrantFacade,
}

impl RagStore {
    /// Constructs a new store from the given configuration.
    ///
    /// # Errors
    /// Returns `RagError::Config` if the client initialization fails.
    pub fn new(cfg: RagConfig) -> Result<Self, RagError> {
        info!("RagStore::new collection={}", cfg.collection);
        let client = qdrant_facade::QdrantFacade::new(&cfg)?;
        Ok(Self { cfg, client })
    }

    /// Performs a low-level vector search and returns `(score, payload)` tuples.
    ///
    /// # Errors
    /// Returns `RagError::Qdrant` if search fails.
    pub async fn search_by_vector(
        &self,
        query_vector: Vec<f32>,
        top_k: u64,
        filter: Option<RagFilter>,
        with_payload: bool,
    ) -> Result<Vec<(f32, serde_json::Value)>, RagError> {
        debug!(
            "RagStore::search_by_vector top_k={} with_payload={}",
            top_k, with_payload
        );
        let qfilter = filter.as_ref().map(filters::to_qdrant_filter);
        retrieve::search_by_vector(
            &self.cfg,
            &self.client,
            query_vector,
            top_k,
            qfilter,
            with_payload,
            self.cfg.exact_search,
        )
        .await
    }

    /// Builds RAG context for a textual query using the provided embedding provider.
    ///
    /// # Errors
    /// Returns embedding errors or Qdrant failures.
    pub async fn rag_context(
        &self,
        query: RagQuery<'_>,
        provider: &dyn EmbeddingsProvider,
    ) -> Result<Vec<RagHit>, RagError> {
        debug!("RagStore::rag_context top_k={}", query.top_k);
        retrieve::rag_context(&self.cfg, &self.client, query, provider).await
    }
}
