//! Persistence Gateway: the stateless operations the indexing and review
//! pipelines use to talk to the external database — store a chunk's
//! embedding, store a relationship, search similar code, fetch metadata,
//! and the small amount of per-repository / per-review bookkeeping the spec
//! expects a "database gateway" to expose.
//!
//! Everything here is backed by Qdrant collections (one for chunks, one for
//! relationships, one for repository state, one for PR reviews) since Qdrant
//! is the only datastore this stack carries; relationship/repository/review
//! points use a single-dimensional placeholder vector because Qdrant
//! requires every point to carry one, but are never searched by similarity.

use std::collections::HashMap;

use qdrant_client::qdrant::{point_id, vectors, Condition, Filter, PointId, PointStruct, Vector, Vectors};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{DistanceKind, RagConfig, VectorSpace};
use crate::errors::RagError;
use crate::filters::to_qdrant_filter;
use crate::qdrant_facade::{json_object_to_payload, QdrantFacade};
use crate::record::RagFilter;

const RELATIONSHIPS_SUFFIX: &str = "_relationships";
const REPOSITORIES_SUFFIX: &str = "_repositories";
const REVIEWS_SUFFIX: &str = "_reviews";
const PLACEHOLDER_VECTOR: [f32; 1] = [0.0];

/// Metadata persisted alongside a chunk's embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub repository_id: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub language: String,
    pub chunk_type: String,
    pub symbol_name: Option<String>,
    pub semantic_type: Option<String>,
    pub tags: Vec<String>,
    pub commit_sha: String,
    /// Cognitive complexity of the chunk (0 for file-level/import chunks).
    pub complexity: u32,
    /// Deterministic stand-in for VCS-history change frequency, `[0, 1]`.
    pub change_frequency: f64,
}

/// A row of `searchSimilarCode`/`searchSemanticSimilarity` results.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarCodeHit {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub symbol_name: Option<String>,
    pub chunk_type: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRelationshipRecord {
    pub repository_id: String,
    pub relationship_type: String,
    pub source: String,
    pub target: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingStatus {
    Pending,
    Indexing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRecord {
    pub id: String,
    pub status: IndexingStatus,
    pub last_indexed_commit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestReviewRecord {
    pub repository_id: String,
    pub pr_number: u64,
    pub commit_sha: String,
    pub summary: String,
    pub issue_count: usize,
}

pub struct PersistenceGateway {
    chunks: QdrantFacade,
    relationships: QdrantFacade,
    repositories: QdrantFacade,
    reviews: QdrantFacade,
}

impl PersistenceGateway {
    /// Builds the gateway's four facades from one base config; each points
    /// at a sibling collection derived from `cfg.collection`.
    pub fn new(cfg: &RagConfig) -> Result<Self, RagError> {
        Ok(Self {
            chunks: QdrantFacade::new(cfg)?,
            relationships: QdrantFacade::new(&derived(cfg, RELATIONSHIPS_SUFFIX))?,
            repositories: QdrantFacade::new(&derived(cfg, REPOSITORIES_SUFFIX))?,
            reviews: QdrantFacade::new(&derived(cfg, REVIEWS_SUFFIX))?,
        })
    }

    pub async fn ensure_collections(&self, embedding_dim: usize, distance: DistanceKind) -> Result<(), RagError> {
        self.chunks
            .ensure_collection(&VectorSpace { size: embedding_dim, distance })
            .await?;
        self.relationships
            .ensure_collection(&VectorSpace { size: 1, distance })
            .await?;
        self.repositories
            .ensure_collection(&VectorSpace { size: 1, distance })
            .await?;
        self.reviews
            .ensure_collection(&VectorSpace { size: 1, distance })
            .await?;
        Ok(())
    }

    /// Persists one chunk's embedding + metadata under `id` (expected to be
    /// the caller's deterministic chunk id, overwriting any prior version).
    pub async fn store_embedding(
        &self,
        id: &str,
        metadata: ChunkMetadata,
        embedding: Vec<f32>,
    ) -> Result<(), RagError> {
        debug!(id, file = %metadata.file_path, "store_embedding");
        let payload = metadata_payload(&metadata);
        let point = PointStruct {
            id: Some(string_point_id(id)),
            payload,
            vectors: Some(vector_of(embedding)),
            ..Default::default()
        };
        self.chunks.upsert_points(vec![point]).await?;
        Ok(())
    }

    /// Persists one code relationship under `id` (caller's deterministic
    /// relationship id).
    pub async fn store_code_relationship(
        &self,
        id: &str,
        rel: CodeRelationshipRecord,
    ) -> Result<(), RagError> {
        debug!(id, source = %rel.source, target = %rel.target, "store_code_relationship");
        let json = serde_json::to_value(&rel).map_err(|e| RagError::Parse(e.to_string()))?;
        let payload = json_object_to_payload(json.as_object().expect("struct serializes to an object"));
        let point = PointStruct {
            id: Some(string_point_id(id)),
            payload,
            vectors: Some(vector_of(PLACEHOLDER_VECTOR.to_vec())),
            ..Default::default()
        };
        self.relationships.upsert_points(vec![point]).await?;
        Ok(())
    }

    /// Vector similarity search over stored chunks, optionally narrowed by
    /// repository and/or language.
    pub async fn search_similar_code(
        &self,
        embedding: Vec<f32>,
        repository_id: Option<&str>,
        language: Option<&str>,
        limit: u64,
    ) -> Result<Vec<SimilarCodeHit>, RagError> {
        let filter = code_filter(repository_id, language, None);
        let hits = self
            .chunks
            .search(embedding, limit, filter, true, false)
            .await?;
        Ok(hits.into_iter().map(|(_, payload)| hit_from_payload(payload)).collect())
    }

    /// Same shape as `search_similar_code`, used by the context retriever's
    /// semantic-neighbor level; kept distinct so callers can reason about
    /// the two call sites the spec names separately.
    pub async fn search_semantic_similarity(
        &self,
        embedding: Vec<f32>,
        repository_id: &str,
        limit: u64,
    ) -> Result<Vec<SimilarCodeHit>, RagError> {
        self.search_similar_code(embedding, Some(repository_id), None, limit).await
    }

    /// All enhanced-chunk metadata rows for one file (no vector involved,
    /// a filtered scroll).
    pub async fn get_enhanced_chunk_metadata_for_file(
        &self,
        repository_id: &str,
        file_path: &str,
    ) -> Result<Vec<Value>, RagError> {
        let filter = code_filter(Some(repository_id), None, Some(file_path));
        self.chunks.scroll(filter.expect("built from Some fields"), 1000).await
    }

    /// Metadata for a single symbol within a file.
    pub async fn get_symbol_metadata(
        &self,
        repository_id: &str,
        file_path: &str,
        symbol_name: &str,
    ) -> Result<Option<Value>, RagError> {
        let rows = self.get_enhanced_chunk_metadata_for_file(repository_id, file_path).await?;
        Ok(rows.into_iter().find(|row| {
            row.get("symbolName").and_then(Value::as_str) == Some(symbol_name)
        }))
    }

    /// Marks a repository's indexing status, creating the bookkeeping point
    /// if it didn't exist yet.
    pub async fn update_indexing_status(
        &self,
        repository_id: &str,
        status: IndexingStatus,
    ) -> Result<(), RagError> {
        let mut record = self
            .get_repository_with_string_id(repository_id)
            .await?
            .unwrap_or_else(|| RepositoryRecord {
                id: repository_id.to_string(),
                status,
                last_indexed_commit: None,
            });
        record.status = status;
        self.put_repository(&record).await
    }

    /// Records the commit a repository was last fully indexed at.
    pub async fn update_last_indexed_commit(
        &self,
        repository_id: &str,
        commit_sha: &str,
    ) -> Result<(), RagError> {
        let mut record = self
            .get_repository_with_string_id(repository_id)
            .await?
            .unwrap_or_else(|| RepositoryRecord {
                id: repository_id.to_string(),
                status: IndexingStatus::Completed,
                last_indexed_commit: None,
            });
        record.last_indexed_commit = Some(commit_sha.to_string());
        self.put_repository(&record).await
    }

    pub async fn get_repository_with_string_id(
        &self,
        repository_id: &str,
    ) -> Result<Option<RepositoryRecord>, RagError> {
        let filter = Filter {
            must: vec![Condition {
                condition_one_of: Some(qdrant_client::qdrant::condition::ConditionOneOf::Field(
                    qdrant_client::qdrant::FieldCondition {
                        key: "id".to_string(),
                        r#match: Some(qdrant_client::qdrant::Match {
                            match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(
                                repository_id.to_string(),
                            )),
                        }),
                        ..Default::default()
                    },
                )),
            }],
            ..Default::default()
        };
        let rows = self.repositories.scroll(filter, 1).await?;
        rows.into_iter()
            .next()
            .map(|v| serde_json::from_value(v).map_err(|e| RagError::Parse(e.to_string())))
            .transpose()
    }

    async fn put_repository(&self, record: &RepositoryRecord) -> Result<(), RagError> {
        let json = serde_json::to_value(record).map_err(|e| RagError::Parse(e.to_string()))?;
        let payload = json_object_to_payload(json.as_object().expect("struct serializes to an object"));
        let point = PointStruct {
            id: Some(string_point_id(&record.id)),
            payload,
            vectors: Some(vector_of(PLACEHOLDER_VECTOR.to_vec())),
            ..Default::default()
        };
        self.repositories.upsert_points(vec![point]).await?;
        Ok(())
    }

    /// Creates a PR review record and returns its generated id.
    pub async fn create_pull_request_review(
        &self,
        review: PullRequestReviewRecord,
    ) -> Result<String, RagError> {
        let id = format!(
            "{}-{}-{}",
            review.repository_id, review.pr_number, review.commit_sha
        );
        info!(id, "create_pull_request_review");
        let json = serde_json::to_value(&review).map_err(|e| RagError::Parse(e.to_string()))?;
        let mut obj = json.as_object().cloned().expect("struct serializes to an object");
        obj.insert("id".to_string(), Value::String(id.clone()));
        let payload = json_object_to_payload(&obj);
        let point = PointStruct {
            id: Some(string_point_id(&id)),
            payload,
            vectors: Some(vector_of(PLACEHOLDER_VECTOR.to_vec())),
            ..Default::default()
        };
        self.reviews.upsert_points(vec![point]).await?;
        Ok(id)
    }

    /// All relationship rows for a repository, used by the context
    /// retriever to rebuild a transient dependency graph in-process.
    pub async fn get_relationships_for_repository(
        &self,
        repository_id: &str,
    ) -> Result<Vec<CodeRelationshipRecord>, RagError> {
        let filter = Filter {
            must: vec![Condition {
                condition_one_of: Some(qdrant_client::qdrant::condition::ConditionOneOf::Field(
                    qdrant_client::qdrant::FieldCondition {
                        key: "repositoryId".to_string(),
                        r#match: Some(qdrant_client::qdrant::Match {
                            match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(
                                repository_id.to_string(),
                            )),
                        }),
                        ..Default::default()
                    },
                )),
            }],
            ..Default::default()
        };
        let rows = self.relationships.scroll(filter, 10_000).await?;
        rows.into_iter()
            .map(|v| serde_json::from_value(v).map_err(|e| RagError::Parse(e.to_string())))
            .collect()
    }

    /// Deletes every stored chunk/relationship under `repository_id` whose
    /// `filePath` is in `paths`. Called for `filesToDelete` on incremental
    /// indexing runs — this is the operation the source left commented out;
    /// the spec requires it actually run.
    pub async fn delete_embeddings_by_path_batch(
        &self,
        repository_id: &str,
        paths: &[String],
    ) -> Result<(), RagError> {
        info!(repository_id, count = paths.len(), "delete_embeddings_by_path_batch");
        for path in paths {
            let filter = code_filter(Some(repository_id), None, Some(path))
                .expect("built from Some fields");
            self.chunks.delete_by_filter(filter.clone()).await?;
            self.relationships.delete_by_filter(filter).await?;
        }
        Ok(())
    }
}

fn derived(cfg: &RagConfig, suffix: &str) -> RagConfig {
    let mut out = cfg.clone();
    out.collection = format!("{}{suffix}", cfg.collection);
    out
}

fn string_point_id(id: &str) -> PointId {
    PointId {
        point_id_options: Some(point_id::PointIdOptions::Uuid(id.to_string())),
    }
}

fn vector_of(data: Vec<f32>) -> Vectors {
    Vectors {
        vectors_options: Some(vectors::VectorsOptions::Vector(Vector {
            data,
            ..Default::default()
        })),
    }
}

fn metadata_payload(metadata: &ChunkMetadata) -> HashMap<String, qdrant_client::qdrant::Value> {
    let json = serde_json::to_value(metadata).expect("ChunkMetadata always serializes");
    json_object_to_payload(json.as_object().expect("struct serializes to an object"))
}

fn code_filter(repository_id: Option<&str>, language: Option<&str>, file_path: Option<&str>) -> Option<Filter> {
    let mut parts = Vec::new();
    if let Some(id) = repository_id {
        parts.push(RagFilter::ByFieldEq {
            key: "repositoryId".to_string(),
            value: Value::String(id.to_string()),
        });
    }
    if let Some(lang) = language {
        parts.push(RagFilter::ByFieldEq {
            key: "language".to_string(),
            value: Value::String(lang.to_string()),
        });
    }
    if let Some(path) = file_path {
        parts.push(RagFilter::ByFieldEq {
            key: "filePath".to_string(),
            value: Value::String(path.to_string()),
        });
    }
    if parts.is_empty() {
        None
    } else {
        Some(to_qdrant_filter(&RagFilter::And(parts)))
    }
}

fn hit_from_payload(payload: Value) -> SimilarCodeHit {
    SimilarCodeHit {
        file_path: payload
            .get("filePath")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        start_line: payload
            .get("startLine")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        end_line: payload.get("endLine").and_then(Value::as_u64).unwrap_or(0) as u32,
        symbol_name: payload
            .get("symbolName")
            .and_then(Value::as_str)
            .map(|s| s.to_string()),
        chunk_type: payload
            .get("chunkType")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        metadata: payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_from_payload_reads_known_fields() {
        let payload = serde_json::json!({
            "filePath": "src/lib.rs",
            "startLine": 10,
            "endLine": 20,
            "symbolName": "run",
            "chunkType": "function",
        });
        let hit = hit_from_payload(payload);
        assert_eq!(hit.file_path, "src/lib.rs");
        assert_eq!(hit.start_line, 10);
        assert_eq!(hit.symbol_name.as_deref(), Some("run"));
    }

    #[test]
    fn derived_collection_names_are_namespaced() {
        let cfg = RagConfig {
            qdrant_url: "http://localhost:6334".into(),
            qdrant_api_key: None,
            collection: "code_chunks".into(),
            distance: DistanceKind::Cosine,
            upsert_batch: 64,
            exact_search: false,
            embedding_dim: None,
            embedding_concurrency: None,
        };
        assert_eq!(derived(&cfg, RELATIONSHIPS_SUFFIX).collection, "code_chunks_relationships");
    }
}
