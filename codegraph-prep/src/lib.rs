//! AST parsing, chunking, relationship extraction, dependency graph and
//! code metrics — the non-network half of the indexing pipeline.

pub mod chunk;
pub mod chunker;
pub mod errors;
pub mod graph;
pub mod ids;
pub mod metrics;
pub mod relationship;
pub mod relationships;
pub mod span;

pub use chunk::{ChunkType, CodeChunk, ComplexityMetrics, EnhancedChunk, SemanticType};
pub use chunker::{SupportedLanguage, TreeChunker};
pub use errors::{ChunkerError, Result};
pub use graph::{DependencyEdge, DependencyGraph, DependencyNode};
pub use relationship::{CodeRelationship, RelationshipType};
pub use span::Span;

use std::path::Path;

/// Chunks one file, then runs the metrics pass over every resulting chunk.
/// `dependency_count`/`dependent_count` default to zero here — callers that
/// have already built the repository-wide dependency graph should call
/// `metrics::complexity_metrics`/`derive_tags` directly with real counts
/// once edges are known.
pub fn prepare_file(
    repository_id: &str,
    file_path: &str,
    source: &str,
    commit_sha: &str,
) -> Result<Vec<EnhancedChunk>> {
    let language = Path::new(file_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(SupportedLanguage::from_extension)
        .ok_or_else(|| ChunkerError::UnsupportedLanguage(file_path.to_string()))?;

    let mut chunker = TreeChunker::new(language)?;
    let chunks = chunker.chunk(source, file_path, repository_id)?;

    Ok(chunks
        .into_iter()
        .map(|chunk| enhance(chunk, commit_sha))
        .collect())
}

fn enhance(chunk: CodeChunk, commit_sha: &str) -> EnhancedChunk {
    let metrics = metrics::complexity_metrics(&chunk.content);
    let semantic_type =
        metrics::classify_semantic_type(chunk.chunk_type, chunk.symbol_name.as_deref(), &chunk.content);
    let change_frequency = ids::change_frequency(
        &chunk.repository_id,
        &chunk.file_path,
        chunk.span.start_line,
        chunk.span.end_line,
        commit_sha,
    );
    let tags = metrics::derive_tags(metrics::TagInputs {
        chunk_type: chunk.chunk_type,
        language: &chunk.language,
        symbol_name: chunk.symbol_name.as_deref(),
        metrics: &metrics,
        semantic_type,
        dependency_count: 0,
        dependent_count: 0,
        line_count: chunk.span.line_count(),
    });

    EnhancedChunk {
        chunk,
        metrics,
        semantic_type,
        change_frequency,
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_file_chunks_a_simple_typescript_file() {
        let source = "export function add(a: number, b: number): number {\n  return a + b;\n}\n";
        let chunks = prepare_file("repo-1", "src/add.ts", source, "deadbeef").unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().any(|c| c.chunk.symbol_name.as_deref() == Some("add")));
    }

    #[test]
    fn prepare_file_rejects_unsupported_extensions() {
        let err = prepare_file("repo-1", "src/main.py", "def f(): pass", "deadbeef").unwrap_err();
        assert!(matches!(err, ChunkerError::UnsupportedLanguage(_)));
    }
}
