//! Indexing Orchestrator: clones a repository at a commit, chunks every
//! file that needs (re)indexing, extracts relationships, embeds the
//! chunks, and persists everything through the database gateway.
//!
//! Initial jobs enumerate the whole tree; incremental jobs diff against
//! the previous commit and only touch what changed, deleting embeddings
//! for files the diff reports removed. A failed diff (e.g. the previous
//! commit is gone from history) falls back to a full initial pass rather
//! than failing the job outright.

pub mod errors;

use std::path::Path;

use futures::stream::{self, StreamExt};
use regex::Regex;
use tracing::{debug, error, info, warn};

use codegraph_prep::chunker::SupportedLanguage;
use codegraph_prep::graph::{node_id, DependencyGraph};
use codegraph_prep::{chunker::TreeChunker, ids, metrics, relationships};
use git_adapter::{
    clone_and_checkout, diff_summary, head_commit, resolve_parent_commit, CloneOptions,
    FileChangeKind,
};
use rag_store::gateway::{ChunkMetadata, CodeRelationshipRecord, IndexingStatus, PersistenceGateway};
use rag_store::EmbeddingsProvider;

use errors::{IndexingError, Result};

const MAX_FILE_BYTES: u64 = 1_048_576;
const BATCH_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingKind {
    Initial,
    Incremental,
}

#[derive(Debug, Clone)]
pub struct IndexingConfig {
    pub repository_id: String,
    pub repo_url: String,
    pub token: Option<String>,
    pub skip_patterns: Vec<String>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            repository_id: String::new(),
            repo_url: String::new(),
            token: None,
            skip_patterns: vec![
                "**/.git/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/dist/**".to_string(),
                "**/target/**".to_string(),
                "**/*.lock".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexingOutcome {
    pub files_processed: usize,
    pub files_deleted: usize,
    pub commit_sha: String,
}

fn glob_to_regex(pattern: &str) -> Regex {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push('.'),
            '.' | '+' | '^' | '$' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    Regex::new(&out).unwrap_or_else(|_| Regex::new("$.^").expect("static pattern never matches"))
}

/// True when a path should be fed into the chunk/embed pipeline: its
/// extension is one the tree chunker understands, and it doesn't match any
/// configured skip pattern.
fn should_process_file(path: &str, skip: &[Regex]) -> bool {
    let supported = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(SupportedLanguage::from_extension)
        .is_some();
    supported && !skip.iter().any(|re| re.is_match(path))
}

fn list_all_files(root: &Path) -> Vec<String> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect()
}

enum Selection {
    Process(Vec<String>),
    ProcessAndDelete(Vec<String>, Vec<String>),
}

async fn select_files(
    cloned: &git_adapter::ClonedRepo,
    kind: IndexingKind,
    before_sha: Option<&str>,
    head_sha: &str,
    skip: &[Regex],
) -> Selection {
    if kind == IndexingKind::Incremental {
        if let Some(before) = before_sha {
            match diff_summary(cloned, before, head_sha).await {
                Ok(entries) => {
                    let mut to_process = Vec::new();
                    let mut to_delete = Vec::new();
                    for entry in entries {
                        match entry.kind {
                            FileChangeKind::Deleted => to_delete.push(entry.path),
                            _ => {
                                if should_process_file(&entry.path, skip) {
                                    to_process.push(entry.path);
                                }
                            }
                        }
                    }
                    return Selection::ProcessAndDelete(to_process, to_delete);
                }
                Err(err) => {
                    warn!(error = %err, "diff summary failed, falling back to full enumeration");
                }
            }
        }
    }

    let all = list_all_files(cloned.path())
        .into_iter()
        .filter(|p| should_process_file(p, skip))
        .collect();
    Selection::Process(all)
}

/// Chunks, extracts relationships for, and embeds one file. Returns `Ok(())`
/// on success; per-file failures are the caller's responsibility to log and
/// skip, never to propagate out of the batch.
async fn process_file(
    repository_id: &str,
    commit_sha: &str,
    root: &Path,
    relative_path: &str,
    gateway: &PersistenceGateway,
    embedder: &dyn EmbeddingsProvider,
) -> Result<()> {
    let full_path = root.join(relative_path);
    let meta = tokio::fs::metadata(&full_path).await?;
    if meta.len() > MAX_FILE_BYTES {
        debug!(file = relative_path, size = meta.len(), "file exceeds 1 MiB, skipping");
        return Ok(());
    }

    let Some(language) = Path::new(relative_path)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(SupportedLanguage::from_extension)
    else {
        return Ok(());
    };

    let source = tokio::fs::read_to_string(&full_path).await?;

    let mut chunker = TreeChunker::new(language).map_err(|e| {
        warn!(file = relative_path, error = %e, "tree-sitter setup failed");
        IndexingError::Io(std::io::Error::other(e.to_string()))
    })?;
    let tree = match chunker.parse(&source, relative_path) {
        Ok(t) => t,
        Err(e) => {
            warn!(file = relative_path, error = %e, "parse failed, skipping file");
            return Ok(());
        }
    };
    let chunks = match chunker.chunk_tree(&tree, &source, relative_path, repository_id) {
        Ok(c) => c,
        Err(e) => {
            warn!(file = relative_path, error = %e, "chunking failed, skipping file");
            return Ok(());
        }
    };

    let file_relationships = relationships::extract_relationships(&tree, &source, relative_path);

    for rel in &file_relationships {
        let id = ids::relationship_id(&rel.source, &rel.target, rel.relationship_type.as_str());
        gateway
            .store_code_relationship(
                &id,
                CodeRelationshipRecord {
                    repository_id: repository_id.to_string(),
                    relationship_type: rel.relationship_type.as_str().to_string(),
                    source: rel.source.clone(),
                    target: rel.target.clone(),
                    file_path: relative_path.to_string(),
                    start_line: rel.location.start_line as u32,
                    end_line: rel.location.end_line as u32,
                },
            )
            .await?;
    }

    let mut graph = DependencyGraph::new();
    for rel in &file_relationships {
        graph.add_edge(&rel.source, &rel.target, rel.relationship_type, 1);
    }

    for chunk in chunks {
        let node = node_id(&chunk.file_path, chunk.symbol_name.as_deref());
        let dependency_count = graph.edges_from(&node).count();
        let dependent_count = graph.find_dependents(&node, 1).len();

        let complexity = metrics::complexity_metrics(&chunk.content);
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
            language: chunk.language.as_str(),
            symbol_name: chunk.symbol_name.as_deref(),
            metrics: &complexity,
            semantic_type,
            dependency_count,
            dependent_count,
            line_count: chunk.span.line_count(),
        });

        let Some(embedded) =
            rag_store::embed_file_text(embedder, &chunk.file_path, &chunk.content).await?
        else {
            continue;
        };

        let base_id = ids::chunk_id(repository_id, &chunk.file_path, chunk.span.start_byte, chunk.span.end_byte);
        for piece in embedded {
            let id = match piece.chunk_index {
                Some(idx) => format!("{base_id}-{idx}"),
                None => base_id.clone(),
            };
            let chunk_metadata = ChunkMetadata {
                repository_id: repository_id.to_string(),
                file_path: chunk.file_path.clone(),
                start_line: chunk.span.start_line as u32,
                end_line: chunk.span.end_line as u32,
                language: chunk.language.clone(),
                chunk_type: chunk.chunk_type.as_str().to_string(),
                symbol_name: chunk.symbol_name.clone(),
                semantic_type: Some(semantic_type.as_str().to_string()),
                tags: tags.clone(),
                commit_sha: commit_sha.to_string(),
                complexity: complexity.cognitive,
                change_frequency,
            };
            gateway.store_embedding(&id, chunk_metadata, piece.vector).await?;
        }
    }

    Ok(())
}

/// Runs one indexing job end to end. The clone directory is always removed
/// on return, success or failure, since `ClonedRepo`'s `Drop` fires when it
/// goes out of scope at the end of this function.
pub async fn run_indexing(
    cfg: IndexingConfig,
    kind: IndexingKind,
    gateway: &PersistenceGateway,
    embedder: &dyn EmbeddingsProvider,
) -> Result<IndexingOutcome> {
    info!(repository = %cfg.repository_id, kind = ?kind, "indexing job started");
    gateway
        .update_indexing_status(&cfg.repository_id, IndexingStatus::Pending)
        .await?;

    let result = run_indexing_inner(&cfg, kind, gateway, embedder).await;

    match &result {
        Ok(outcome) => {
            gateway
                .update_last_indexed_commit(&cfg.repository_id, &outcome.commit_sha)
                .await?;
            gateway
                .update_indexing_status(&cfg.repository_id, IndexingStatus::Completed)
                .await?;
        }
        Err(err) => {
            error!(repository = %cfg.repository_id, error = %err, "indexing job failed");
            gateway
                .update_indexing_status(&cfg.repository_id, IndexingStatus::Failed)
                .await?;
        }
    }

    result
}

async fn run_indexing_inner(
    cfg: &IndexingConfig,
    kind: IndexingKind,
    gateway: &PersistenceGateway,
    embedder: &dyn EmbeddingsProvider,
) -> Result<IndexingOutcome> {
    let shallow = kind == IndexingKind::Initial;
    let cloned = clone_and_checkout(CloneOptions {
        repo_url: cfg.repo_url.clone(),
        token: cfg.token.clone(),
        commit_sha: "HEAD".to_string(),
        shallow,
    })
    .await?;

    let head_sha = head_commit(&cloned).await?;
    let before_sha = if kind == IndexingKind::Incremental {
        resolve_parent_commit(&cloned, &head_sha).await?
    } else {
        None
    };

    let skip: Vec<Regex> = cfg.skip_patterns.iter().map(|p| glob_to_regex(p)).collect();
    let selection = select_files(&cloned, kind, before_sha.as_deref(), &head_sha, &skip).await;

    let (to_process, to_delete) = match selection {
        Selection::Process(files) => (files, Vec::new()),
        Selection::ProcessAndDelete(files, deleted) => (files, deleted),
    };

    if !to_delete.is_empty() {
        gateway
            .delete_embeddings_by_path_batch(&cfg.repository_id, &to_delete)
            .await?;
    }

    let root = cloned.path().to_path_buf();
    let repository_id = cfg.repository_id.clone();
    let results: Vec<(String, Result<()>)> = stream::iter(to_process.into_iter())
        .map(|path| {
            let root = root.clone();
            let repository_id = repository_id.clone();
            let head_sha = head_sha.clone();
            async move {
                let outcome = process_file(&repository_id, &head_sha, &root, &path, gateway, embedder).await;
                (path, outcome)
            }
        })
        .buffer_unordered(BATCH_SIZE)
        .collect()
        .await;

    let mut files_processed = 0usize;
    for (path, outcome) in &results {
        match outcome {
            Ok(()) => files_processed += 1,
            Err(err) => warn!(file = path, error = %err, "file indexing failed, continuing with siblings"),
        }
    }

    Ok(IndexingOutcome {
        files_processed,
        files_deleted: to_delete.len(),
        commit_sha: head_sha,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_process_file_honors_extension_and_skip_patterns() {
        let skip: Vec<Regex> = vec![glob_to_regex("**/node_modules/**"), glob_to_regex("**/*.lock")];
        assert!(should_process_file("src/lib.ts", &skip));
        assert!(!should_process_file("src/readme.md", &skip));
        assert!(!should_process_file("vendor/node_modules/pkg/index.js", &skip));
        assert!(!should_process_file("Cargo.lock", &skip));
    }

    #[test]
    fn glob_double_star_matches_any_depth() {
        let re = glob_to_regex("**/target/**");
        assert!(re.is_match("a/b/target/debug/out.o"));
        assert!(!re.is_match("a/btarget/debug/out.o"));
    }
}
