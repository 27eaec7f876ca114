//! The four context levels and their combination into one ranked list.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use rag_store::gateway::PersistenceGateway;
use rag_store::EmbeddingsProvider;

use crate::error::ContextorError;
use crate::fetch::{slice_lines, FileFetcher};
use crate::graph;

/// A hunk of changed lines in one file, as produced by the diff analyzer.
#[derive(Debug, Clone)]
pub struct ChangedRegion {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// One piece of retrieved context, ready to be dropped into a prompt.
#[derive(Debug, Clone)]
pub struct CodeContext {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub symbol_name: Option<String>,
    pub chunk_type: Option<String>,
    pub code: String,
    pub relevance_reasons: Vec<String>,
    pub complexity: u32,
    pub change_frequency: f64,
    pub dependent_count: usize,
    pub level: u8,
    pub score: f64,
}

impl CodeContext {
    fn key(&self) -> (String, u32, u32) {
        (self.file_path.clone(), self.start_line, self.end_line)
    }

    fn non_empty_metadata_fields(&self) -> usize {
        let mut n = 0;
        if self.symbol_name.is_some() {
            n += 1;
        }
        if self.chunk_type.is_some() {
            n += 1;
        }
        if self.complexity > 0 {
            n += 1;
        }
        if self.change_frequency > 0.0 {
            n += 1;
        }
        n
    }

    fn compute_score(&mut self) {
        let mut score = 100.0 - 20.0 * f64::from(self.level);
        score += f64::from(self.complexity.min(10));
        score += 10.0 * self.change_frequency;
        score += (2 * self.dependent_count).min(10) as f64;
        score += match self.chunk_type.as_deref() {
            Some("function") | Some("method") => 5.0,
            Some("class") => 7.0,
            _ => 0.0,
        };
        self.score = score;
    }
}

async fn fetch_cached<'a>(
    fetcher: &'a dyn FileFetcher,
    cache: &mut HashMap<String, String>,
    path: &str,
) -> Result<String, ContextorError> {
    if let Some(text) = cache.get(path) {
        return Ok(text.clone());
    }
    let text = fetcher.fetch(path).await?;
    cache.insert(path.to_string(), text.clone());
    Ok(text)
}

fn value_u32(v: &Value, key: &str) -> u32 {
    v.get(key).and_then(Value::as_u64).unwrap_or(0) as u32
}

fn value_f64(v: &Value, key: &str) -> f64 {
    v.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn value_str(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Level 1: each changed hunk becomes a context piece with `changeFrequency=1.0`.
async fn direct_changes(
    fetcher: &dyn FileFetcher,
    cache: &mut HashMap<String, String>,
    changes: &[ChangedRegion],
) -> Result<Vec<CodeContext>, ContextorError> {
    let mut out = Vec::with_capacity(changes.len());
    for change in changes {
        let text = fetch_cached(fetcher, cache, &change.file_path).await?;
        let code = slice_lines(&text, change.start_line, change.end_line);
        out.push(CodeContext {
            file_path: change.file_path.clone(),
            start_line: change.start_line,
            end_line: change.end_line,
            symbol_name: None,
            chunk_type: None,
            code,
            relevance_reasons: vec!["direct change".to_string()],
            complexity: 0,
            change_frequency: 1.0,
            dependent_count: 0,
            level: 1,
            score: 0.0,
        });
    }
    Ok(out)
}

/// Level 2: chunks in a changed file whose span overlaps the change and
/// that carry a symbol name.
async fn affected_symbols(
    gateway: &PersistenceGateway,
    fetcher: &dyn FileFetcher,
    cache: &mut HashMap<String, String>,
    repository_id: &str,
    changes: &[ChangedRegion],
) -> Result<Vec<CodeContext>, ContextorError> {
    let mut out = Vec::new();
    let mut seen_files = Vec::new();
    for change in changes {
        if seen_files.contains(&change.file_path) {
            continue;
        }
        seen_files.push(change.file_path.clone());

        let rows = gateway
            .get_enhanced_chunk_metadata_for_file(repository_id, &change.file_path)
            .await?;
        let file_text = fetch_cached(fetcher, cache, &change.file_path).await?;

        for row in rows {
            let symbol_name = value_str(&row, "symbolName");
            if symbol_name.is_none() {
                continue;
            }
            let start_line = value_u32(&row, "startLine");
            let end_line = value_u32(&row, "endLine");
            let overlaps = changes.iter().any(|c| {
                c.file_path == change.file_path && start_line <= c.end_line && end_line >= c.start_line
            });
            if !overlaps {
                continue;
            }
            out.push(CodeContext {
                file_path: change.file_path.clone(),
                start_line,
                end_line,
                symbol_name,
                chunk_type: value_str(&row, "chunkType"),
                code: slice_lines(&file_text, start_line, end_line),
                relevance_reasons: vec!["affected symbol".to_string()],
                complexity: value_u32(&row, "complexity"),
                change_frequency: value_f64(&row, "changeFrequency"),
                dependent_count: 0,
                level: 2,
                score: 0.0,
            });
        }
    }
    Ok(out)
}

/// Level 3: one-hop dependencies and dependents of each level-2 symbol,
/// via a transient graph built from stored relationships.
async fn graph_neighbors(
    gateway: &PersistenceGateway,
    fetcher: &dyn FileFetcher,
    cache: &mut HashMap<String, String>,
    repository_id: &str,
    level2: &[CodeContext],
) -> Result<Vec<CodeContext>, ContextorError> {
    let relationships = gateway.get_relationships_for_repository(repository_id).await?;
    if relationships.is_empty() {
        return Ok(Vec::new());
    }
    let dep_graph = graph::build_graph(&relationships);

    let mut out = Vec::new();
    let mut visited_nodes = Vec::new();
    for piece in level2 {
        let Some(symbol) = &piece.symbol_name else {
            continue;
        };
        let node_id = codegraph_prep::graph::node_id(&piece.file_path, Some(symbol));
        let mut neighbors = dep_graph.find_dependencies(&node_id, 1);
        neighbors.extend(dep_graph.find_dependents(&node_id, 1));

        for neighbor_id in neighbors {
            if visited_nodes.contains(&neighbor_id) {
                continue;
            }
            visited_nodes.push(neighbor_id.clone());

            let Some((file_path, Some(neighbor_symbol))) = graph::split_node_id(&neighbor_id) else {
                continue;
            };
            let Some(meta) = gateway
                .get_symbol_metadata(repository_id, file_path, neighbor_symbol)
                .await?
            else {
                continue;
            };
            let start_line = value_u32(&meta, "startLine");
            let end_line = value_u32(&meta, "endLine");
            let text = fetch_cached(fetcher, cache, file_path).await?;
            let dependent_count = dep_graph.find_dependents(&neighbor_id, 1).len();

            out.push(CodeContext {
                file_path: file_path.to_string(),
                start_line,
                end_line,
                symbol_name: Some(neighbor_symbol.to_string()),
                chunk_type: value_str(&meta, "chunkType"),
                code: slice_lines(&text, start_line, end_line),
                relevance_reasons: vec!["graph neighbor".to_string()],
                complexity: value_u32(&meta, "complexity"),
                change_frequency: value_f64(&meta, "changeFrequency"),
                dependent_count,
                level: 3,
                score: 0.0,
            });
        }
    }
    Ok(out)
}

/// Level 4: semantic search on the top 5 non-empty level-1/2 pieces. Bodies
/// are fetched from the checked-out working copy, never from stored text.
async fn semantic_neighbors(
    gateway: &PersistenceGateway,
    embedder: &dyn EmbeddingsProvider,
    fetcher: &dyn FileFetcher,
    cache: &mut HashMap<String, String>,
    repository_id: &str,
    seeds: &[CodeContext],
) -> Result<Vec<CodeContext>, ContextorError> {
    let mut out = Vec::new();
    let candidates = seeds.iter().filter(|c| !c.code.trim().is_empty()).take(5);
    for seed in candidates {
        let embedding = embedder.embed(&seed.code).await?;
        let hits = gateway
            .search_semantic_similarity(embedding, repository_id, 5)
            .await?;
        for hit in hits {
            if hit.file_path == seed.file_path
                && hit.start_line == seed.start_line
                && hit.end_line == seed.end_line
            {
                continue;
            }
            let text = fetch_cached(fetcher, cache, &hit.file_path).await?;
            out.push(CodeContext {
                code: slice_lines(&text, hit.start_line, hit.end_line),
                file_path: hit.file_path,
                start_line: hit.start_line,
                end_line: hit.end_line,
                symbol_name: hit.symbol_name,
                chunk_type: Some(hit.chunk_type),
                relevance_reasons: vec![format!("semantic neighbor of {}", seed.file_path)],
                complexity: value_u32(&hit.metadata, "complexity"),
                change_frequency: value_f64(&hit.metadata, "changeFrequency"),
                dependent_count: 0,
                level: 4,
                score: 0.0,
            });
        }
    }
    Ok(out)
}

/// Runs all four levels, dedups, scores, and returns a descending-ranked list.
pub async fn build_context(
    gateway: &PersistenceGateway,
    embedder: &dyn EmbeddingsProvider,
    fetcher: &dyn FileFetcher,
    repository_id: &str,
    changes: &[ChangedRegion],
) -> Result<Vec<CodeContext>, ContextorError> {
    let mut cache = HashMap::new();

    let level1 = direct_changes(fetcher, &mut cache, changes).await?;
    let level2 = affected_symbols(gateway, fetcher, &mut cache, repository_id, changes).await?;
    let level3 = graph_neighbors(gateway, fetcher, &mut cache, repository_id, &level2).await?;

    let seeds: Vec<CodeContext> = level1.iter().chain(level2.iter()).cloned().collect();
    let level4 =
        semantic_neighbors(gateway, embedder, fetcher, &mut cache, repository_id, &seeds).await?;

    debug!(
        level1 = level1.len(),
        level2 = level2.len(),
        level3 = level3.len(),
        level4 = level4.len(),
        "context retriever levels"
    );

    let all = level1.into_iter().chain(level2).chain(level3).chain(level4);
    let mut combined: HashMap<(String, u32, u32), CodeContext> = HashMap::new();
    for mut piece in all {
        piece.compute_score();
        match combined.get_mut(&piece.key()) {
            Some(existing) => {
                for reason in piece.relevance_reasons {
                    if !existing.relevance_reasons.contains(&reason) {
                        existing.relevance_reasons.push(reason);
                    }
                }
                let better = piece.non_empty_metadata_fields() > existing.non_empty_metadata_fields()
                    || (piece.symbol_name.is_some() && existing.symbol_name.is_none());
                if better {
                    let reasons = existing.relevance_reasons.clone();
                    *existing = piece;
                    existing.relevance_reasons = reasons;
                }
            }
            None => {
                let key = piece.key();
                combined.insert(key, piece);
            }
        }
    }

    let mut result: Vec<CodeContext> = combined.into_values().collect();
    result.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(level: u8, complexity: u32, change_frequency: f64, dependents: usize, chunk_type: Option<&str>) -> CodeContext {
        CodeContext {
            file_path: "f.rs".into(),
            start_line: 1,
            end_line: 2,
            symbol_name: None,
            chunk_type: chunk_type.map(str::to_string),
            code: "x".into(),
            relevance_reasons: vec![],
            complexity,
            change_frequency,
            dependent_count: dependents,
            level,
            score: 0.0,
        }
    }

    #[test]
    fn score_decreases_with_level_and_rewards_complexity() {
        let mut a = piece(1, 0, 0.0, 0, None);
        let mut b = piece(2, 0, 0.0, 0, None);
        a.compute_score();
        b.compute_score();
        assert!(a.score > b.score);
    }

    #[test]
    fn score_caps_complexity_and_dependents_contributions() {
        let mut high = piece(1, 1000, 1.0, 1000, Some("class"));
        high.compute_score();
        // 80 (level) + 10 (complexity cap) + 10 (freq) + 10 (dependents cap) + 7 (class)
        assert_eq!(high.score, 117.0);
    }
}
