//! Review Orchestrator: the end-to-end pipeline for one pull/merge request
//! review.
//!
//! Loads the repository record, clones the PR head into a scoped temp
//! directory, retrieves context per changed file, asks the LLM analyzer,
//! corrects reported line numbers against the diff, turns findings into
//! draft comments, and returns them ready for posting. Runs keyed by
//! `${repositoryId}-${prNumber}-${commitSha}` for a short idempotency
//! window so retried triggers don't redo the work.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, warn};

use ai_llm_service::review_analyzer::{AnalyzerInput, ReviewAnalyzer};
use contextor::{build_context, ChangedRegion, ContextorError, FileFetcher};
use git_adapter::{clone_and_checkout, CloneOptions};
use rag_store::gateway::{IndexingStatus, PersistenceGateway, PullRequestReviewRecord};
use rag_store::EmbeddingsProvider;

use crate::comments::{self, DraftComment, ReviewEvent};
use crate::diff::{self, CorrectionConfig, DiffAnalysis};
use crate::errors::{Error, MrResult};
use crate::git_providers::types::FileChange;
use crate::git_providers::{ChangeRequestId, ProviderClient, ProviderConfig};

/// Static configuration for one orchestrator run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub repository_id: String,
    pub repo_url: String,
    pub max_comments_per_file: usize,
    pub skip_patterns: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            repository_id: String::new(),
            repo_url: String::new(),
            max_comments_per_file: 10,
            skip_patterns: vec![
                "**/*.lock".to_string(),
                "**/dist/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/target/**".to_string(),
            ],
        }
    }
}

/// Result of running the review pipeline for one commit, ready to hand to a
/// publisher.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub review_id: String,
    pub summary: String,
    pub drafts: Vec<DraftComment>,
    pub event: ReviewEvent,
}

struct IdempotencyEntry {
    outcome: Arc<ReviewOutcome>,
    inserted_at: Instant,
}

/// Caches outcomes for `${repositoryId}-${prNumber}-${commitSha}` so a
/// retried webhook delivery within the TTL window returns the same outcome
/// instead of re-running the pipeline and re-posting comments.
pub struct IdempotencyCache {
    entries: Mutex<std::collections::HashMap<String, IdempotencyEntry>>,
    ttl: Duration,
}

impl IdempotencyCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(std::collections::HashMap::new()),
            ttl: Duration::from_secs(300),
        }
    }

    fn get(&self, key: &str) -> Option<Arc<ReviewOutcome>> {
        let mut entries = self.entries.lock().expect("idempotency cache lock poisoned");
        if let Some(entry) = entries.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.outcome.clone());
            }
            entries.remove(key);
        }
        None
    }

    fn put(&self, key: String, outcome: Arc<ReviewOutcome>) {
        let mut entries = self.entries.lock().expect("idempotency cache lock poisoned");
        entries.insert(key, IdempotencyEntry { outcome, inserted_at: Instant::now() });
    }
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads file contents from a checked-out working copy on disk.
struct WorkingCopyFetcher {
    root: PathBuf,
}

impl FileFetcher for WorkingCopyFetcher {
    fn fetch<'a>(
        &'a self,
        file_path: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<String, ContextorError>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.root.join(file_path);
            let bytes = tokio::fs::read(&path).await?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        })
    }
}

struct ProcessedFile {
    path: String,
    file: FileChange,
    analysis: DiffAnalysis,
}

/// Translates a glob (`**`, `*`, `?`) into an anchored regex, per the
/// conventional translation `** -> .*`, `* -> [^/]*`, `? -> .`.
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

fn is_skipped(path: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|re| re.is_match(path))
}

/// Best-effort comment-line detector used only to steer the line-correction
/// policy away from landing a suggestion on a comment; not a real parser.
fn detect_comment_lines(content: &str) -> HashSet<u32> {
    let mut set = HashSet::new();
    let mut in_block = false;
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        let line_no = (idx + 1) as u32;
        if in_block {
            set.insert(line_no);
            if trimmed.contains("*/") {
                in_block = false;
            }
            continue;
        }
        if trimmed.starts_with("//") || trimmed.starts_with('#') || trimmed.starts_with("--") {
            set.insert(line_no);
        } else if trimmed.starts_with("/*") {
            set.insert(line_no);
            in_block = !trimmed.contains("*/");
        }
    }
    set
}

fn language_label(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "text".to_string())
}

/// Renders the line-numbered, position-annotated view of a file the LLM
/// analyzer reads: each commentable line carries its diff `position` and a
/// marker (`+` added, `#` comment, ` ` unchanged-but-in-diff). Lines outside
/// the diff's valid range are omitted to keep the prompt focused.
fn annotate_file(content: &str, analysis: &DiffAnalysis, comment_lines: &HashSet<u32>) -> String {
    let mut out = String::new();
    for (idx, line_text) in content.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        if !analysis.valid_diff_lines.contains(&line_no) {
            continue;
        }
        let marker = if analysis.added_lines.contains(&line_no) {
            '+'
        } else if comment_lines.contains(&line_no) {
            '#'
        } else {
            ' '
        };
        let position = analysis
            .position_for_line(line_no)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("{line_no:>5} [pos {position:>4}] {marker} {line_text}\n"));
    }
    out
}

/// Runs steps 1-7 of the review pipeline for one pull/merge request and
/// returns the accumulated draft comments, summary, and escalation event.
/// Posting (step 8) is left to the caller's publisher, since that is where
/// the provider-specific comment model (GitHub position vs. GitLab line)
/// actually differs.
pub async fn run_pr_review(
    provider_cfg: ProviderConfig,
    id: ChangeRequestId,
    cfg: OrchestratorConfig,
    gateway: &PersistenceGateway,
    embedder: &dyn EmbeddingsProvider,
    analyzer: &ReviewAnalyzer,
    idempotency: &IdempotencyCache,
) -> MrResult<Arc<ReviewOutcome>> {
    let provider = ProviderClient::from_config(provider_cfg.clone())?;

    // Step 1: load the repository record; reviewing an unindexed repository
    // is a validation error, not a silent degrade.
    let repo = gateway
        .get_repository_with_string_id(&cfg.repository_id)
        .await
        .map_err(|e| Error::Other(e.to_string()))?
        .ok_or_else(|| Error::Validation(format!("repository {} is not indexed", cfg.repository_id)))?;

    let meta = provider.fetch_meta(&id).await?;
    let commit_sha = meta.diff_refs.head_sha.clone();
    let idem_key = format!("{}-{}-{}", cfg.repository_id, id.iid, commit_sha);

    if let Some(cached) = idempotency.get(&idem_key) {
        info!(key = idem_key, "review outcome served from idempotency cache");
        return Ok(cached);
    }

    // Step 2: probe embedding availability; informational only, context
    // retrieval degrades gracefully (fewer hits) rather than failing.
    if repo.status != IndexingStatus::Completed {
        warn!(
            repository = %cfg.repository_id,
            status = ?repo.status,
            "repository is not fully indexed; context retrieval may be sparse"
        );
    }

    // Step 3: create the persistent review record up front so the review is
    // durably recorded even if later steps fail.
    let review_id = gateway
        .create_pull_request_review(PullRequestReviewRecord {
            repository_id: cfg.repository_id.clone(),
            pr_number: id.iid,
            commit_sha: commit_sha.clone(),
            summary: String::new(),
            issue_count: 0,
        })
        .await
        .map_err(|e| Error::Other(e.to_string()))?;

    // Step 4: clone + checkout the head commit into a scoped temp dir.
    // `cloned` removes the directory on drop, on every exit path.
    let cloned = clone_and_checkout(CloneOptions {
        repo_url: cfg.repo_url.clone(),
        token: Some(provider_cfg.token.clone()),
        commit_sha: commit_sha.clone(),
        shallow: true,
    })
    .await
    .map_err(|e| Error::Other(e.to_string()))?;

    // Step 5: commit list is informational (audit trail / prompt framing).
    let commits = provider.fetch_commits(&id).await?;
    debug!(commits = commits.len(), "fetched commit list");

    // Step 6: fetch + (if needed) enrich the changeset, then build one
    // `DiffAnalysis` per file and drop files with no commentable lines.
    let mut changes = provider.fetch_changes(&id).await?;
    if changes.is_truncated {
        if let Some(enriched) = provider.try_enrich_changes(&id).await? {
            changes = enriched;
        }
    }

    let skip_regexes: Vec<Regex> = cfg.skip_patterns.iter().map(|p| glob_to_regex(p)).collect();
    let fetcher = WorkingCopyFetcher { root: cloned.path().to_path_buf() };

    let mut processed = Vec::new();
    for file in &changes.files {
        if file.is_deleted || file.is_binary {
            continue;
        }
        let Some(path) = file.new_path.clone().or_else(|| file.old_path.clone()) else {
            continue;
        };
        if is_skipped(&path, &skip_regexes) {
            debug!(file = %path, "skipped by skip pattern");
            continue;
        }
        let analysis = diff::analyze(&file.hunks);
        if analysis.valid_diff_lines.is_empty() {
            continue;
        }
        processed.push(ProcessedFile { path, file: file.clone(), analysis });
    }

    // Step 7: per file — retrieve context, analyze, correct lines, convert
    // to draft comments.
    let mut all_drafts = Vec::new();
    let correction_cfg = CorrectionConfig::default();

    for pf in &processed {
        let content = match fetcher.fetch(&pf.path).await {
            Ok(c) => c,
            Err(err) => {
                warn!(file = %pf.path, error = %err, "failed to read file from working copy, skipping");
                continue;
            }
        };
        let total_lines = content.lines().count() as u32;
        let comment_lines = detect_comment_lines(&content);
        let annotated = annotate_file(&content, &pf.analysis, &comment_lines);
        let language = language_label(&pf.path);
        let patch = pf.file.raw_unidiff.clone().unwrap_or_default();

        let changed_regions: Vec<ChangedRegion> = pf
            .analysis
            .changed_lines
            .iter()
            .map(|&line| ChangedRegion { file_path: pf.path.clone(), start_line: line, end_line: line })
            .collect();
        let context = build_context(gateway, embedder, &fetcher, &cfg.repository_id, &changed_regions)
            .await
            .unwrap_or_else(|err| {
                warn!(file = %pf.path, error = %err, "context retrieval failed, proceeding without it");
                Vec::new()
            });
        let similar_snippets: Vec<String> = context.into_iter().map(|c| c.code).collect();

        let result = analyzer
            .analyze(AnalyzerInput {
                file_path: &pf.path,
                language: &language,
                annotated_content: &annotated,
                original_content: &content,
                patch: &patch,
                similar_snippets: &similar_snippets,
            })
            .await;

        for mut finding in result.issues {
            let Some(corrected) =
                diff::correct_line(&pf.analysis, total_lines, &comment_lines, finding.line, &correction_cfg)
            else {
                continue;
            };
            finding.line = corrected;
            if let Some(draft) = comments::to_draft(&pf.path, &finding, &pf.analysis) {
                all_drafts.push(draft);
            }
        }
    }

    let all_drafts = comments::cap_per_file(all_drafts, cfg.max_comments_per_file);
    let event = comments::choose_event(&all_drafts);
    let summary = comments::build_summary(&all_drafts);

    let outcome = Arc::new(ReviewOutcome { review_id, summary, drafts: all_drafts, event });
    idempotency.put(idem_key, outcome.clone());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_translates_double_star_to_any_depth() {
        let re = glob_to_regex("**/node_modules/**");
        assert!(re.is_match("a/b/node_modules/x.js"));
        assert!(re.is_match("node_modules/x.js"));
    }

    #[test]
    fn glob_single_star_does_not_cross_path_separators() {
        let re = glob_to_regex("src/*.rs");
        assert!(re.is_match("src/lib.rs"));
        assert!(!re.is_match("src/nested/lib.rs"));
    }

    #[test]
    fn comment_lines_detect_line_and_block_comments() {
        let content = "fn a() {}\n// a comment\n/* block\nstill in block */\nfn b() {}\n";
        let lines = detect_comment_lines(content);
        assert!(lines.contains(&2));
        assert!(lines.contains(&3));
        assert!(lines.contains(&4));
        assert!(!lines.contains(&1));
        assert!(!lines.contains(&5));
    }

    #[test]
    fn idempotency_cache_returns_cached_outcome_within_ttl() {
        let cache = IdempotencyCache::new();
        let outcome = Arc::new(ReviewOutcome {
            review_id: "r1".into(),
            summary: "ok".into(),
            drafts: Vec::new(),
            event: ReviewEvent::Comment,
        });
        cache.put("k".to_string(), outcome.clone());
        let got = cache.get("k").expect("entry present within ttl");
        assert_eq!(got.review_id, "r1");
    }
}
