//! Structured-output review analysis: turns an annotated diff + retrieved
//! context into a schema-validated list of findings, gated by a circuit
//! breaker and retried with exponential backoff plus jitter.
//!
//! Deliberately knows nothing about git providers or diff formats — it
//! takes plain strings/metadata so `mr-reviewer` can own the `ProcessedFile`
//! shape and just hand this module a prompt payload.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::circuit_breaker::{is_overload_error, CircuitBreaker};
use crate::service_profiles::LlmServiceProfiles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Bug,
    Performance,
    Maintainability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub line: u32,
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub issues: Vec<ReviewFinding>,
}

/// Everything the analyzer needs to build its prompt for one file.
pub struct AnalyzerInput<'a> {
    pub file_path: &'a str,
    pub language: &'a str,
    pub annotated_content: &'a str,
    pub original_content: &'a str,
    pub patch: &'a str,
    pub similar_snippets: &'a [String],
}

pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            jitter: true,
        }
    }
}

pub struct ReviewAnalyzer {
    llm: std::sync::Arc<LlmServiceProfiles>,
    breaker: CircuitBreaker,
    retry: RetryConfig,
}

impl ReviewAnalyzer {
    pub fn new(llm: std::sync::Arc<LlmServiceProfiles>) -> Self {
        Self {
            llm,
            breaker: CircuitBreaker::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Analyzes one file. Returns a sentinel, empty-issue summary if the
    /// circuit breaker is open or every retry is exhausted on
    /// overload-classified failures — callers should treat that as "skip
    /// this file", not as a hard error.
    pub async fn analyze(&self, input: AnalyzerInput<'_>) -> AnalysisResult {
        if !self.breaker.can_execute() {
            warn!(file = input.file_path, "circuit breaker open, skipping LLM analysis");
            return overload_sentinel(input.file_path);
        }

        let prompt = build_prompt(&input);
        let system = SYSTEM_PROMPT;

        for attempt in 1..=self.retry.max_retries {
            match self.llm.generate_slow(&prompt, Some(system)).await {
                Ok(raw) => match parse_output(&raw) {
                    Ok(result) => {
                        self.breaker.record_success();
                        info!(
                            file = input.file_path,
                            issues = result.issues.len(),
                            attempt,
                            "LLM analysis completed"
                        );
                        return result;
                    }
                    Err(err) => {
                        warn!(file = input.file_path, attempt, error = %err, "failed to parse LLM output");
                        self.breaker.record_failure(is_overload_error(&err));
                    }
                },
                Err(err) => {
                    let message = err.to_string();
                    let overload = is_overload_error(&message);
                    warn!(file = input.file_path, attempt, error = %message, overload, "LLM call failed");
                    self.breaker.record_failure(overload);
                }
            }

            if attempt < self.retry.max_retries {
                tokio::time::sleep(backoff_delay(&self.retry, attempt)).await;
            }
        }

        overload_sentinel(input.file_path)
    }
}

/// Delay = min(baseDelayMs · 2^(attempt-1), maxDelayMs) + optional jitter.
fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exp = retry.base_delay_ms.saturating_mul(1u64 << (attempt - 1).min(16));
    let capped = exp.min(retry.max_delay_ms);
    let jitter = if retry.jitter { deterministic_jitter(attempt) } else { 0 };
    Duration::from_millis(capped + jitter)
}

/// The retry backoff's jitter component doesn't need cryptographic
/// randomness, just variance across attempts; derive it from the attempt
/// number so retries remain reproducible in tests.
fn deterministic_jitter(attempt: u32) -> u64 {
    ((attempt as u64).wrapping_mul(2654435761) % 1000) as u64
}

fn overload_sentinel(file_path: &str) -> AnalysisResult {
    AnalysisResult {
        summary: format!(
            "Review skipped for {file_path}: the LLM provider is overloaded and the circuit breaker is protecting it. No findings were generated for this file."
        ),
        issues: Vec::new(),
    }
}

const SYSTEM_PROMPT: &str = "You are a meticulous code reviewer. Respond with a single JSON object \
matching {\"summary\": string, \"issues\": [{\"line\": number, \"severity\": \"critical\"|\"warning\"|\"info\", \
\"category\": \"security\"|\"bug\"|\"performance\"|\"maintainability\", \"message\": string, \
\"suggestion\": string|null, \"explanation\": string|null}]}. Only flag real issues in the diff.";

fn build_prompt(input: &AnalyzerInput<'_>) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("File: {}\nLanguage: {}\n\n", input.file_path, input.language));
    prompt.push_str("Annotated diff (line number, diff position where applicable, markers):\n");
    prompt.push_str(input.annotated_content);
    prompt.push_str("\n\nOriginal file content:\n");
    prompt.push_str(input.original_content);
    prompt.push_str("\n\nPatch:\n");
    prompt.push_str(input.patch);
    if !input.similar_snippets.is_empty() {
        prompt.push_str("\n\nSimilar code elsewhere in the repository:\n");
        for (idx, snippet) in input.similar_snippets.iter().enumerate() {
            prompt.push_str(&format!("--- snippet {idx} ---\n{snippet}\n"));
        }
    }
    prompt
}

fn parse_output(raw: &str) -> Result<AnalysisResult, String> {
    let trimmed = raw.trim();
    let json_slice = extract_json_object(trimmed).unwrap_or(trimmed);
    serde_json::from_str(json_slice).map_err(|e| format!("invalid analyzer JSON: {e}"))
}

/// The model is asked for pure JSON but frequently wraps it in prose or a
/// fenced code block; take the outermost `{...}` span instead of failing.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let raw = r#"{"summary":"ok","issues":[{"line":3,"severity":"warning","category":"bug","message":"oops","suggestion":null,"explanation":null}]}"#;
        let result = parse_output(raw).unwrap();
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].line, 3);
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let raw = "Here you go:\n```json\n{\"summary\":\"ok\",\"issues\":[]}\n```";
        let result = parse_output(raw).unwrap();
        assert_eq!(result.summary, "ok");
    }

    #[test]
    fn backoff_delay_grows_and_caps() {
        let retry = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 300,
            jitter: false,
        };
        assert_eq!(backoff_delay(&retry, 1).as_millis(), 100);
        assert_eq!(backoff_delay(&retry, 2).as_millis(), 200);
        assert_eq!(backoff_delay(&retry, 3).as_millis(), 300);
    }
}
