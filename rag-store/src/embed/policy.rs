//! Input acceptance policy, token-bounded chunking, and retried embedding
//! calls for one file's text.

use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::embed::EmbeddingsProvider;
use crate::errors::RagError;

/// Target chunk size: ~8000 tokens at ~3 chars/token.
const MAX_CHARS: usize = 24_000;
const CHUNK_OVERLAP: usize = 500;
const MAX_ATTEMPTS: u32 = 3;

const SKIP_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "zip", "tar", "gz", "7z", "rar",
    "exe", "dll", "so", "dylib", "bin", "class", "jar", "o", "a", "pdf",
];

const SKIP_GLOBS: &[&str] = &[
    "node_modules/",
    "dist/",
    "build/",
    "target/",
    ".git/",
    "vendor/",
    "*.lock",
    "*.min.js",
    "*.map",
];

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// True when this (path, text) pair should not be embedded.
pub fn should_skip(file_path: &str, text: &str) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    if has_skip_extension(file_path) {
        return true;
    }
    if matches_skip_glob(file_path) {
        return true;
    }
    if looks_like_svg(text) {
        return true;
    }
    if control_char_ratio_too_high(text) {
        return true;
    }
    false
}

fn has_skip_extension(file_path: &str) -> bool {
    match file_path.rsplit('.').next() {
        Some(ext) => SKIP_EXTENSIONS
            .iter()
            .any(|skip| ext.eq_ignore_ascii_case(skip)),
        None => false,
    }
}

fn matches_skip_glob(file_path: &str) -> bool {
    SKIP_GLOBS.iter().any(|pat| glob_match(pat, file_path))
}

/// Minimal gitignore-style matcher: a trailing `/` matches any path
/// segment by that name, a leading `*` matches a suffix.
fn glob_match(pattern: &str, path: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('/') {
        return path
            .split('/')
            .any(|segment| segment == prefix);
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return path.ends_with(suffix);
    }
    path == pattern
}

fn looks_like_svg(text: &str) -> bool {
    text.trim_start().starts_with("<svg") || text.contains(SVG_NAMESPACE)
}

fn control_char_ratio_too_high(text: &str) -> bool {
    let window = &text.as_bytes()[..text.len().min(1000)];
    if window.is_empty() {
        return false;
    }
    let control = window
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
        .count();
    (control as f64) / (window.len() as f64) > 0.10
}

/// One embedded chunk of a file's text. `chunk_index`/`total` are only
/// present when the text was split into more than one chunk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedChunk {
    pub vector: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    pub text: String,
}

/// Splits `text` into `MAX_CHARS`-sized sliding windows overlapping by
/// `CHUNK_OVERLAP` chars; the final window always reaches the end.
pub fn chunk_text(text: &str) -> Vec<&str> {
    if text.len() <= MAX_CHARS {
        return vec![text];
    }

    let mut out = Vec::new();
    let len = text.len();
    let mut start = 0usize;
    loop {
        let end = (start + MAX_CHARS).min(len);
        out.push(&text[start..end]);
        if end == len {
            break;
        }
        start = end - CHUNK_OVERLAP;
    }
    out
}

/// Runs the full embedding-service contract for one file: skip policy,
/// chunking, and per-chunk retried provider calls. `Ok(None)` means the
/// input was skipped, not an error.
pub async fn embed_file_text(
    provider: &dyn EmbeddingsProvider,
    file_path: &str,
    text: &str,
) -> Result<Option<Vec<EmbeddedChunk>>, RagError> {
    if should_skip(file_path, text) {
        return Ok(None);
    }

    let chunks = chunk_text(text);
    let total = chunks.len();
    let mut out = Vec::with_capacity(total);

    for (idx, chunk) in chunks.into_iter().enumerate() {
        let vector = embed_with_retry(provider, chunk).await?;
        out.push(EmbeddedChunk {
            vector,
            chunk_index: (total > 1).then_some(idx),
            total: (total > 1).then_some(total),
            text: chunk.to_string(),
        });
    }

    Ok(Some(out))
}

async fn embed_with_retry(provider: &dyn EmbeddingsProvider, text: &str) -> Result<Vec<f32>, RagError> {
    let mut attempt = 1u32;
    loop {
        match provider.embed(text).await {
            Ok(vector) => return Ok(vector),
            Err(err) if attempt < MAX_ATTEMPTS => {
                warn!(attempt, error = %err, "embedding call failed, retrying");
                let delay = Duration::from_secs(1) * 2u32.pow(attempt - 1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_empty_and_binary_like_inputs() {
        assert!(should_skip("a.rs", "   \n  "));
        assert!(should_skip("logo.png", "not actually a png but named like one"));
        assert!(should_skip("icons/brand.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>"));
        assert!(!should_skip("src/lib.rs", "fn main() {}"));
    }

    #[test]
    fn skips_gitignore_style_paths() {
        assert!(should_skip("node_modules/lodash/index.js", "module.exports = {}"));
        assert!(should_skip("dist/bundle.min.js", "!function(){}();"));
    }

    #[test]
    fn detects_high_control_char_ratio() {
        let mostly_binary: String = std::iter::repeat('\u{1}').take(200).collect();
        assert!(should_skip("data.bin", &mostly_binary));
    }

    #[test]
    fn single_chunk_for_small_text() {
        let chunks = chunk_text("short text");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "short text");
    }

    #[test]
    fn sliding_windows_overlap_and_reach_the_end() {
        let text = "a".repeat(50_000);
        let chunks = chunk_text(&text);
        assert!(chunks.len() > 1);
        assert!(text.ends_with(*chunks.last().unwrap()));
        for w in &chunks[..chunks.len() - 1] {
            assert_eq!(w.len(), MAX_CHARS);
        }
    }
}
