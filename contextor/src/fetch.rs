//! Abstraction over "read this file's text at the commit under review".
//!
//! Kept as a trait so this crate never depends on a git or provider client
//! directly: the caller (the review orchestrator) owns the checked-out
//! working copy or the provider API and hands us a thin fetcher.

use std::future::Future;
use std::pin::Pin;

use crate::error::ContextorError;

/// Fetches the full current text of a file at the commit being reviewed.
/// Code bodies for context must always come from here, never from stored
/// chunk text, so the LLM sees the file as it exists at that commit.
pub trait FileFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        file_path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, ContextorError>> + Send + 'a>>;
}

/// Extracts the 1-indexed inclusive line range `[start_line, end_line]` from
/// `text`. Out-of-range bounds clamp rather than panic or error: stored
/// metadata can drift slightly from the file text across commits.
pub fn slice_lines(text: &str, start_line: u32, end_line: u32) -> String {
    if start_line == 0 || end_line < start_line {
        return String::new();
    }
    let start = (start_line - 1) as usize;
    let end = end_line as usize;
    text.lines()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_lines_extracts_inclusive_range() {
        let text = "one\ntwo\nthree\nfour\n";
        assert_eq!(slice_lines(text, 2, 3), "two\nthree");
    }

    #[test]
    fn slice_lines_clamps_past_eof() {
        let text = "only\n";
        assert_eq!(slice_lines(text, 1, 100), "only");
    }

    #[test]
    fn slice_lines_rejects_inverted_range() {
        assert_eq!(slice_lines("a\nb\n", 3, 1), "");
    }
}
