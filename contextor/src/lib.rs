//! Context Retriever: for a pull request's changed regions, produces a
//! ranked list of [`CodeContext`] pieces to feed the LLM analyzer.
//!
//! Four levels are combined (direct changes, affected symbols, one-hop
//! graph neighbors, semantic neighbors), deduped by `(filePath, startLine,
//! endLine)`, and scored — see [`build_context`].

mod error;
mod fetch;
mod graph;
mod levels;

pub use error::ContextorError;
pub use fetch::{slice_lines, FileFetcher};
pub use levels::{build_context, ChangedRegion, CodeContext};
