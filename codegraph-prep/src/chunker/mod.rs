mod queries;

pub mod incremental;

use std::fmt;

use tree_sitter::{Node, Parser, Tree};

use crate::chunk::{ChunkType, CodeChunk};
use crate::errors::{ChunkerError, Result};
use crate::ids;
use crate::span::Span;

/// Languages the tree chunker understands natively. Anything else falls
/// back to `fixed_size_chunks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedLanguage {
    JavaScript,
    Jsx,
    TypeScript,
    Tsx,
    Java,
    Json,
}

impl SupportedLanguage {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" => Some(Self::JavaScript),
            "jsx" => Some(Self::Jsx),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "java" => Some(Self::Java),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::Jsx => "jsx",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Java => "java",
            Self::Json => "json",
        }
    }

    fn grammar(&self) -> tree_sitter::Language {
        match self {
            Self::JavaScript | Self::Jsx => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::Json => tree_sitter_json::LANGUAGE.into(),
        }
    }
}

impl fmt::Display for SupportedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct TreeChunker {
    parser: Parser,
    language: SupportedLanguage,
}

impl TreeChunker {
    pub fn new(language: SupportedLanguage) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&language.grammar())
            .map_err(|source| ChunkerError::LanguageSetup {
                language: language.as_str().to_string(),
                source,
            })?;
        Ok(Self { parser, language })
    }

    pub fn parse(&mut self, source: &str, file_path: &str) -> Result<Tree> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| ChunkerError::ParseFailed {
                file_path: file_path.to_string(),
            })
    }

    pub fn reparse(&mut self, source: &str, file_path: &str, old_tree: &Tree) -> Result<Tree> {
        self.parser
            .parse(source, Some(old_tree))
            .ok_or_else(|| ChunkerError::ParseFailed {
                file_path: file_path.to_string(),
            })
    }

    /// Chunk a file using the declaration/import query for this language.
    /// Falls back to `fixed_size_chunks` when the query finds nothing
    /// (e.g. a file with no top-level declarations at all).
    pub fn chunk(
        &mut self,
        source: &str,
        file_path: &str,
        repository_id: &str,
    ) -> Result<Vec<CodeChunk>> {
        let tree = self.parse(source, file_path)?;
        self.chunk_tree(&tree, source, file_path, repository_id)
    }

    pub fn chunk_tree(
        &self,
        tree: &Tree,
        source: &str,
        file_path: &str,
        repository_id: &str,
    ) -> Result<Vec<CodeChunk>> {
        let query = queries::declaration_query(self.language)?;
        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source.as_bytes());

        let mut chunks = Vec::new();
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                // Drop noise captures: anything shorter than 5 bytes isn't a
                // meaningful declaration (matches spec's minimum-size filter).
                if node.end_byte().saturating_sub(node.start_byte()) < 5 {
                    continue;
                }
                let capture_name = query.capture_names()[capture.index as usize];
                let Some(chunk_type) = queries::chunk_type_for_capture(capture_name) else {
                    continue;
                };
                let symbol_name = extract_symbol_name(node, source, chunk_type);
                chunks.push(build_chunk(
                    repository_id,
                    file_path,
                    self.language,
                    chunk_type,
                    symbol_name,
                    node,
                    source,
                ));
            }
        }

        if chunks.is_empty() {
            return Ok(fixed_size_chunks(source, file_path, self.language, repository_id));
        }

        Ok(chunks)
    }
}

fn build_chunk(
    repository_id: &str,
    file_path: &str,
    language: SupportedLanguage,
    chunk_type: ChunkType,
    symbol_name: Option<String>,
    node: Node<'_>,
    source: &str,
) -> CodeChunk {
    let span = Span::new(
        node.start_position().row + 1,
        node.end_position().row + 1,
        node.start_byte(),
        node.end_byte(),
    );
    CodeChunk {
        id: ids::chunk_id(repository_id, file_path, span.start_byte, span.end_byte),
        repository_id: repository_id.to_string(),
        file_path: file_path.to_string(),
        language: language.as_str().to_string(),
        chunk_type,
        symbol_name,
        span,
        content: span.slice_text(source).to_string(),
    }
}

/// Find the human name of a declaration node. Arrow functions are the odd
/// case: the function node itself has no name, so we walk up to the
/// enclosing `variable_declarator` and read its `name` field instead.
fn extract_symbol_name(node: Node<'_>, source: &str, chunk_type: ChunkType) -> Option<String> {
    if chunk_type == ChunkType::ArrowFunction {
        let mut current = Some(node);
        while let Some(n) = current {
            if n.kind() == "variable_declarator" {
                if let Some(name_node) = n.child_by_field_name("name") {
                    return Some(name_node.utf8_text(source.as_bytes()).ok()?.to_string());
                }
            }
            current = n.parent();
        }
        return None;
    }

    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
        .map(|s| s.to_string())
}

/// Non-overlapping windows of at most 50 non-empty lines, used for files
/// with no recognized declarations and for unsupported languages.
pub fn fixed_size_chunks(
    source: &str,
    file_path: &str,
    language: SupportedLanguage,
    repository_id: &str,
) -> Vec<CodeChunk> {
    const MAX_LINES: usize = 50;
    let lines: Vec<&str> = source.lines().collect();
    if lines.iter().all(|l| l.trim().is_empty()) {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start_line = 0usize;
    while start_line < lines.len() {
        let end_line = (start_line + MAX_LINES).min(lines.len());
        let slice = &lines[start_line..end_line];
        if slice.iter().any(|l| !l.trim().is_empty()) {
            let start_byte = line_offset(source, start_line);
            let end_byte = line_offset(source, end_line);
            let span = Span::new(start_line + 1, end_line, start_byte, end_byte);
            chunks.push(CodeChunk {
                id: ids::chunk_id(repository_id, file_path, span.start_byte, span.end_byte),
                repository_id: repository_id.to_string(),
                file_path: file_path.to_string(),
                language: language.as_str().to_string(),
                chunk_type: ChunkType::Code,
                symbol_name: None,
                span,
                content: slice.join("\n"),
            });
        }
        start_line = end_line;
    }
    chunks
}

fn line_offset(source: &str, line: usize) -> usize {
    source
        .split('\n')
        .take(line)
        .map(|l| l.len() + 1)
        .sum::<usize>()
        .min(source.len())
}
