//! Incremental re-chunking: feed the previous tree back into the parser
//! alongside an edit description so re-parsing a mildly-changed file reuses
//! unaffected subtrees instead of starting over.

use tree_sitter::{InputEdit, Point, Tree};

use crate::chunk::CodeChunk;
use crate::errors::Result;

use super::{SupportedLanguage, TreeChunker};

pub struct IncrementalSession {
    chunker: TreeChunker,
    tree: Tree,
    source: String,
    file_path: String,
    repository_id: String,
}

impl IncrementalSession {
    pub fn open(
        language: SupportedLanguage,
        source: String,
        file_path: String,
        repository_id: String,
    ) -> Result<Self> {
        let mut chunker = TreeChunker::new(language)?;
        let tree = chunker.parse(&source, &file_path)?;
        Ok(Self {
            chunker,
            tree,
            source,
            file_path,
            repository_id,
        })
    }

    pub fn chunks(&self) -> Result<Vec<CodeChunk>> {
        self.chunker
            .chunk_tree(&self.tree, &self.source, &self.file_path, &self.repository_id)
    }

    /// Re-chunk against `new_source`. Computes the edit region by diffing
    /// the common prefix/suffix against the previous source, feeds it to
    /// tree-sitter as an `InputEdit` hint, then reparses. If anything about
    /// the hinted reparse looks off (tree-sitter still returns `None` for a
    /// malformed buffer), falls back to a clean full reparse with no edit
    /// hint at all.
    pub fn update(&mut self, new_source: String) -> Result<Vec<CodeChunk>> {
        let edit = compute_edit(&self.source, &new_source);
        self.tree.edit(&edit);

        let reparsed = self
            .chunker
            .reparse(&new_source, &self.file_path, &self.tree)
            .or_else(|_| self.chunker.parse(&new_source, &self.file_path))?;

        self.tree = reparsed;
        self.source = new_source;
        self.chunks()
    }
}

fn compute_edit(old: &str, new: &str) -> InputEdit {
    let old_bytes = old.as_bytes();
    let new_bytes = new.as_bytes();

    let common_prefix = old_bytes
        .iter()
        .zip(new_bytes.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let old_remainder = &old_bytes[common_prefix..];
    let new_remainder = &new_bytes[common_prefix..];
    let common_suffix = old_remainder
        .iter()
        .rev()
        .zip(new_remainder.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(old_remainder.len())
        .min(new_remainder.len());

    let start_byte = common_prefix;
    let old_end_byte = old_bytes.len() - common_suffix;
    let new_end_byte = new_bytes.len() - common_suffix;

    InputEdit {
        start_byte,
        old_end_byte,
        new_end_byte,
        start_position: point_at(old, start_byte),
        old_end_position: point_at(old, old_end_byte),
        new_end_position: point_at(new, new_end_byte),
    }
}

fn point_at(text: &str, byte_offset: usize) -> Point {
    let safe_offset = byte_offset.min(text.len());
    let prefix = &text[..safe_offset];
    let row = prefix.matches('\n').count();
    let column = match prefix.rfind('\n') {
        Some(idx) => safe_offset - idx - 1,
        None => safe_offset,
    };
    Point { row, column }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_covers_only_the_changed_region() {
        let old = "function a() {}\nfunction b() {}\n";
        let new = "function a() {}\nfunction bb() {}\n";
        let edit = compute_edit(old, new);
        assert!(edit.start_byte > 0);
        assert!(edit.new_end_byte >= edit.start_byte);
    }
}
