//! Deterministic id and scalar derivation.
//!
//! Every id in this crate is a pure function of its inputs so that
//! re-indexing an unchanged file reproduces the same chunk/relationship ids
//! and the same `changeFrequency` (Open Question (b): we don't have real VCS
//! history here, so we fold a stable hash into `[0, 1]` instead of making
//! this up per run).

use uuid::Uuid;

/// Fixed namespace for chunk/relationship UUIDv5 derivation. Arbitrary but
/// stable across runs and processes.
const NAMESPACE: Uuid = Uuid::from_bytes([
    0x6f, 0x1e, 0x2d, 0x3c, 0x4b, 0x5a, 0x49, 0x38, 0x27, 0x16, 0x05, 0xf4, 0xe3, 0xd2, 0xc1, 0xb0,
]);

/// FNV-1a, used where we just need a fast stable scalar (change-frequency
/// folding) rather than a presentable id.
pub fn hash_content(input: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for byte in input.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Stable id for a chunk, derived from everything that identifies its
/// position in the codebase. Two indexing runs over the same file produce
/// the same id for the same logical chunk.
pub fn chunk_id(repository_id: &str, file_path: &str, start_byte: usize, end_byte: usize) -> String {
    let key = format!("{repository_id}:{file_path}:{start_byte}:{end_byte}");
    Uuid::new_v5(&NAMESPACE, key.as_bytes()).to_string()
}

pub fn relationship_id(source: &str, target: &str, relationship_type: &str) -> String {
    let key = format!("{source}->{target}:{relationship_type}");
    Uuid::new_v5(&NAMESPACE, key.as_bytes()).to_string()
}

/// Deterministic stand-in for a real commit-history-derived change
/// frequency. Folds `(repository_id, file_path, start_line, end_line,
/// commit_sha)` into `[0, 1]` so tests and repeated indexing runs are
/// reproducible (spec Open Question (b)).
pub fn change_frequency(
    repository_id: &str,
    file_path: &str,
    start_line: usize,
    end_line: usize,
    commit_sha: &str,
) -> f64 {
    let key = format!("{repository_id}:{file_path}:{start_line}:{end_line}:{commit_sha}");
    let hash = hash_content(&key);
    (hash % 1_000_000) as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_content_is_deterministic() {
        assert_eq!(hash_content("abc"), hash_content("abc"));
        assert_ne!(hash_content("abc"), hash_content("abd"));
    }

    #[test]
    fn chunk_id_is_stable_across_calls() {
        let a = chunk_id("repo-1", "src/lib.rs", 10, 200);
        let b = chunk_id("repo-1", "src/lib.rs", 10, 200);
        assert_eq!(a, b);
        let c = chunk_id("repo-1", "src/lib.rs", 10, 201);
        assert_ne!(a, c);
    }

    #[test]
    fn change_frequency_is_bounded_and_deterministic() {
        let a = change_frequency("repo-1", "a.rs", 1, 10, "deadbeef");
        let b = change_frequency("repo-1", "a.rs", 1, 10, "deadbeef");
        assert_eq!(a, b);
        assert!((0.0..1.0).contains(&a));
    }
}
