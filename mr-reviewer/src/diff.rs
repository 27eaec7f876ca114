//! Diff Analyzer: GitHub-style line↔position mapping over a parsed unified
//! diff, plus the line-number correction policy applied to LLM findings.
//!
//! `position` is a 1-based counter over every line emitted by the patch text
//! (hunk headers included) for one file; it never resets between hunks,
//! unlike the old/new line cursors which reset at each `@@ ... @@` header.
//! Review comments on a provider that uses this scheme must reference a
//! `position`, not a raw line — this module is the sole authority for the
//! mapping between the two.

use std::collections::{HashMap, HashSet};

use crate::git_providers::types::{DiffHunk, DiffLine};

#[derive(Debug, Clone, Default)]
pub struct DiffAnalysis {
    pub added_lines: HashSet<u32>,
    pub deleted_lines: HashSet<u32>,
    pub changed_lines: HashSet<u32>,
    pub valid_diff_lines: HashSet<u32>,
    pub valid_diff_positions: HashSet<u32>,
    pub line_to_position: HashMap<u32, u32>,
    pub position_to_line: HashMap<u32, u32>,
}

impl DiffAnalysis {
    pub fn position_for_line(&self, line: u32) -> Option<u32> {
        self.line_to_position.get(&line).copied()
    }

    pub fn is_commentable(&self, line: u32) -> bool {
        self.valid_diff_lines.contains(&line)
    }
}

/// Walks one file's hunks, maintaining `currentOldLine`/`currentNewLine`
/// and a monotonically increasing `diffPosition`. Each hunk header resets
/// both line cursors and still advances `diffPosition` by one, matching
/// what a provider's raw unified-diff text would produce for that line.
pub fn analyze(hunks: &[DiffHunk]) -> DiffAnalysis {
    let mut out = DiffAnalysis::default();
    let mut position: u32 = 0;

    for hunk in hunks {
        position += 1; // the "@@ ... @@" header line itself
        let mut old_line = hunk.old_start;
        let mut new_line = hunk.new_start;

        for line in &hunk.lines {
            position += 1;
            match line {
                DiffLine::Added { .. } => {
                    out.added_lines.insert(new_line);
                    out.changed_lines.insert(new_line);
                    out.valid_diff_lines.insert(new_line);
                    out.valid_diff_positions.insert(position);
                    out.line_to_position.insert(new_line, position);
                    out.position_to_line.insert(position, new_line);
                    new_line += 1;
                }
                DiffLine::Removed { .. } => {
                    out.deleted_lines.insert(old_line);
                    old_line += 1;
                }
                DiffLine::Context { .. } => {
                    out.valid_diff_lines.insert(new_line);
                    out.valid_diff_positions.insert(position);
                    out.line_to_position.insert(new_line, position);
                    out.position_to_line.insert(position, new_line);
                    old_line += 1;
                    new_line += 1;
                }
            }
        }
    }

    out
}

#[derive(Debug, Clone)]
pub struct CorrectionConfig {
    pub max_correction_distance: u32,
    pub prefer_changed_lines: bool,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            max_correction_distance: 5,
            prefer_changed_lines: true,
        }
    }
}

/// Applies the five-step correction policy to a raw LLM-reported line
/// number. Returns `None` when no nearby valid line can be found, meaning
/// the finding should be dropped.
pub fn correct_line(
    analysis: &DiffAnalysis,
    total_lines: u32,
    comment_lines: &HashSet<u32>,
    line: u32,
    cfg: &CorrectionConfig,
) -> Option<u32> {
    // 1. Clamp to [1, totalLines].
    let mut line = line.clamp(1, total_lines.max(1));

    // 2. If not a valid diff line, search for the nearest one (preferring
    // changed lines), within the max correction distance; else drop.
    if !analysis.valid_diff_lines.contains(&line) {
        line = nearest_valid_line(analysis, line, cfg.max_correction_distance)?;
    }

    // 3. If the line lands on a comment line and a nearer non-comment valid
    // line exists within distance, prefer that.
    if comment_lines.contains(&line) {
        if let Some(nearer) =
            nearest_in_filtered_set(&analysis.valid_diff_lines, comment_lines, line, cfg.max_correction_distance)
        {
            line = nearer;
        }
    }

    // 4. If preferring changed lines and we're not on one, try to move to
    // the nearest changed line within distance.
    if cfg.prefer_changed_lines && !analysis.changed_lines.contains(&line) {
        if let Some(changed) = nearest_in_set(&analysis.changed_lines, line, cfg.max_correction_distance) {
            line = changed;
        }
    }

    // 5. Final gate.
    analysis.valid_diff_lines.contains(&line).then_some(line)
}

fn nearest_valid_line(analysis: &DiffAnalysis, line: u32, max_distance: u32) -> Option<u32> {
    if let Some(changed) = nearest_in_set(&analysis.changed_lines, line, max_distance) {
        return Some(changed);
    }
    nearest_in_set(&analysis.valid_diff_lines, line, max_distance)
}

fn nearest_in_set(set: &HashSet<u32>, target: u32, max_distance: u32) -> Option<u32> {
    set.iter()
        .map(|&l| (l, l.abs_diff(target)))
        .filter(|&(_, d)| d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(l, _)| l)
}

/// Nearest member of `set` that is within distance and NOT in `exclude`.
fn nearest_in_filtered_set(
    set: &HashSet<u32>,
    exclude: &HashSet<u32>,
    target: u32,
    max_distance: u32,
) -> Option<u32> {
    set.iter()
        .filter(|l| !exclude.contains(l))
        .map(|&l| (l, l.abs_diff(target)))
        .filter(|&(_, d)| d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(l, _)| l)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git_providers::types::DiffHunk;

    fn sample_hunk() -> DiffHunk {
        // @@ -1,3 +1,4 @@
        //  context 1
        // -removed
        // +added 1
        // +added 2
        //  context 2
        DiffHunk {
            old_start: 1,
            old_lines: 3,
            new_start: 1,
            new_lines: 4,
            lines: vec![
                DiffLine::Context {
                    old_line: 1,
                    new_line: 1,
                    content: "context 1".into(),
                },
                DiffLine::Removed {
                    old_line: 2,
                    content: "removed".into(),
                },
                DiffLine::Added {
                    new_line: 2,
                    content: "added 1".into(),
                },
                DiffLine::Added {
                    new_line: 3,
                    content: "added 2".into(),
                },
                DiffLine::Context {
                    old_line: 3,
                    new_line: 4,
                    content: "context 2".into(),
                },
            ],
        }
    }

    #[test]
    fn maps_positions_monotonically_including_header() {
        let analysis = analyze(&[sample_hunk()]);
        // position 1 = header, 2 = context1(line1), 3 = removed(no map),
        // 4 = added(line2), 5 = added(line3), 6 = context2(line4)
        assert_eq!(analysis.position_for_line(1), Some(2));
        assert_eq!(analysis.position_for_line(2), Some(4));
        assert_eq!(analysis.position_for_line(3), Some(5));
        assert_eq!(analysis.position_for_line(4), Some(6));
        assert!(analysis.added_lines.contains(&2));
        assert!(analysis.added_lines.contains(&3));
        assert!(analysis.deleted_lines.contains(&2));
        assert!(analysis.valid_diff_lines.contains(&2));
    }

    #[test]
    fn removed_lines_are_not_commentable() {
        let analysis = analyze(&[sample_hunk()]);
        // old line 2 ("removed") never appears as a new-line key.
        assert!(!analysis.valid_diff_lines.contains(&0));
    }

    #[test]
    fn correction_snaps_to_nearest_changed_line_within_distance() {
        let analysis = analyze(&[sample_hunk()]);
        let cfg = CorrectionConfig::default();
        // Line 10 is out of range for total_lines clamp; use 5 instead,
        // which isn't valid (only 1..=4 are), nearest changed is line 3.
        let corrected = correct_line(&analysis, 4, &HashSet::new(), 5, &cfg);
        assert_eq!(corrected, Some(3));
    }

    #[test]
    fn correction_drops_when_nothing_within_distance() {
        let mut analysis = DiffAnalysis::default();
        analysis.valid_diff_lines.insert(100);
        analysis.changed_lines.insert(100);
        let cfg = CorrectionConfig::default();
        assert_eq!(correct_line(&analysis, 200, &HashSet::new(), 1, &cfg), None);
    }
}
