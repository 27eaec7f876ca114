//! Comment Manager: turns LLM findings into provider comments — body
//! rendering, dedup against existing PR comments, line validation, a
//! review-level summary, and the REQUEST_CHANGES/COMMENT event choice.

use std::collections::{HashMap, HashSet};

use ai_llm_service::review_analyzer::{Category, ReviewFinding, Severity};

use crate::diff::DiffAnalysis;

#[derive(Debug, Clone)]
pub struct DraftComment {
    pub path: String,
    pub line: u32,
    pub position: u32,
    pub severity: Severity,
    pub category: Category,
    pub body: String,
}

/// A comment already posted on the PR, fetched from the provider for
/// idempotency checks.
#[derive(Debug, Clone)]
pub struct ExistingComment {
    pub path: String,
    pub line: Option<u32>,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEvent {
    RequestChanges,
    Comment,
}

fn severity_label(s: Severity) -> &'static str {
    match s {
        Severity::Critical => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
    }
}

fn category_label(c: Category) -> &'static str {
    match c {
        Category::Security => "security",
        Category::Bug => "bug",
        Category::Performance => "performance",
        Category::Maintainability => "maintainability",
    }
}

fn build_body(finding: &ReviewFinding) -> String {
    let mut body = format!(
        "**[{}] {}** — {}",
        severity_label(finding.severity),
        category_label(finding.category),
        finding.message
    );
    if let Some(suggestion) = &finding.suggestion {
        body.push_str(&format!("\n\n```suggestion\n{suggestion}\n```"));
    }
    if let Some(explanation) = &finding.explanation {
        body.push_str(&format!("\n\n{explanation}"));
    }
    body
}

/// Converts one finding into a draft comment, computing its GitHub-style
/// `position` from the diff analysis. Drops findings the analysis can't map.
pub fn to_draft(file_path: &str, finding: &ReviewFinding, analysis: &DiffAnalysis) -> Option<DraftComment> {
    let position = analysis.position_for_line(finding.line)?;
    Some(DraftComment {
        path: file_path.to_string(),
        line: finding.line,
        position,
        severity: finding.severity,
        category: finding.category,
        body: build_body(finding),
    })
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drops drafts that already exist on the PR: same path, same line, and
/// the first 80 normalized characters of the body match.
pub fn dedup(drafts: Vec<DraftComment>, existing: &[ExistingComment]) -> Vec<DraftComment> {
    const PREFIX_LEN: usize = 80;
    let existing_keys: HashSet<(String, u32, String)> = existing
        .iter()
        .filter_map(|c| {
            let line = c.line?;
            let prefix: String = normalize(&c.body).chars().take(PREFIX_LEN).collect();
            Some((c.path.clone(), line, prefix))
        })
        .collect();

    drafts
        .into_iter()
        .filter(|d| {
            let prefix: String = normalize(&d.body).chars().take(PREFIX_LEN).collect();
            !existing_keys.contains(&(d.path.clone(), d.line, prefix))
        })
        .collect()
}

/// Keeps only drafts whose line is in that file's valid diff lines.
pub fn validate(
    drafts: Vec<DraftComment>,
    valid_lines_by_path: &HashMap<String, HashSet<u32>>,
) -> Vec<DraftComment> {
    drafts
        .into_iter()
        .filter(|d| {
            valid_lines_by_path
                .get(&d.path)
                .is_some_and(|lines| lines.contains(&d.line))
        })
        .collect()
}

/// Caps the number of comments kept per file, preferring higher severity.
pub fn cap_per_file(mut drafts: Vec<DraftComment>, max_per_file: usize) -> Vec<DraftComment> {
    drafts.sort_by_key(|d| std::cmp::Reverse(severity_rank(d.severity)));
    let mut per_file: HashMap<String, usize> = HashMap::new();
    drafts
        .into_iter()
        .filter(|d| {
            let count = per_file.entry(d.path.clone()).or_insert(0);
            *count += 1;
            *count <= max_per_file
        })
        .collect()
}

fn severity_rank(s: Severity) -> u8 {
    match s {
        Severity::Critical => 2,
        Severity::Warning => 1,
        Severity::Info => 0,
    }
}

pub fn choose_event(drafts: &[DraftComment]) -> ReviewEvent {
    if drafts.iter().any(|d| matches!(d.severity, Severity::Critical)) {
        ReviewEvent::RequestChanges
    } else {
        ReviewEvent::Comment
    }
}

/// Concise prose summary with per-severity counts and the top categories.
pub fn build_summary(drafts: &[DraftComment]) -> String {
    if drafts.is_empty() {
        return "No issues found.".to_string();
    }
    let mut by_severity: HashMap<&str, usize> = HashMap::new();
    let mut by_category: HashMap<&str, usize> = HashMap::new();
    for d in drafts {
        *by_severity.entry(severity_label(d.severity)).or_insert(0) += 1;
        *by_category.entry(category_label(d.category)).or_insert(0) += 1;
    }

    let mut categories: Vec<(&str, usize)> = by_category.into_iter().collect();
    categories.sort_by_key(|&(_, n)| std::cmp::Reverse(n));
    let top_categories: Vec<String> = categories
        .into_iter()
        .take(3)
        .map(|(name, n)| format!("{name} ({n})"))
        .collect();

    format!(
        "Found {} issue(s): {} error, {} warning, {} info. Top categories: {}.",
        drafts.len(),
        by_severity.get("error").copied().unwrap_or(0),
        by_severity.get("warning").copied().unwrap_or(0),
        by_severity.get("info").copied().unwrap_or(0),
        if top_categories.is_empty() {
            "none".to_string()
        } else {
            top_categories.join(", ")
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(line: u32, severity: Severity, category: Category) -> ReviewFinding {
        ReviewFinding {
            line,
            severity,
            category,
            message: "bad thing".into(),
            suggestion: None,
            explanation: None,
        }
    }

    #[test]
    fn dedup_drops_matching_path_line_and_prefix() {
        let draft = DraftComment {
            path: "a.rs".into(),
            line: 10,
            position: 3,
            severity: Severity::Warning,
            category: Category::Bug,
            body: "**[warning] bug** — something is wrong here".into(),
        };
        let existing = vec![ExistingComment {
            path: "a.rs".into(),
            line: Some(10),
            body: "**[warning] bug** — something is wrong here and more".into(),
        }];
        let kept = dedup(vec![draft], &existing);
        assert!(kept.is_empty());
    }

    #[test]
    fn choose_event_escalates_on_critical() {
        let drafts = vec![DraftComment {
            path: "a.rs".into(),
            line: 1,
            position: 1,
            severity: Severity::Critical,
            category: Category::Security,
            body: String::new(),
        }];
        assert_eq!(choose_event(&drafts), ReviewEvent::RequestChanges);
    }

    #[test]
    fn cap_per_file_keeps_highest_severity_first() {
        let drafts = vec![
            DraftComment {
                path: "a.rs".into(),
                line: 1,
                position: 1,
                severity: Severity::Info,
                category: Category::Bug,
                body: "info".into(),
            },
            DraftComment {
                path: "a.rs".into(),
                line: 2,
                position: 2,
                severity: Severity::Critical,
                category: Category::Bug,
                body: "critical".into(),
            },
        ];
        let kept = cap_per_file(drafts, 1);
        assert_eq!(kept.len(), 1);
        assert!(matches!(kept[0].severity, Severity::Critical));
    }

    #[test]
    fn build_summary_counts_by_severity() {
        let drafts = vec![
            finding(1, Severity::Critical, Category::Security),
            finding(2, Severity::Warning, Category::Bug),
        ]
        .iter()
        .map(|f| DraftComment {
            path: "a.rs".into(),
            line: f.line,
            position: f.line,
            severity: f.severity,
            category: f.category,
            body: build_body(f),
        })
        .collect::<Vec<_>>();
        let summary = build_summary(&drafts);
        assert!(summary.contains("2 issue"));
    }
}
