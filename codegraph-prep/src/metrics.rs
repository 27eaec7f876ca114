//! Code Metrics: complexity, semantic classification and tagging for a
//! single chunk. Operates purely on the chunk's text plus a few graph facts
//! handed in by the caller (dependency/dependent counts), so it has no
//! dependency on tree-sitter itself.

use regex::Regex;
use std::sync::OnceLock;

use crate::chunk::{ChunkType, ComplexityMetrics, SemanticType};

fn cyclomatic_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(if|else if|for|while|do|switch|case|catch)\b|(&&|\|\||\?)").unwrap()
    })
}

fn parameter_signature_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:function\s*\*?\s*\w*|=>|[\w$]+)\s*\(([^)]*)\)").unwrap()
    })
}

fn long_identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Za-z_$][A-Za-z0-9_$]{24,}\b").unwrap())
}

/// `cyclomatic = 1 + count(branching keywords and operators)`.
pub fn cyclomatic_complexity(content: &str) -> u32 {
    1 + cyclomatic_keyword_re().find_iter(content).count() as u32
}

/// Running brace-balance per line, maxed over the whole chunk.
pub fn max_nesting_depth(content: &str) -> u32 {
    let mut depth: i32 = 0;
    let mut max_depth: i32 = 0;
    for ch in content.chars() {
        match ch {
            '{' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            '}' => depth = (depth - 1).max(0),
            _ => {}
        }
    }
    max_depth.max(0) as u32
}

fn return_count(content: &str) -> u32 {
    content.matches("return").count() as u32
}

fn mixed_logical_expr_count(content: &str) -> u32 {
    content.lines().filter(|l| l.contains("&&") && l.contains("||")).count() as u32
}

/// `cognitive = 2*nesting + max(0, returns-1) + longIdentifiers + 2*mixedLogicalExprs + cyclomatic/2`.
pub fn cognitive_complexity(content: &str, nesting: u32, cyclomatic: u32) -> u32 {
    let long_identifiers = long_identifier_re().find_iter(content).count() as u32;
    let returns = return_count(content);
    2 * nesting
        + returns.saturating_sub(1)
        + long_identifiers
        + 2 * mixed_logical_expr_count(content)
        + cyclomatic / 2
}

pub fn parameter_count(content: &str) -> u32 {
    let Some(caps) = parameter_signature_re().captures(content) else {
        return 0;
    };
    let params = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
    if params.is_empty() {
        0
    } else {
        params.split(',').filter(|p| !p.trim().is_empty()).count() as u32
    }
}

pub fn complexity_metrics(content: &str) -> ComplexityMetrics {
    let cyclomatic = cyclomatic_complexity(content);
    let nesting = max_nesting_depth(content);
    ComplexityMetrics {
        cyclomatic,
        cognitive: cognitive_complexity(content, nesting, cyclomatic),
        max_nesting_depth: nesting,
        parameter_count: parameter_count(content),
    }
}

/// Keyword priority order: the first bucket whose keywords appear in the
/// symbol name or content wins. Falls back to `business-logic` for
/// function/method chunks and `unclassified` otherwise.
pub fn classify_semantic_type(chunk_type: ChunkType, symbol_name: Option<&str>, content: &str) -> SemanticType {
    let haystack = format!("{} {}", symbol_name.unwrap_or(""), content).to_lowercase();

    const BUCKETS: &[(SemanticType, &[&str])] = &[
        (SemanticType::Authentication, &["auth", "login", "signin", "signup", "credential", "password"]),
        (SemanticType::Authorization, &["permission", "role", "authoriz", "acl", "can_access", "canaccess"]),
        (SemanticType::DataAccess, &["repository", "query", "select ", "insert ", "update ", "delete ", "database", "db.", "sql"]),
        (SemanticType::UiComponent, &["render", "component", "jsx", "props", "usestate", "useeffect"]),
        (SemanticType::ApiEndpoint, &["router", "endpoint", "@get", "@post", "handler", "request", "response"]),
        (SemanticType::Test, &["test(", "describe(", "it(", "expect(", "assert", "mock"]),
        (SemanticType::Validation, &["validate", "schema", "sanitize", "isvalid"]),
        (SemanticType::ErrorHandling, &["catch", "throw", "error", "exception"]),
        (SemanticType::Config, &["config", "settings", "environment", "env."]),
        (SemanticType::Utility, &["util", "helper", "format", "parse"]),
    ];

    for (kind, keywords) in BUCKETS {
        if keywords.iter().any(|kw| haystack.contains(kw)) {
            return *kind;
        }
    }

    match chunk_type {
        ChunkType::Function | ChunkType::Method | ChunkType::ArrowFunction => SemanticType::BusinessLogic,
        _ => SemanticType::Unclassified,
    }
}

pub struct TagInputs<'a> {
    pub chunk_type: ChunkType,
    pub language: &'a str,
    pub symbol_name: Option<&'a str>,
    pub metrics: &'a ComplexityMetrics,
    pub semantic_type: SemanticType,
    pub dependency_count: usize,
    pub dependent_count: usize,
    pub line_count: usize,
}

/// Always includes the semantic type; adds threshold-triggered complexity
/// tags and descriptive `lang:`/`type:`/`symbol:` tags.
pub fn derive_tags(input: TagInputs<'_>) -> Vec<String> {
    let mut tags = vec![input.semantic_type.as_str().to_string()];

    if input.metrics.cyclomatic > 10 {
        tags.push("high-cyclomatic-complexity".to_string());
    }
    if input.metrics.cognitive > 15 {
        tags.push("high-cognitive-complexity".to_string());
    }
    if input.metrics.max_nesting_depth > 3 {
        tags.push("deeply-nested".to_string());
    }
    if input.dependency_count > 5 {
        tags.push("many-dependencies".to_string());
    }
    if input.dependent_count > 5 {
        tags.push("highly-depended-on".to_string());
    }
    if input.line_count > 100 {
        tags.push("long-code-block".to_string());
    }

    tags.push(format!("lang:{}", input.language));
    tags.push(format!("type:{}", input.chunk_type.as_str()));
    if let Some(symbol) = input.symbol_name {
        tags.push(format!("symbol:{symbol}"));
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclomatic_counts_branches_and_logical_operators() {
        let content = "if (a && b) { } else if (c) { } for (;;) {}";
        assert_eq!(cyclomatic_complexity(content), 1 + 4);
    }

    #[test]
    fn nesting_depth_tracks_brace_balance() {
        let content = "fn f() { if a { if b { } } }";
        assert_eq!(max_nesting_depth(content), 3);
    }

    #[test]
    fn parameter_count_parses_simple_signature() {
        assert_eq!(parameter_count("function foo(a, b, c) {}"), 3);
        assert_eq!(parameter_count("function foo() {}"), 0);
    }

    #[test]
    fn classify_authentication_before_business_logic() {
        let kind = classify_semantic_type(ChunkType::Function, Some("loginUser"), "checkPassword(user)");
        assert_eq!(kind, SemanticType::Authentication);
    }

    #[test]
    fn tags_include_semantic_and_threshold_tags() {
        let metrics = ComplexityMetrics {
            cyclomatic: 11,
            cognitive: 16,
            max_nesting_depth: 4,
            parameter_count: 2,
        };
        let tags = derive_tags(TagInputs {
            chunk_type: ChunkType::Function,
            language: "typescript",
            symbol_name: Some("doThing"),
            metrics: &metrics,
            semantic_type: SemanticType::BusinessLogic,
            dependency_count: 6,
            dependent_count: 6,
            line_count: 101,
        });
        assert!(tags.contains(&"business-logic".to_string()));
        assert!(tags.contains(&"high-cyclomatic-complexity".to_string()));
        assert!(tags.contains(&"high-cognitive-complexity".to_string()));
        assert!(tags.contains(&"deeply-nested".to_string()));
        assert!(tags.contains(&"many-dependencies".to_string()));
        assert!(tags.contains(&"highly-depended-on".to_string()));
        assert!(tags.contains(&"long-code-block".to_string()));
        assert!(tags.contains(&"symbol:doThing".to_string()));
    }
}
