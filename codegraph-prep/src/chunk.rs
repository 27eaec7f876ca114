//! Chunk data model produced by the tree chunker and enriched by the
//! metrics pass.

use serde::{Deserialize, Serialize};

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Code,
    Comment,
    Docs,
    Class,
    Function,
    Method,
    Interface,
    Type,
    Struct,
    Property,
    ArrowFunction,
    Module,
    Enum,
    Component,
    Trait,
    Import,
    Require,
    Using,
    Namespace,
    Use,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Code => "code",
            ChunkType::Comment => "comment",
            ChunkType::Docs => "docs",
            ChunkType::Class => "class",
            ChunkType::Function => "function",
            ChunkType::Method => "method",
            ChunkType::Interface => "interface",
            ChunkType::Type => "type",
            ChunkType::Struct => "struct",
            ChunkType::Property => "property",
            ChunkType::ArrowFunction => "arrow_function",
            ChunkType::Module => "module",
            ChunkType::Enum => "enum",
            ChunkType::Component => "component",
            ChunkType::Trait => "trait",
            ChunkType::Import => "import",
            ChunkType::Require => "require",
            ChunkType::Using => "using",
            ChunkType::Namespace => "namespace",
            ChunkType::Use => "use",
        }
    }
}

/// A syntactic unit carved out of a source file by the tree chunker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    pub id: String,
    pub repository_id: String,
    pub file_path: String,
    pub language: String,
    pub chunk_type: ChunkType,
    pub symbol_name: Option<String>,
    pub span: Span,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SemanticType {
    Authentication,
    Authorization,
    DataAccess,
    UiComponent,
    ApiEndpoint,
    Test,
    Validation,
    ErrorHandling,
    Config,
    Utility,
    BusinessLogic,
    Unclassified,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Authentication => "authentication",
            SemanticType::Authorization => "authorization",
            SemanticType::DataAccess => "data-access",
            SemanticType::UiComponent => "ui-component",
            SemanticType::ApiEndpoint => "api-endpoint",
            SemanticType::Test => "test",
            SemanticType::Validation => "validation",
            SemanticType::ErrorHandling => "error-handling",
            SemanticType::Config => "config",
            SemanticType::Utility => "utility",
            SemanticType::BusinessLogic => "business-logic",
            SemanticType::Unclassified => "unclassified",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    pub cyclomatic: u32,
    pub cognitive: u32,
    pub max_nesting_depth: u32,
    pub parameter_count: u32,
}

/// A `CodeChunk` after the metrics pass has annotated it with complexity,
/// semantic classification, change-frequency, and tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedChunk {
    #[serde(flatten)]
    pub chunk: CodeChunk,
    pub metrics: ComplexityMetrics,
    pub semantic_type: SemanticType,
    pub change_frequency: f64,
    pub tags: Vec<String>,
}
