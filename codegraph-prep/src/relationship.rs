use serde::{Deserialize, Serialize};

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    FunctionCall,
    Import,
    Inheritance,
    Implementation,
    Usage,
    Composition,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::FunctionCall => "function_call",
            RelationshipType::Import => "import",
            RelationshipType::Inheritance => "inheritance",
            RelationshipType::Implementation => "implementation",
            RelationshipType::Usage => "usage",
            RelationshipType::Composition => "composition",
        }
    }
}

/// An edge discovered while walking a single file's syntax tree: a call, an
/// import, an `extends`/`implements` clause. Source and target are resolved
/// to graph node ids (`filePath:symbolName`) by the caller once the whole
/// repository has been chunked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeRelationship {
    pub relationship_type: RelationshipType,
    pub source: String,
    pub target: String,
    pub location: Span,
}
