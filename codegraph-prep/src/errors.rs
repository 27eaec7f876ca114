use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkerError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("failed to set tree-sitter language for {language}: {source}")]
    LanguageSetup {
        language: String,
        #[source]
        source: tree_sitter::LanguageError,
    },

    #[error("tree-sitter failed to parse {file_path}")]
    ParseFailed { file_path: String },

    #[error("invalid query for {language}: {source}")]
    InvalidQuery {
        language: String,
        #[source]
        source: tree_sitter::QueryError,
    },
}

pub type Result<T> = std::result::Result<T, ChunkerError>;
