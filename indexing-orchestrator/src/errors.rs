use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexingError {
    #[error("git error: {0}")]
    Git(#[from] git_adapter::errors::GitAdapterError),

    #[error("database error: {0}")]
    Rag(#[from] rag_store::RagError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexingError>;
