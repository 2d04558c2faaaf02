use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding backend unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding timed out after {0} ms")]
    Timeout(u64),

    #[error("Embedding backend error: {0}")]
    Backend(String),

    #[error("Invalid embedding configuration: {0}")]
    Config(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}
