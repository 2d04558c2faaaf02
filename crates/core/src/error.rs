use locator_embeddings::EmbeddingError;
use locator_protocol::{ErrorEnvelope, ErrorKind};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No candidate elements supplied")]
    NoCandidates,

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
}

impl ResolveError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NoCandidates => ErrorKind::NoCandidates,
            Self::EmbeddingUnavailable(_) => ErrorKind::EmbeddingUnavailable,
        }
    }

    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.kind(), self.to_string())
    }
}

impl From<EmbeddingError> for ResolveError {
    fn from(err: EmbeddingError) -> Self {
        Self::EmbeddingUnavailable(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}
