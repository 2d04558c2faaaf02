//! # Locator Embeddings
//!
//! Text embeddings for element signatures and instructions.
//!
//! ## Backends
//!
//! - **hashed** (default): deterministic feature hashing, no model files, used in tests and CI
//! - **onnx** (cargo feature `onnx`): sentence-embedding model on ONNX Runtime
//!
//! ```text
//! signature text
//!     │
//!     ├──> SignatureCache (LRU, keyed by exact text)
//!     │
//!     └──> Embedder::embed_batch
//!            └─> Vec<f32>[dimension], L2-normalized
//! ```

mod cache;
mod embeddings;
mod error;
#[cfg(feature = "onnx")]
mod onnx;

pub use cache::{CacheStats, CachedEmbedder, SignatureCache, DEFAULT_CACHE_CAPACITY};
pub use embeddings::{
    cosine_similarity, similarity, Embedder, EmbeddingConfig, EmbeddingMode, EmbeddingModel,
    DEFAULT_DIMENSION,
};
pub use error::{EmbeddingError, Result};
