use crate::error::{EmbeddingError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use unicode_segmentation::UnicodeSegmentation;

pub const DEFAULT_DIMENSION: usize = 384;
const TRIGRAM_WEIGHT: f32 = 0.5;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    /// Deterministic feature hashing; needs no model files.
    #[default]
    Hashed,
    /// Sentence-embedding model on ONNX Runtime.
    Onnx,
}

impl EmbeddingMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hashed => "hashed",
            Self::Onnx => "onnx",
        }
    }
}

impl FromStr for EmbeddingMode {
    type Err = EmbeddingError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hashed" | "stub" => Ok(Self::Hashed),
            "onnx" => Ok(Self::Onnx),
            other => Err(EmbeddingError::Config(format!(
                "Unsupported embedding mode '{other}' (expected 'hashed' or 'onnx')"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,
    pub dimension: usize,
    /// Directory holding `model.onnx` and `tokenizer.json`.
    pub model_dir: Option<PathBuf>,
    pub max_length: usize,
    pub max_batch: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Hashed,
            dimension: DEFAULT_DIMENSION,
            model_dir: None,
            max_length: 128,
            max_batch: 32,
        }
    }
}

impl EmbeddingConfig {
    /// Apply `LOCATOR_EMBEDDING_MODE`, `LOCATOR_MODEL_DIR` and `LOCATOR_EMBEDDING_DIM`.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(raw) = env::var("LOCATOR_EMBEDDING_MODE") {
            self.mode = raw.parse()?;
        }
        if let Ok(dir) = env::var("LOCATOR_MODEL_DIR") {
            self.model_dir = Some(PathBuf::from(dir));
        }
        if let Ok(raw) = env::var("LOCATOR_EMBEDDING_DIM") {
            self.dimension = raw.trim().parse().map_err(|e| {
                EmbeddingError::Config(format!("Invalid LOCATOR_EMBEDDING_DIM '{raw}': {e}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(EmbeddingError::Config("dimension must be > 0".to_string()));
        }
        if self.max_batch == 0 {
            return Err(EmbeddingError::Config("max_batch must be > 0".to_string()));
        }
        if self.mode == EmbeddingMode::Onnx && self.model_dir.is_none() {
            return Err(EmbeddingError::Config(
                "onnx mode requires model_dir (or LOCATOR_MODEL_DIR)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Maps text to fixed-size vectors. Implementations must be deterministic per text.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| EmbeddingError::Backend("Empty embedding result".to_string()))
    }
}

/// Embedding model selected by [`EmbeddingConfig`].
pub struct EmbeddingModel {
    backend: EmbeddingBackend,
    model_id: String,
    dimension: usize,
}

enum EmbeddingBackend {
    Hashed,
    #[cfg(feature = "onnx")]
    Onnx(std::sync::Arc<crate::onnx::OrtBackend>),
}

impl EmbeddingModel {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        config.validate()?;
        match config.mode {
            EmbeddingMode::Hashed => Ok(Self::hashed(config.dimension)),
            EmbeddingMode::Onnx => Self::onnx(config),
        }
    }

    #[must_use]
    pub fn hashed(dimension: usize) -> Self {
        Self {
            backend: EmbeddingBackend::Hashed,
            model_id: format!("hashed-{dimension}"),
            dimension,
        }
    }

    #[cfg(feature = "onnx")]
    fn onnx(config: &EmbeddingConfig) -> Result<Self> {
        let backend = crate::onnx::OrtBackend::load(config)?;
        Ok(Self {
            model_id: backend.model_id().to_string(),
            dimension: backend.dimension(),
            backend: EmbeddingBackend::Onnx(std::sync::Arc::new(backend)),
        })
    }

    #[cfg(not(feature = "onnx"))]
    fn onnx(_config: &EmbeddingConfig) -> Result<Self> {
        Err(EmbeddingError::Unavailable(
            "this build has no ONNX support (enable the `onnx` feature)".to_string(),
        ))
    }
}

#[async_trait]
impl Embedder for EmbeddingModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        match &self.backend {
            EmbeddingBackend::Hashed => Ok(texts
                .iter()
                .map(|text| hashed_embed(text, self.dimension))
                .collect()),
            #[cfg(feature = "onnx")]
            EmbeddingBackend::Onnx(backend) => {
                let backend = backend.clone();
                let owned = texts.to_vec();
                tokio::task::spawn_blocking(move || backend.embed_batch_blocking(&owned))
                    .await
                    .map_err(|e| EmbeddingError::Backend(format!("Join error: {e}")))?
            }
        }
    }
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Relevance in `[0, 1]`: cosine similarity with negative values clamped to zero.
#[must_use]
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    let cosine = cosine_similarity(a, b);
    if cosine.is_finite() {
        cosine.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub(crate) fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

/// Signed feature hashing over lowercase words and their boundary-marked trigrams.
fn hashed_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dimension];
    if dimension == 0 {
        return vec;
    }
    for word in text.unicode_words() {
        let word = word.to_lowercase();
        add_feature(&mut vec, word.as_bytes(), 1.0);

        let marked: Vec<char> = std::iter::once('#')
            .chain(word.chars())
            .chain(std::iter::once('#'))
            .collect();
        for gram in marked.windows(3) {
            let gram: String = gram.iter().collect();
            add_feature(&mut vec, gram.as_bytes(), TRIGRAM_WEIGHT);
        }
    }
    normalize(&mut vec);
    vec
}

fn add_feature(vec: &mut [f32], bytes: &[u8], weight: f32) {
    let mut state = fnv1a_64(bytes);
    let bits = splitmix64(&mut state);
    #[allow(clippy::cast_possible_truncation)]
    let idx = (bits % vec.len() as u64) as usize;
    let sign = if bits >> 63 == 0 { 1.0 } else { -1.0 };
    vec[idx] += sign * weight;
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
