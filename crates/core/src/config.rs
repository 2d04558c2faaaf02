use crate::error::ConfigError;
use locator_embeddings::{EmbeddingConfig, DEFAULT_CACHE_CAPACITY};
use locator_protocol::DEFAULT_TOP_K;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_EMBED_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Stage-1 candidates kept for reranking when a request does not set `top_k`.
    pub top_k: usize,
    pub embed_timeout_ms: u64,
    /// Maximum number of signature vectors kept in memory.
    pub cache_capacity: usize,
    pub embedding: EmbeddingConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            embed_timeout_ms: DEFAULT_EMBED_TIMEOUT_MS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl ResolverConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Defaults, overlaid by the TOML file (if any), then by `LOCATOR_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                log::debug!("Loaded resolver config from {}", path.display());
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.embedding.apply_env()?;
        if let Some(top_k) = env_number("LOCATOR_TOP_K")? {
            self.top_k = top_k;
        }
        if let Some(timeout) = env_number("LOCATOR_EMBED_TIMEOUT_MS")? {
            self.embed_timeout_ms = timeout;
        }
        if let Some(capacity) = env_number("LOCATOR_CACHE_CAPACITY")? {
            self.cache_capacity = capacity;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be >= 1".to_string()));
        }
        if self.embed_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "embed_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache_capacity must be > 0".to_string(),
            ));
        }
        self.embedding.validate()?;
        Ok(())
    }

    #[must_use]
    pub const fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }
}

fn env_number<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::Invalid(format!("{key}='{raw}': {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locator_embeddings::EmbeddingMode;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn toml_overrides_only_listed_fields() {
        let config = ResolverConfig::from_toml_str(
            r#"
            top_k = 3

            [embedding]
            dimension = 128
            "#,
        )
        .unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.embed_timeout_ms, DEFAULT_EMBED_TIMEOUT_MS);
        assert_eq!(config.embedding.dimension, 128);
        assert_eq!(config.embedding.mode, EmbeddingMode::Hashed);
    }

    #[test]
    fn onnx_mode_parses_from_toml() {
        let config = ResolverConfig::from_toml_str(
            r#"
            [embedding]
            mode = "onnx"
            model_dir = "models/minilm"
            "#,
        )
        .unwrap();
        assert_eq!(config.embedding.mode, EmbeddingMode::Onnx);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut config = ResolverConfig::default();
        assert!(config.validate().is_ok());

        config.top_k = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config = ResolverConfig {
            cache_capacity: 0,
            ..ResolverConfig::default()
        };
        assert!(config.validate().is_err());

        config = ResolverConfig::default();
        config.embedding.dimension = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Embedding(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "embed_timeout_ms = 750").unwrap();
        file.flush().unwrap();
        let config = ResolverConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.embed_timeout(), Duration::from_millis(750));
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = ResolverConfig::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            ResolverConfig::from_toml_str("top_k = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
