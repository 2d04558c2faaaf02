use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, Result};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Read-through vector cache keyed by the exact embedded text.
///
/// Entries are pure functions of their key, so concurrent writers racing on the
/// same key store identical vectors and either write may win.
pub struct SignatureCache {
    entries: Mutex<LruCache<String, Arc<[f32]>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
}

impl SignatureCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<[f32]>> {
        let found = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, key: String, vector: Arc<[f32]>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, vector);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: self.len(),
        }
    }
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// An [`Embedder`] fronted by a [`SignatureCache`].
///
/// Safe to share across concurrent resolutions behind an `Arc`.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: SignatureCache,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        Self {
            inner,
            cache: SignatureCache::new(capacity),
        }
    }

    pub fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    pub fn cache(&self) -> &SignatureCache {
        &self.cache
    }

    /// Embed without consulting the cache (used for one-off instruction text).
    pub async fn embed_uncached(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.inner.embed(text).await?;
        let expected = self.inner.dimension();
        if vector.len() != expected {
            return Err(EmbeddingError::InvalidDimension {
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    /// Embed every text, computing each distinct uncached text once.
    pub async fn embed_all(&self, texts: &[String]) -> Result<Vec<Arc<[f32]>>> {
        let mut resolved: Vec<Option<Arc<[f32]>>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<String> = Vec::new();
        let mut missing_slot: HashMap<&str, usize> = HashMap::new();

        for text in texts {
            let cached = self.cache.get(text);
            if cached.is_none() && !missing_slot.contains_key(text.as_str()) {
                missing_slot.insert(text.as_str(), missing.len());
                missing.push(text.clone());
            }
            resolved.push(cached);
        }

        let mut fresh: Vec<Arc<[f32]>> = Vec::with_capacity(missing.len());
        if !missing.is_empty() {
            log::debug!(
                "Embedding {} of {} signatures ({} cached)",
                missing.len(),
                texts.len(),
                texts.len() - missing.len()
            );
            let vectors = self.inner.embed_batch(&missing).await?;
            if vectors.len() != missing.len() {
                return Err(EmbeddingError::Backend(format!(
                    "Embedding backend returned {} vectors for {} texts",
                    vectors.len(),
                    missing.len()
                )));
            }
            let expected = self.inner.dimension();
            for (text, vector) in missing.iter().zip(vectors) {
                if vector.len() != expected {
                    return Err(EmbeddingError::InvalidDimension {
                        expected,
                        actual: vector.len(),
                    });
                }
                let vector: Arc<[f32]> = vector.into();
                self.cache.insert(text.clone(), vector.clone());
                fresh.push(vector);
            }
        }

        texts
            .iter()
            .zip(resolved)
            .map(|(text, cached)| match cached {
                Some(vector) => Ok(vector),
                None => missing_slot
                    .get(text.as_str())
                    .and_then(|slot| fresh.get(*slot))
                    .cloned()
                    .ok_or_else(|| {
                        EmbeddingError::Backend(format!("No embedding produced for '{text}'"))
                    }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingModel;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    struct CountingEmbedder {
        model: EmbeddingModel,
        batch_calls: AtomicUsize,
        texts_embedded: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                model: EmbeddingModel::hashed(16),
                batch_calls: AtomicUsize::new(0),
                texts_embedded: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_id(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            self.model.dimension()
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
            self.model.embed_batch(texts).await
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn duplicate_signatures_embed_once() {
        let counting = Arc::new(CountingEmbedder::new());
        let cached = CachedEmbedder::new(counting.clone(), 8);

        let out = cached
            .embed_all(&texts(&["heading, name: Sign In", "button, name: Sign In", "heading, name: Sign In"]))
            .await
            .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], out[2]);
        assert_eq!(counting.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(counting.texts_embedded.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let counting = Arc::new(CountingEmbedder::new());
        let cached = CachedEmbedder::new(counting.clone(), 8);
        let input = texts(&["link, name: Home", "textbox, name: Email"]);

        let first = cached.embed_all(&input).await.unwrap();
        let second = cached.embed_all(&input).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(counting.batch_calls.load(Ordering::SeqCst), 1);
        let stats = cached.cache().stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.len, 2);
    }

    #[test]
    fn reinserting_same_key_is_idempotent() {
        let cache = SignatureCache::new(4);
        let vector: Arc<[f32]> = vec![0.5, 0.5].into();
        cache.insert("button".to_string(), vector.clone());
        cache.insert("button".to_string(), vector.clone());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("button"), Some(vector));
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let cache = SignatureCache::new(2);
        cache.insert("a".to_string(), vec![1.0].into());
        cache.insert("b".to_string(), vec![2.0].into());
        assert!(cache.get("a").is_some());
        cache.insert("c".to_string(), vec![3.0].into());
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_id(&self) -> &str {
            "short"
        }

        fn dimension(&self) -> usize {
            8
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0; 7]; texts.len()])
        }
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected_for_queries_and_signatures() {
        let cached = CachedEmbedder::new(Arc::new(ShortEmbedder), 8);

        let err = cached.embed_uncached("Click Sign In").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::InvalidDimension {
                expected: 8,
                actual: 7
            }
        ));

        let err = cached
            .embed_all(&texts(&["button, name: Sign In"]))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidDimension { .. }));
        assert!(cached.cache().is_empty());
    }

    #[tokio::test]
    async fn concurrent_callers_share_cache() {
        let counting = Arc::new(CountingEmbedder::new());
        let cached = Arc::new(CachedEmbedder::new(counting.clone(), 16));
        let input = texts(&["button, name: Save", "button, name: Cancel"]);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cached = cached.clone();
            let input = input.clone();
            handles.push(tokio::spawn(async move { cached.embed_all(&input).await }));
        }
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        for result in &results[1..] {
            assert_eq!(result, &results[0]);
        }
        assert_eq!(cached.cache().len(), 2);
    }
}
