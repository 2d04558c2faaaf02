use crate::error::{ResolveError, Result};
use crate::signature::{extract, ElementSignature};
use locator_embeddings::{similarity, CachedEmbedder, EmbeddingError};
use locator_protocol::ElementDescriptor;
use std::time::Duration;

/// A Stage-1 survivor.
#[derive(Debug, Clone)]
pub struct Retrieved<'a> {
    /// Position of the descriptor in the input list.
    pub index: usize,
    pub descriptor: &'a ElementDescriptor,
    pub signature: ElementSignature,
    pub semantic_score: f32,
}

/// Stage 1: rank descriptors by instruction/signature similarity and keep the first `top_k`.
///
/// Equal similarities keep input order. The whole embedding step runs under `timeout`;
/// expiry fails the call rather than ranking a partial set.
pub async fn retrieve<'a>(
    embedder: &CachedEmbedder,
    instruction: &str,
    descriptors: &'a [ElementDescriptor],
    top_k: usize,
    timeout: Duration,
) -> Result<Vec<Retrieved<'a>>> {
    if top_k == 0 {
        return Err(ResolveError::InvalidInput("top_k must be >= 1".to_string()));
    }
    if descriptors.is_empty() {
        return Ok(Vec::new());
    }

    let signatures: Vec<ElementSignature> = descriptors.iter().map(extract).collect();
    let texts: Vec<String> = signatures.iter().map(|s| s.text.clone()).collect();

    let embedded = tokio::time::timeout(timeout, async {
        let query = embedder.embed_uncached(instruction).await?;
        let vectors = embedder.embed_all(&texts).await?;
        Ok::<_, EmbeddingError>((query, vectors))
    })
    .await;
    let (query, vectors) = match embedded {
        Ok(result) => result?,
        Err(_) => {
            #[allow(clippy::cast_possible_truncation)]
            let millis = timeout.as_millis() as u64;
            return Err(EmbeddingError::Timeout(millis).into());
        }
    };

    let mut ranked: Vec<Retrieved<'a>> = descriptors
        .iter()
        .zip(signatures)
        .zip(vectors)
        .enumerate()
        .map(|(index, ((descriptor, signature), vector))| Retrieved {
            index,
            descriptor,
            semantic_score: similarity(&query, &vector),
            signature,
        })
        .collect();

    ranked.sort_by(|a, b| b.semantic_score.total_cmp(&a.semantic_score));
    ranked.truncate(top_k);

    if log::log_enabled!(log::Level::Debug) {
        for candidate in &ranked {
            log::debug!(
                "stage1 #{} {:.4} {}",
                candidate.index,
                candidate.semantic_score,
                candidate.signature.text
            );
        }
    }
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use locator_embeddings::{Embedder, EmbeddingModel};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn embedder() -> CachedEmbedder {
        CachedEmbedder::new(Arc::new(EmbeddingModel::hashed(128)), 64)
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_id(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            8
        }

        async fn embed_batch(&self, _texts: &[String]) -> locator_embeddings::Result<Vec<Vec<f32>>> {
            Err(EmbeddingError::Backend("model crashed".to_string()))
        }
    }

    struct SlowEmbedder;

    #[async_trait]
    impl Embedder for SlowEmbedder {
        fn model_id(&self) -> &str {
            "slow"
        }

        fn dimension(&self) -> usize {
            8
        }

        async fn embed_batch(&self, texts: &[String]) -> locator_embeddings::Result<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![vec![0.0; 8]; texts.len()])
        }
    }

    #[tokio::test]
    async fn single_descriptor_is_always_returned() {
        let descriptors = vec![ElementDescriptor::with_role("img", "Company logo")];
        let out = retrieve(&embedder(), "Click checkout", &descriptors, 10, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 0);
    }

    #[tokio::test]
    async fn closer_signature_ranks_first() {
        let descriptors = vec![
            ElementDescriptor::with_role("link", "Privacy policy"),
            ElementDescriptor::with_role("button", "Add to cart"),
        ];
        let out = retrieve(&embedder(), "Add to cart", &descriptors, 1, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 1);
    }

    #[tokio::test]
    async fn equal_scores_keep_input_order() {
        let descriptors = vec![
            ElementDescriptor::with_role("button", "Save"),
            ElementDescriptor::with_role("button", "Save"),
            ElementDescriptor::with_role("button", "Save"),
        ];
        let out = retrieve(&embedder(), "Save", &descriptors, 10, TIMEOUT)
            .await
            .unwrap();
        let order: Vec<usize> = out.iter().map(|c| c.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn zero_top_k_is_invalid() {
        let descriptors = vec![ElementDescriptor::with_role("button", "Save")];
        let err = retrieve(&embedder(), "Save", &descriptors, 0, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn backend_failure_is_embedding_unavailable() {
        let failing = CachedEmbedder::new(Arc::new(FailingEmbedder), 8);
        let descriptors = vec![ElementDescriptor::with_role("button", "Save")];
        let err = retrieve(&failing, "Save", &descriptors, 10, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::EmbeddingUnavailable(_)));
        assert!(err.to_string().contains("model crashed"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_embedding_unavailable() {
        let slow = CachedEmbedder::new(Arc::new(SlowEmbedder), 8);
        let descriptors = vec![ElementDescriptor::with_role("button", "Save")];
        let err = retrieve(&slow, "Save", &descriptors, 10, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::EmbeddingUnavailable(_)));
        assert!(err.to_string().contains("50 ms"));
        assert!(slow.cache().is_empty());
    }

    proptest! {
        #[test]
        fn output_is_bounded_ordered_subsequence(
            names in proptest::collection::vec("[a-z]{1,8}( [a-z]{1,8})?", 1..12),
            top_k in 1usize..15,
            instruction in "[a-z]{1,8}( [a-z]{1,8}){0,3}",
        ) {
            let descriptors: Vec<ElementDescriptor> = names
                .iter()
                .map(|name| ElementDescriptor::with_role("button", name))
                .collect();
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let out = runtime
                .block_on(retrieve(&embedder(), &instruction, &descriptors, top_k, TIMEOUT))
                .unwrap();

            prop_assert_eq!(out.len(), top_k.min(descriptors.len()));
            for pair in out.windows(2) {
                prop_assert!(pair[0].semantic_score >= pair[1].semantic_score);
                if pair[0].semantic_score == pair[1].semantic_score {
                    prop_assert!(pair[0].index < pair[1].index);
                }
            }
            for candidate in &out {
                prop_assert!((0.0..=1.0).contains(&candidate.semantic_score));
                prop_assert_eq!(candidate.descriptor, &descriptors[candidate.index]);
            }
        }
    }
}
