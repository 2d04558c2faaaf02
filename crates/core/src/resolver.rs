use crate::config::ResolverConfig;
use crate::error::{ResolveError, Result};
use crate::intent::detect;
use crate::locator::synthesize_from;
use crate::rerank::{rerank, ScoredCandidate};
use crate::retrieve::retrieve;
use crate::signature::extract;
use crate::tree::flatten_tree;
use locator_embeddings::{CachedEmbedder, Embedder, EmbeddingModel};
use locator_protocol::{
    AccessibilityNode, ActionCategory, CandidateBreakdown, CandidateView, DebugTrace,
    ElementDescriptor, ElementLocators, LocatorsRequest, ResolveRequest, ResolveResponse,
};
use std::sync::Arc;
use std::time::Instant;

/// Ranked outcome of one resolution call. `candidates` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    pub action_category: ActionCategory,
    pub candidates: Vec<ScoredCandidate>,
    pub debug: bool,
}

impl ResolutionResult {
    #[must_use]
    pub fn top(&self) -> Option<&ScoredCandidate> {
        self.candidates.first()
    }

    pub fn into_response(self) -> Result<ResolveResponse> {
        let top = self.candidates.first().ok_or(ResolveError::NoCandidates)?;
        let best = top.locators.first().ok_or_else(|| {
            ResolveError::InvalidInput(format!("element #{} has no locator", top.index))
        })?;

        let debug = self.debug.then(|| DebugTrace {
            action_category: self.action_category,
            breakdown: top.breakdown,
            candidates: self
                .candidates
                .iter()
                .map(|c| CandidateBreakdown {
                    index: c.index,
                    signature: c.signature.text.clone(),
                    breakdown: c.breakdown,
                })
                .collect(),
        });

        Ok(ResolveResponse {
            locator: best.locator.clone(),
            locator_kind: best.kind,
            signature: top.signature.text.clone(),
            score: top.final_score,
            semantic_score: top.semantic_score,
            heuristic_bonus: top.heuristic_bonus,
            all_candidates: self
                .candidates
                .iter()
                .map(|c| CandidateView {
                    index: c.index,
                    signature: c.signature.text.clone(),
                    final_score: c.final_score,
                    semantic_score: c.semantic_score,
                    heuristic_bonus: c.heuristic_bonus,
                    locators: c.locators.clone(),
                })
                .collect(),
            debug,
        })
    }
}

/// Two-stage resolver. Share behind an `Arc`; concurrent calls only share the signature cache.
pub struct Resolver {
    embedder: CachedEmbedder,
    config: ResolverConfig,
}

impl Resolver {
    /// Build the configured embedding backend. Backend failures map to `EmbeddingUnavailable`.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ResolveError::InvalidInput(e.to_string()))?;
        let model = EmbeddingModel::new(&config.embedding)?;
        log::info!(
            "Resolver ready (model {}, dim {}, top_k {})",
            model.model_id(),
            model.dimension(),
            config.top_k
        );
        Ok(Self::with_embedder(config, Arc::new(model)))
    }

    #[must_use]
    pub fn with_embedder(config: ResolverConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder: CachedEmbedder::new(embedder, config.cache_capacity),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        self.embedder.model_id()
    }

    #[must_use]
    pub const fn embedder(&self) -> &CachedEmbedder {
        &self.embedder
    }

    /// Resolve a wire request, including any accessibility tree it carries.
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse> {
        let descriptors = collect_descriptors(
            &request.elements,
            request.accessibility_tree.as_ref(),
            request.include_ignored,
        );
        let top_k = request.top_k.unwrap_or(self.config.top_k);
        self.resolve_descriptors(&request.instruction, &descriptors, top_k, request.debug)
            .await?
            .into_response()
    }

    /// Stage 1 then Stage 2 over `descriptors`.
    pub async fn resolve_descriptors(
        &self,
        instruction: &str,
        descriptors: &[ElementDescriptor],
        top_k: usize,
        debug: bool,
    ) -> Result<ResolutionResult> {
        if instruction.trim().is_empty() {
            return Err(ResolveError::InvalidInput(
                "instruction must not be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(ResolveError::InvalidInput("top_k must be >= 1".to_string()));
        }
        if descriptors.is_empty() {
            return Err(ResolveError::NoCandidates);
        }
        validate_descriptors(descriptors)?;

        let started = Instant::now();
        let action_category = detect(instruction);
        log::debug!("Action category for {instruction:?}: {action_category}");

        let retrieved = retrieve(
            &self.embedder,
            instruction,
            descriptors,
            top_k,
            self.config.embed_timeout(),
        )
        .await?;
        let candidates = rerank(instruction, action_category, retrieved);

        if let Some(top) = candidates.first() {
            log::info!(
                "Resolved {} chars against {} elements in {:?}: #{} {:.3} ({})",
                instruction.chars().count(),
                descriptors.len(),
                started.elapsed(),
                top.index,
                top.final_score,
                top.signature.text
            );
        }

        Ok(ResolutionResult {
            action_category,
            candidates,
            debug,
        })
    }
}

/// Signatures and locators for every element of a listing request. Needs no embeddings.
pub fn list_locators(request: &LocatorsRequest) -> Result<Vec<ElementLocators>> {
    let descriptors = collect_descriptors(
        &request.elements,
        request.accessibility_tree.as_ref(),
        request.include_ignored,
    );
    if descriptors.is_empty() {
        return Err(ResolveError::NoCandidates);
    }
    validate_descriptors(&descriptors)?;
    Ok(describe_elements(&descriptors))
}

/// Signature and ranked locators for each descriptor, in input order.
#[must_use]
pub fn describe_elements(descriptors: &[ElementDescriptor]) -> Vec<ElementLocators> {
    descriptors
        .iter()
        .enumerate()
        .map(|(index, descriptor)| {
            let signature = extract(descriptor);
            ElementLocators {
                index,
                locators: synthesize_from(&signature.metadata),
                signature: signature.text,
            }
        })
        .collect()
}

/// Explicit elements first, then flattened tree nodes.
fn collect_descriptors(
    elements: &[ElementDescriptor],
    tree: Option<&AccessibilityNode>,
    include_ignored: bool,
) -> Vec<ElementDescriptor> {
    let mut descriptors = elements.to_vec();
    if let Some(root) = tree {
        descriptors.extend(flatten_tree(root, include_ignored));
    }
    descriptors
}

fn validate_descriptors(descriptors: &[ElementDescriptor]) -> Result<()> {
    match descriptors.iter().position(ElementDescriptor::is_untyped) {
        Some(index) => Err(ResolveError::InvalidInput(format!(
            "element #{index} has neither role nor tag"
        ))),
        None => Ok(()),
    }
}
