use crate::intent::rule_for;
use crate::locator::synthesize_from;
use crate::retrieve::Retrieved;
use crate::signature::{ElementSignature, SignatureMetadata};
use crate::text::word_set;
use locator_protocol::{ActionCategory, BonusBreakdown, LocatorCandidate};
use std::collections::BTreeSet;

pub const MAX_HEURISTIC_BONUS: f32 = 1.0;
pub const EXPLICIT_MENTION_BONUS: f32 = 0.75;
const CONTEXT_BASE: f32 = 0.1;
const CONTEXT_SCALE: f32 = 0.1;

/// A Stage-1 candidate after heuristic rescoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub index: usize,
    pub signature: ElementSignature,
    pub semantic_score: f32,
    /// Capped sum of the breakdown components.
    pub heuristic_bonus: f32,
    /// `semantic_score + heuristic_bonus`, deliberately uncapped (max 2.0).
    pub final_score: f32,
    pub breakdown: BonusBreakdown,
    /// Locators for the element, best first.
    pub locators: Vec<LocatorCandidate>,
}

/// Stage 2: add actionability bonuses to each Stage-1 candidate and reorder.
///
/// Ordering is `final_score` desc, then `semantic_score` desc, then Stage-1 order.
#[must_use]
pub fn rerank(
    instruction: &str,
    category: ActionCategory,
    candidates: Vec<Retrieved<'_>>,
) -> Vec<ScoredCandidate> {
    let instruction_words = word_set(instruction);

    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let breakdown = bonus_breakdown(&instruction_words, category, &candidate.signature);
            log::debug!(
                "stage2 #{} {:?} type={:.2} context={:.3} mention={:.2} total={:.3}",
                candidate.index,
                category,
                breakdown.element_type,
                breakdown.context,
                breakdown.explicit_mention,
                breakdown.total
            );
            ScoredCandidate {
                index: candidate.index,
                semantic_score: candidate.semantic_score,
                heuristic_bonus: breakdown.total,
                final_score: candidate.semantic_score + breakdown.total,
                breakdown,
                locators: synthesize_from(&candidate.signature.metadata),
                signature: candidate.signature,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| b.semantic_score.total_cmp(&a.semantic_score))
    });
    scored
}

fn bonus_breakdown(
    instruction_words: &BTreeSet<String>,
    category: ActionCategory,
    signature: &ElementSignature,
) -> BonusBreakdown {
    let rule = rule_for(category);
    let element_type = rule
        .filter(|rule| rule.prefers(&signature.metadata))
        .map_or(0.0, |rule| rule.bonus);
    let context = context_bonus(instruction_words, &signature.metadata);
    let explicit_mention = if rule.is_some() && mentions(instruction_words, &signature.metadata) {
        EXPLICIT_MENTION_BONUS
    } else {
        0.0
    };

    BonusBreakdown {
        element_type,
        context,
        explicit_mention,
        total: (element_type + context + explicit_mention).min(MAX_HEURISTIC_BONUS),
    }
}

/// 0.1 to 0.2, scaled by the share of instruction words found in the element's content.
///
/// Overlap is taken against [`SignatureMetadata::content_words`], so the signature's own key
/// labels (`name`, `placeholder`, `true`, ...) never count as a match.
fn context_bonus(instruction_words: &BTreeSet<String>, meta: &SignatureMetadata) -> f32 {
    if instruction_words.is_empty() {
        return 0.0;
    }
    let common = instruction_words.intersection(&meta.content_words()).count();
    if common == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = common as f32 / instruction_words.len() as f32;
    CONTEXT_BASE + CONTEXT_SCALE * ratio
}

/// True when the instruction names the element's kind ("button", "link", "field", ...).
fn mentions(instruction_words: &BTreeSet<String>, meta: &SignatureMetadata) -> bool {
    let kinds = [meta.role.as_deref(), meta.tag.as_deref()];
    kinds.into_iter().flatten().any(|kind| {
        (kind.chars().count() >= 2 && instruction_words.contains(kind))
            || kind_aliases(kind)
                .iter()
                .any(|alias| instruction_words.contains(*alias))
    })
}

fn kind_aliases(kind: &str) -> &'static [&'static str] {
    match kind {
        "a" | "link" => &["link"],
        "textbox" | "searchbox" | "input" | "textarea" => &["field", "textbox", "input"],
        "combobox" | "select" | "listbox" => &["dropdown", "combobox", "listbox"],
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "heading" => &["heading", "title", "header"],
        "img" | "image" => &["image", "picture"],
        "checkbox" => &["checkbox"],
        "radio" => &["radio"],
        "tab" => &["tab"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::detect;
    use crate::signature::extract;
    use locator_protocol::ElementDescriptor;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn retrieved<'a>(descriptors: &'a [ElementDescriptor], scores: &[f32]) -> Vec<Retrieved<'a>> {
        descriptors
            .iter()
            .zip(scores)
            .enumerate()
            .map(|(index, (descriptor, score))| Retrieved {
                index,
                descriptor,
                signature: extract(descriptor),
                semantic_score: *score,
            })
            .collect()
    }

    #[test]
    fn button_beats_heading_with_same_text() {
        let descriptors = vec![
            ElementDescriptor::with_role("heading", "Sign In"),
            ElementDescriptor::with_role("button", "Sign In"),
        ];
        let instruction = "Click the Sign In button";
        let out = rerank(
            instruction,
            detect(instruction),
            retrieved(&descriptors, &[0.80, 0.70]),
        );
        assert_eq!(out[0].index, 1);
        assert_eq!(out[0].breakdown.element_type, 0.5);
        assert_eq!(out[0].breakdown.explicit_mention, EXPLICIT_MENTION_BONUS);
        assert_eq!(out[0].heuristic_bonus, MAX_HEURISTIC_BONUS);
        assert_eq!(out[1].breakdown.element_type, 0.0);
        assert_eq!(out[1].breakdown.explicit_mention, 0.0);
    }

    fn meta(role: &str, name: &str) -> SignatureMetadata {
        extract(&ElementDescriptor::with_role(role, name)).metadata
    }

    #[test]
    fn context_bonus_scales_with_overlap() {
        let words = word_set("sign in now");
        let full = context_bonus(&words, &meta("button", "Sign In Now"));
        let partial = context_bonus(&words, &meta("button", "Sign up"));
        let none = context_bonus(&words, &meta("link", "Home"));
        assert!((full - 0.2).abs() < 1e-6);
        assert!((partial - (0.1 + 0.1 / 3.0)).abs() < 1e-6);
        assert_eq!(none, 0.0);
    }

    #[test]
    fn key_labels_do_not_count_as_overlap() {
        let words = word_set("Enter your name");
        assert_eq!(context_bonus(&words, &meta("heading", "Profile")), 0.0);
        let field = context_bonus(&words, &meta("textbox", "Full name"));
        assert!((field - (0.1 + 0.1 / 3.0)).abs() < 1e-6);

        let required = ElementDescriptor {
            state: locator_protocol::ElementState {
                required: true,
                ..Default::default()
            },
            ..ElementDescriptor::with_role("checkbox", "Terms")
        };
        let flagged = extract(&required).metadata;
        assert_eq!(context_bonus(&word_set("is it true"), &flagged), 0.0);
    }

    #[test]
    fn no_category_means_no_type_or_mention_bonus() {
        let descriptors = vec![ElementDescriptor::with_role("button", "button")];
        let out = rerank("button", ActionCategory::None, retrieved(&descriptors, &[0.5]));
        assert_eq!(out[0].breakdown.element_type, 0.0);
        assert_eq!(out[0].breakdown.explicit_mention, 0.0);
        assert!(out[0].breakdown.context > 0.0);
    }

    #[test]
    fn ties_fall_back_to_semantic_then_stage1_order() {
        let descriptors = vec![
            ElementDescriptor::with_role("link", "Docs"),
            ElementDescriptor::with_role("link", "Blog"),
            ElementDescriptor::with_role("link", "Home"),
        ];
        let out = rerank("Open", ActionCategory::None, retrieved(&descriptors, &[0.3, 0.3, 0.3]));
        let order: Vec<usize> = out.iter().map(|c| c.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn max_final_score_needs_both_maxima() {
        let descriptors = vec![ElementDescriptor::with_role("button", "Submit")];
        let top = rerank(
            "click button",
            ActionCategory::Click,
            retrieved(&descriptors, &[1.0]),
        );
        assert_eq!(top[0].final_score, 2.0);

        let weak = rerank(
            "click button",
            ActionCategory::Click,
            retrieved(&descriptors, &[0.4]),
        );
        assert!(weak[0].final_score < 2.0);

        let plain = rerank("Submit", ActionCategory::None, retrieved(&descriptors, &[1.0]));
        assert!(plain[0].final_score < 2.0);
    }

    #[test]
    fn aliases_cover_field_wording() {
        let meta = extract(&ElementDescriptor::with_role("textbox", "Email")).metadata;
        assert!(mentions(&word_set("type into the email field"), &meta));
        let heading = extract(&ElementDescriptor::with_role("heading", "Email")).metadata;
        assert!(!mentions(&word_set("type into the email field"), &heading));
        let anchor = extract(&ElementDescriptor::with_tag("a", "Docs")).metadata;
        assert!(mentions(&word_set("click the docs link"), &anchor));
        assert!(!mentions(&word_set("a docs page"), &anchor));
    }

    #[test]
    fn locators_are_attached() {
        let descriptors = vec![ElementDescriptor::with_role("button", "Sign In")];
        let out = rerank("Click Sign In", ActionCategory::Click, retrieved(&descriptors, &[0.6]));
        assert!(!out[0].locators.is_empty());
        assert_eq!(
            out[0].locators[0].locator,
            "page.get_by_role(\"button\", { name: \"Sign In\" })"
        );
    }

    proptest! {
        #[test]
        fn heuristic_bonus_is_capped(
            instruction in "(click|type|select|verify|button|field|link|sign|in|email| ){1,12}",
            role in "(button|link|textbox|heading|combobox|generic)",
            name in "[A-Za-z ]{0,16}",
            semantic in 0.0f32..=1.0,
        ) {
            let descriptors = vec![ElementDescriptor::with_role(&role, &name)];
            let category = detect(&instruction);
            let out = rerank(&instruction, category, retrieved(&descriptors, &[semantic]));
            let candidate = &out[0];
            prop_assert!((0.0..=MAX_HEURISTIC_BONUS).contains(&candidate.heuristic_bonus));
            prop_assert_eq!(candidate.final_score, semantic + candidate.heuristic_bonus);
            prop_assert!(candidate.final_score <= 2.0);
        }
    }
}
