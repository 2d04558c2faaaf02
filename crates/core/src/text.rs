use std::collections::BTreeSet;
use unicode_segmentation::UnicodeSegmentation;

/// Lowercased word tokens in order of appearance.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

pub(crate) fn word_set(text: &str) -> BTreeSet<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

/// Trim and collapse interior whitespace runs to a single space.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed, lowercased value, or `None` when blank.
pub(crate) fn normalized_key(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Whitespace-collapsed value, or `None` when blank.
pub(crate) fn cleaned(value: Option<&str>) -> Option<String> {
    value.map(collapse_whitespace).filter(|v| !v.is_empty())
}
