use crate::text::{cleaned, normalized_key, word_set};
use locator_protocol::{ElementDescriptor, ElementState};
use std::collections::BTreeSet;

/// Normalized view of a descriptor shared by the locator synthesizer and the reranker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SignatureMetadata {
    /// Lowercased ARIA role.
    pub role: Option<String>,
    /// Lowercased HTML tag.
    pub tag: Option<String>,
    /// Accessible name with whitespace collapsed; empty when absent.
    pub name: String,
    /// True when `name` came from an associated `<label>`.
    pub name_from_label: bool,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub value: Option<String>,
    pub test_id: Option<String>,
    pub input_type: Option<String>,
    /// Accessible description, dropped when it only repeats the placeholder.
    pub description: Option<String>,
    pub level: Option<u8>,
    pub path: Option<String>,
    pub state: ElementState,
}

impl SignatureMetadata {
    /// The role, or the implicit ARIA role of the tag.
    #[must_use]
    pub fn effective_role(&self) -> Option<&str> {
        self.role
            .as_deref()
            .or_else(|| self.tag.as_deref().and_then(|tag| implicit_role(tag, self)))
    }

    #[must_use]
    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }

    /// Lowercased words the element itself carries: kind, name, label and attribute values.
    /// Signature key labels (`name`, `placeholder`, ...) and state flags are not included.
    #[must_use]
    pub fn content_words(&self) -> BTreeSet<String> {
        [
            self.role.as_deref(),
            self.tag.as_deref(),
            Some(self.name.as_str()),
            self.label.as_deref(),
            self.description.as_deref(),
            self.placeholder.as_deref(),
            self.input_type.as_deref(),
            self.value.as_deref(),
            self.test_id.as_deref(),
        ]
        .into_iter()
        .flatten()
        .flat_map(word_set)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementSignature {
    /// Canonical text, e.g. `button, name: Sign In`. Used as the embedding cache key.
    pub text: String,
    pub metadata: SignatureMetadata,
}

/// Build the canonical signature of a descriptor.
///
/// Total: missing fields are skipped, never an error. Parts are emitted in a fixed order
/// (kind, name, placeholder, type, value, test id, description, then true state flags) and
/// joined by `", "`.
#[must_use]
pub fn extract(descriptor: &ElementDescriptor) -> ElementSignature {
    let metadata = metadata(descriptor);
    let mut parts: Vec<String> = Vec::new();

    if let Some(kind) = metadata.role.as_deref().or(metadata.tag.as_deref()) {
        match (kind, metadata.level) {
            ("heading", Some(level)) => parts.push(format!("heading (level {level})")),
            _ => parts.push(kind.to_string()),
        }
    }
    if metadata.has_name() {
        parts.push(format!("name: {}", metadata.name));
    }
    let attributes = [
        ("placeholder", &metadata.placeholder),
        ("type", &metadata.input_type),
        ("value", &metadata.value),
        ("test-id", &metadata.test_id),
        ("description", &metadata.description),
    ];
    for (key, value) in attributes {
        if let Some(value) = value {
            parts.push(format!("{key}: {value}"));
        }
    }
    parts.extend(metadata.state.active().map(|flag| format!("{flag}: true")));

    ElementSignature {
        text: parts.join(", "),
        metadata,
    }
}

fn metadata(descriptor: &ElementDescriptor) -> SignatureMetadata {
    let label = cleaned(descriptor.label.as_deref());
    let placeholder = cleaned(descriptor.placeholder.as_deref());
    let (name, name_from_label) = match cleaned(descriptor.name.as_deref()) {
        Some(name) => (name, false),
        None => match &label {
            Some(label) => (label.clone(), true),
            None => (String::new(), false),
        },
    };

    SignatureMetadata {
        role: normalized_key(descriptor.role.as_deref()),
        tag: normalized_key(descriptor.tag.as_deref()),
        name,
        name_from_label,
        label,
        description: cleaned(descriptor.description.as_deref())
            .filter(|description| Some(description) != placeholder.as_ref()),
        placeholder,
        value: cleaned(descriptor.value.as_deref()),
        test_id: cleaned(descriptor.test_id.as_deref()),
        input_type: normalized_key(descriptor.input_type.as_deref()),
        level: descriptor.level,
        path: cleaned(descriptor.path.as_deref()),
        state: descriptor.state,
    }
}

fn implicit_role(tag: &str, metadata: &SignatureMetadata) -> Option<&'static str> {
    let role = match tag {
        "button" | "summary" => "button",
        "a" => "link",
        "textarea" => "textbox",
        "select" => "combobox",
        "option" => "option",
        "img" => "image",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "input" => match metadata.input_type.as_deref() {
            Some("submit" | "button" | "reset" | "image") => "button",
            Some("checkbox") => "checkbox",
            Some("radio") => "radio",
            Some("search") => "searchbox",
            Some("range") => "slider",
            Some("number") => "spinbutton",
            Some("hidden") => return None,
            _ => "textbox",
        },
        _ => return None,
    };
    Some(role)
}
