use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Boolean accessibility states an element can expose.
///
/// Flags are flattened into the owning object on the wire, so
/// `{"role":"button","disabled":true}` is accepted as-is.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash, JsonSchema)]
#[serde(default)]
pub struct ElementState {
    pub disabled: bool,
    pub required: bool,
    pub checked: bool,
    pub expanded: bool,
    pub selected: bool,
    pub readonly: bool,
    pub multiline: bool,
    pub multiselectable: bool,
    pub focused: bool,
    pub modal: bool,
}

impl ElementState {
    /// Flags in their canonical rendering order.
    #[must_use]
    pub const fn flags(&self) -> [(&'static str, bool); 10] {
        [
            ("disabled", self.disabled),
            ("required", self.required),
            ("checked", self.checked),
            ("expanded", self.expanded),
            ("selected", self.selected),
            ("readonly", self.readonly),
            ("multiline", self.multiline),
            ("multiselectable", self.multiselectable),
            ("focused", self.focused),
            ("modal", self.modal),
        ]
    }

    pub fn active(&self) -> impl Iterator<Item = &'static str> {
        self.flags()
            .into_iter()
            .filter_map(|(key, on)| on.then_some(key))
    }
}

/// One candidate page element as reported by the page observer.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct ElementDescriptor {
    /// ARIA role (`button`, `textbox`, `heading`, ...).
    pub role: Option<String>,
    /// HTML tag name (`button`, `input`, `h2`, ...).
    pub tag: Option<String>,
    /// Accessible name or visible text.
    pub name: Option<String>,
    /// Text of an associated `<label>`.
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub value: Option<String>,
    #[serde(alias = "testid", alias = "data-testid")]
    pub test_id: Option<String>,
    /// HTML `type` attribute of form controls.
    #[serde(rename = "type")]
    pub input_type: Option<String>,
    /// Heading level (1-6).
    pub level: Option<u8>,
    pub description: Option<String>,
    /// Structural XPath hint supplied by the observer.
    pub path: Option<String>,
    pub ignored: bool,
    #[serde(flatten)]
    pub state: ElementState,
}

impl ElementDescriptor {
    #[must_use]
    pub fn with_role(role: &str, name: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tag(tag: &str, name: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// True when neither a role nor a tag names the element kind.
    #[must_use]
    pub fn is_untyped(&self) -> bool {
        is_blank(self.role.as_deref()) && is_blank(self.tag.as_deref())
    }
}

/// A node of the page accessibility tree.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct AccessibilityNode {
    pub role: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    pub description: Option<String>,
    pub level: Option<u8>,
    #[serde(alias = "testid", alias = "data-testid")]
    pub test_id: Option<String>,
    pub ignored: bool,
    #[serde(flatten)]
    pub state: ElementState,
    pub children: Vec<AccessibilityNode>,
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
