use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod element;

pub use element::{AccessibilityNode, ElementDescriptor, ElementState};

pub const DEFAULT_TOP_K: usize = 10;

/// Coarse classification of what the instruction asks the automation to do.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Click,
    Input,
    Select,
    Verify,
    None,
}

impl ActionCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Input => "input",
            Self::Select => "select",
            Self::Verify => "verify",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy used to address an element from automation code.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    Role,
    TestId,
    Label,
    Placeholder,
    Text,
    StructuralPath,
}

impl LocatorKind {
    #[must_use]
    pub const fn base_score(self) -> f32 {
        match self {
            Self::Role => 0.95,
            Self::Label => 0.90,
            Self::TestId => 0.88,
            Self::Placeholder => 0.85,
            Self::Text => 0.80,
            Self::StructuralPath => 0.60,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct LocatorCandidate {
    pub kind: LocatorKind,
    pub locator: String,
    pub score: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, JsonSchema)]
pub struct ResolveRequest {
    pub instruction: String,
    #[serde(default)]
    pub elements: Vec<ElementDescriptor>,
    /// Optional observer tree; its meaningful nodes are appended after `elements`.
    #[serde(default)]
    pub accessibility_tree: Option<AccessibilityNode>,
    #[serde(default)]
    pub include_ignored: bool,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, JsonSchema)]
pub struct LocatorsRequest {
    #[serde(default)]
    pub elements: Vec<ElementDescriptor>,
    #[serde(default)]
    pub accessibility_tree: Option<AccessibilityNode>,
    #[serde(default)]
    pub include_ignored: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, JsonSchema)]
pub struct BonusBreakdown {
    pub element_type: f32,
    pub context: f32,
    pub explicit_mention: f32,
    /// Sum of the components after the cap.
    pub total: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct CandidateView {
    /// Position of the element in the request.
    pub index: usize,
    pub signature: String,
    pub final_score: f32,
    pub semantic_score: f32,
    pub heuristic_bonus: f32,
    pub locators: Vec<LocatorCandidate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct CandidateBreakdown {
    pub index: usize,
    pub signature: String,
    pub breakdown: BonusBreakdown,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct DebugTrace {
    pub action_category: ActionCategory,
    /// Bonus components of the winning candidate.
    pub breakdown: BonusBreakdown,
    pub candidates: Vec<CandidateBreakdown>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct ResolveResponse {
    pub locator: String,
    pub locator_kind: LocatorKind,
    pub signature: String,
    pub score: f32,
    pub semantic_score: f32,
    pub heuristic_bonus: f32,
    pub all_candidates: Vec<CandidateView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugTrace>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct ElementLocators {
    pub index: usize,
    pub signature: String,
    pub locators: Vec<LocatorCandidate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
pub enum ErrorKind {
    NoCandidates,
    EmbeddingUnavailable,
    InvalidInput,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoCandidates => "NoCandidates",
            Self::EmbeddingUnavailable => "EmbeddingUnavailable",
            Self::InvalidInput => "InvalidInput",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure object returned in place of a response.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

/// JSON schema of the resolve request, for callers generating clients.
pub fn request_schema() -> Result<String> {
    let schema = schemars::schema_for!(ResolveRequest);
    serde_json::to_string_pretty(&schema).map_err(Into::into)
}
