use crate::signature::{extract, SignatureMetadata};
use locator_protocol::{ElementDescriptor, LocatorCandidate, LocatorKind};

/// Roles that are typically actionable.
const INTERACTIVE_ROLES: &[&str] = &[
    "button",
    "link",
    "checkbox",
    "radio",
    "textbox",
    "menuitem",
    "tab",
    "option",
    "combobox",
    "searchbox",
    "spinbutton",
    "slider",
    "switch",
    "treeitem",
    "gridcell",
];

/// Roles addressable through an associated label.
const FORM_ROLES: &[&str] = &[
    "textbox",
    "searchbox",
    "checkbox",
    "radio",
    "combobox",
    "listbox",
    "spinbutton",
    "slider",
];

const PROMINENT_ROLES: &[&str] = &["button", "link", "heading"];
const GENERIC_ROLES: &[&str] = &["generic", "text", "none", "presentation"];

const GENERIC_NAMES: &[&str] = &[
    "click", "submit", "ok", "cancel", "yes", "no", "next", "previous", "back", "forward",
    "close", "open", "save", "delete", "edit", "add", "remove", "search", "filter", "sort",
    "refresh", "reload", "loading", "error", "success", "warning", "info", "help", "text",
    "element",
];

const EXACT_TEXT_MAX_CHARS: usize = 30;
const LONG_LOCATOR_CHARS: usize = 200;

/// Candidate locators for one element, best first. Never empty.
#[must_use]
pub fn synthesize(descriptor: &ElementDescriptor) -> Vec<LocatorCandidate> {
    synthesize_from(&extract(descriptor).metadata)
}

pub(crate) fn synthesize_from(meta: &SignatureMetadata) -> Vec<LocatorCandidate> {
    let mut raw: Vec<(LocatorKind, String)> = Vec::with_capacity(6);

    if let Some(role) = meta.role.as_deref() {
        raw.push((LocatorKind::Role, role_locator(role, meta)));
    }
    if let Some(test_id) = meta.test_id.as_deref() {
        raw.push((
            LocatorKind::TestId,
            format!("page.get_by_test_id(\"{}\")", js_escape(test_id)),
        ));
    }
    let label = meta.label.as_deref().or_else(|| {
        meta.effective_role()
            .filter(|role| FORM_ROLES.contains(role) && meta.has_name())
            .map(|_| meta.name.as_str())
    });
    if let Some(label) = label {
        raw.push((
            LocatorKind::Label,
            format!("page.get_by_label(\"{}\")", js_escape(label)),
        ));
    }
    if let Some(placeholder) = meta.placeholder.as_deref() {
        raw.push((
            LocatorKind::Placeholder,
            format!("page.get_by_placeholder(\"{}\")", js_escape(placeholder)),
        ));
    }
    if meta.has_name() {
        let exact = if meta.name.chars().count() < EXACT_TEXT_MAX_CHARS {
            ", { exact: true }"
        } else {
            ""
        };
        raw.push((
            LocatorKind::Text,
            format!("page.get_by_text(\"{}\"{exact})", js_escape(&meta.name)),
        ));
    }
    raw.push((
        LocatorKind::StructuralPath,
        format!("page.locator(\"{}\")", js_escape(&structural_path(meta))),
    ));

    let mut candidates: Vec<LocatorCandidate> = raw
        .into_iter()
        .map(|(kind, locator)| LocatorCandidate {
            kind,
            score: adjusted_score(kind, &locator, meta),
            locator,
        })
        .collect();
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}

fn role_locator(role: &str, meta: &SignatureMetadata) -> String {
    let mut options: Vec<String> = Vec::new();
    if meta.has_name() {
        options.push(format!("name: \"{}\"", js_escape(&meta.name)));
    }
    if role == "heading" {
        if let Some(level) = meta.level {
            options.push(format!("level: {level}"));
        }
    }
    if matches!(role, "checkbox" | "radio" | "switch") && meta.state.checked {
        options.push("checked: true".to_string());
    }
    if matches!(role, "combobox" | "button") && meta.state.expanded {
        options.push("expanded: true".to_string());
    }
    if meta.state.required {
        options.push("required: true".to_string());
    }

    let role = js_escape(role);
    if options.is_empty() {
        format!("page.get_by_role(\"{role}\")")
    } else {
        format!("page.get_by_role(\"{role}\", {{ {} }})", options.join(", "))
    }
}

/// XPath for the element: observer hint, else content match, else bare role/tag.
fn structural_path(meta: &SignatureMetadata) -> String {
    if let Some(path) = meta.path.as_deref() {
        return path.to_string();
    }
    if meta.has_name() {
        return content_xpath(meta);
    }
    match (meta.role.as_deref(), meta.tag.as_deref()) {
        (Some(role), _) => format!("//*[@role={}]", xpath_literal(role)),
        (None, Some(tag)) if is_xpath_name(tag) => format!("//{tag}"),
        _ => "//*".to_string(),
    }
}

fn content_xpath(meta: &SignatureMetadata) -> String {
    let name = xpath_literal(&meta.name);
    let text = format!("contains(text(), {name})");
    let mut conditions = vec![format!("contains(@aria-label, {name})"), text.clone()];

    match meta.effective_role() {
        Some("heading") => {
            if let Some(level) = meta.level {
                conditions.push(format!("(self::h{level} and {text})"));
                conditions.push(format!("(@aria-level='{level}' and {text})"));
            }
            conditions.push(format!("(contains(@class, 'heading') and {text})"));
            conditions.push(format!("(contains(@class, 'title') and {text})"));
        }
        Some("button") => {
            conditions.push(format!("(self::button and {text})"));
            conditions.push(format!("(contains(@class, 'btn') and {text})"));
            conditions.push(format!("(contains(@class, 'button') and {text})"));
        }
        Some("link") => {
            conditions.push(format!("(self::a and {text})"));
            conditions.push(format!("(contains(@class, 'link') and {text})"));
        }
        Some("textbox" | "searchbox" | "combobox" | "listbox") => {
            for attr in ["placeholder", "name", "id"] {
                conditions.push(format!("(self::input and contains(@{attr}, {name}))"));
            }
            conditions.push(format!("(self::textarea and contains(@placeholder, {name}))"));
        }
        Some(role @ ("checkbox" | "radio")) => {
            for attr in ["name", "id"] {
                conditions.push(format!(
                    "(self::input[@type='{role}'] and contains(@{attr}, {name}))"
                ));
            }
        }
        _ => {}
    }

    let mut filters: Vec<&str> = Vec::new();
    if meta.state.disabled {
        filters.push("@disabled or @aria-disabled='true'");
    }
    if meta.state.required {
        filters.push("@required or @aria-required='true'");
    }
    if meta.state.checked {
        filters.push("@checked or @aria-checked='true'");
    }
    if meta.state.expanded {
        filters.push("@aria-expanded='true'");
    }

    let matches = conditions.join(" or ");
    if filters.is_empty() {
        format!("//*[{matches}]")
    } else {
        let states: Vec<String> = filters.iter().map(|f| format!("({f})")).collect();
        format!("//*[({matches}) and {}]", states.join(" and "))
    }
}

fn adjusted_score(kind: LocatorKind, locator: &str, meta: &SignatureMetadata) -> f32 {
    let role = meta.effective_role();
    let words = meta.name.split_whitespace().count();
    let mut score = kind.base_score();

    if role.is_some_and(|r| INTERACTIVE_ROLES.contains(&r)) {
        score += 0.05;
    }
    if (1..=5).contains(&words) {
        score += 0.05;
    } else if words > 10 {
        score -= 0.05;
    }
    if meta.has_name() && !is_generic_name(&meta.name) {
        score += 0.03;
    }
    if meta.value.is_some() {
        score += 0.02;
    }
    if meta.state.required {
        score += 0.02;
    }
    if role.is_some_and(|r| PROMINENT_ROLES.contains(&r)) {
        score += 0.02;
    }
    if meta.state.disabled {
        score -= 0.10;
    }
    if role.is_some_and(|r| GENERIC_ROLES.contains(&r)) || !meta.has_name() {
        score -= 0.15;
    }
    if locator.chars().count() > LONG_LOCATOR_CHARS {
        score -= 0.05;
    }

    round2(score.clamp(0.0, 1.0))
}

fn is_generic_name(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    lowered.chars().count() <= 2
        || GENERIC_NAMES.contains(&lowered.as_str())
        || !lowered.chars().any(char::is_alphabetic)
}

fn round2(score: f32) -> f32 {
    (score * 100.0).round() / 100.0
}

fn js_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Quote a string for XPath 1.0, which has no escape sequences.
fn xpath_literal(raw: &str) -> String {
    if !raw.contains('\'') {
        return format!("'{raw}'");
    }
    if !raw.contains('"') {
        return format!("\"{raw}\"");
    }
    let pieces: Vec<String> = raw
        .split('\'')
        .map(|piece| format!("'{piece}'"))
        .collect();
    format!("concat({})", pieces.join(", \"'\", "))
}

fn is_xpath_name(tag: &str) -> bool {
    tag.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
