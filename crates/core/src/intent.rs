use crate::signature::SignatureMetadata;
use crate::text::words;
use locator_protocol::ActionCategory;

/// Static scoring rules of one action category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionRule {
    pub category: ActionCategory,
    /// Instruction words that trigger the category.
    pub keywords: &'static [&'static str],
    pub priority_roles: &'static [&'static str],
    pub priority_tags: &'static [&'static str],
    /// Element-type bonus awarded to priority elements.
    pub bonus: f32,
}

/// Detection order doubles as tie-break priority: click > input > select > verify.
pub static ACTION_RULES: [ActionRule; 4] = [
    ActionRule {
        category: ActionCategory::Click,
        keywords: &["click", "press", "tap", "submit", "button"],
        priority_roles: &["button", "link", "menuitem", "tab"],
        priority_tags: &["button", "a", "summary"],
        bonus: 0.5,
    },
    ActionRule {
        category: ActionCategory::Input,
        keywords: &["enter", "type", "fill", "input", "write"],
        priority_roles: &["textbox", "searchbox"],
        priority_tags: &["input", "textarea"],
        bonus: 0.5,
    },
    ActionRule {
        category: ActionCategory::Select,
        keywords: &["select", "choose", "pick", "dropdown"],
        priority_roles: &["listbox", "option", "combobox"],
        priority_tags: &["select", "option"],
        bonus: 0.5,
    },
    ActionRule {
        category: ActionCategory::Verify,
        keywords: &["verify", "check", "confirm", "see", "find", "look"],
        priority_roles: &["heading", "text", "paragraph", "status", "alert"],
        priority_tags: &["h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "div", "label"],
        bonus: 0.2,
    },
];

/// Rule record of a category; `None` has no rules.
#[must_use]
pub fn rule_for(category: ActionCategory) -> Option<&'static ActionRule> {
    match category {
        ActionCategory::Click => Some(&ACTION_RULES[0]),
        ActionCategory::Input => Some(&ACTION_RULES[1]),
        ActionCategory::Select => Some(&ACTION_RULES[2]),
        ActionCategory::Verify => Some(&ACTION_RULES[3]),
        ActionCategory::None => None,
    }
}

impl ActionRule {
    /// Whether the element's role or tag is one this category prefers.
    #[must_use]
    pub fn prefers(&self, meta: &SignatureMetadata) -> bool {
        let role_hit = meta
            .effective_role()
            .is_some_and(|role| self.priority_roles.contains(&role));
        let tag_hit = meta.tag.as_deref().is_some_and(|tag| {
            self.priority_tags.contains(&tag) && !self.excludes_input_type(tag, meta)
        });
        role_hit || tag_hit
    }

    // `<input type=submit>` is a button, not a text field.
    fn excludes_input_type(&self, tag: &str, meta: &SignatureMetadata) -> bool {
        if tag != "input" {
            return false;
        }
        let is_button = matches!(
            meta.input_type.as_deref(),
            Some("submit" | "button" | "reset" | "image")
        );
        match self.category {
            ActionCategory::Input => is_button,
            _ => false,
        }
    }
}

/// Classify the instruction by whole-word keyword match.
#[must_use]
pub fn detect(instruction: &str) -> ActionCategory {
    let tokens = words(instruction);
    ACTION_RULES
        .iter()
        .find(|rule| {
            tokens
                .iter()
                .any(|token| rule.keywords.contains(&token.as_str()))
        })
        .map_or(ActionCategory::None, |rule| rule.category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::extract;
    use locator_protocol::ElementDescriptor;
    use pretty_assertions::assert_eq;

    #[test]
    fn detects_each_category() {
        assert_eq!(detect("Click Sign In"), ActionCategory::Click);
        assert_eq!(detect("Enter email in the email field"), ActionCategory::Input);
        assert_eq!(detect("Choose Canada"), ActionCategory::Select);
        assert_eq!(detect("Verify the welcome banner"), ActionCategory::Verify);
        assert_eq!(detect("Sign In"), ActionCategory::None);
        assert_eq!(detect(""), ActionCategory::None);
    }

    #[test]
    fn matching_is_case_insensitive_and_whole_word() {
        assert_eq!(detect("PRESS continue"), ActionCategory::Click);
        // "clicked" and "typewriter" are not keywords
        assert_eq!(detect("clicked typewriter"), ActionCategory::None);
    }

    #[test]
    fn earlier_category_wins_ties() {
        assert_eq!(detect("Type the code and press submit"), ActionCategory::Click);
        assert_eq!(detect("Select then check"), ActionCategory::Select);
        assert_eq!(detect("Check that you can enter text"), ActionCategory::Input);
    }

    #[test]
    fn rules_line_up_with_categories() {
        for rule in &ACTION_RULES {
            assert_eq!(rule_for(rule.category), Some(rule));
        }
        assert_eq!(rule_for(ActionCategory::None), None);
    }

    #[test]
    fn submit_input_is_a_click_target_not_a_field() {
        let descriptor = ElementDescriptor {
            tag: Some("input".to_string()),
            input_type: Some("submit".to_string()),
            ..ElementDescriptor::default()
        };
        let meta = extract(&descriptor).metadata;
        assert!(!ACTION_RULES[1].prefers(&meta));
        assert!(ACTION_RULES[0].prefers(&meta));

        let field = extract(&ElementDescriptor::with_tag("input", "Email")).metadata;
        assert!(ACTION_RULES[1].prefers(&field));
    }
}
