use locator_protocol::{AccessibilityNode, ElementDescriptor};

const PLACEHOLDER_ROLES: &[&str] = &["textbox", "searchbox", "combobox"];

/// Flatten an accessibility tree into descriptors, depth-first in document order.
///
/// Ignored nodes are dropped together with their subtree unless `include_ignored` is set.
/// Nodes without a role, or with nothing beyond a role (no name, value or description),
/// are structural containers and produce no descriptor; their children are still visited.
#[must_use]
pub fn flatten_tree(root: &AccessibilityNode, include_ignored: bool) -> Vec<ElementDescriptor> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.ignored && !include_ignored {
            continue;
        }
        if let Some(descriptor) = to_descriptor(node) {
            out.push(descriptor);
        }
        stack.extend(node.children.iter().rev());
    }
    log::debug!("Flattened accessibility tree into {} elements", out.len());
    out
}

fn to_descriptor(node: &AccessibilityNode) -> Option<ElementDescriptor> {
    let role = present(node.role.as_deref())?;
    let name = present(node.name.as_deref());
    let value = present(node.value.as_deref());
    let description = present(node.description.as_deref());
    if name.is_none() && value.is_none() && description.is_none() {
        return None;
    }

    let placeholder = description
        .as_ref()
        .filter(|_| PLACEHOLDER_ROLES.contains(&role.as_str()))
        .cloned();

    Some(ElementDescriptor {
        role: Some(role),
        name,
        value,
        placeholder,
        description,
        test_id: present(node.test_id.as_deref()),
        level: node.level,
        ignored: node.ignored,
        state: node.state,
        ..ElementDescriptor::default()
    })
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page() -> AccessibilityNode {
        serde_json::from_value(serde_json::json!({
            "role": "WebArea",
            "name": "Login",
            "children": [
                {"role": "heading", "name": "Sign In", "level": 1},
                {"role": "generic", "children": [
                    {"role": "textbox", "name": "Email", "description": "Enter your email"},
                    {"role": "button", "name": "Sign In"}
                ]},
                {"role": "dialog", "name": "Cookies", "ignored": true, "children": [
                    {"role": "button", "name": "Accept"}
                ]},
                {"role": "text", "value": "v1.2"}
            ]
        }))
        .unwrap()
    }

    fn names(descriptors: &[ElementDescriptor]) -> Vec<String> {
        descriptors
            .iter()
            .map(|d| {
                format!(
                    "{}:{}",
                    d.role.as_deref().unwrap_or_default(),
                    d.name.as_deref().or(d.value.as_deref()).unwrap_or_default()
                )
            })
            .collect()
    }

    #[test]
    fn pre_order_without_ignored_subtrees() {
        let flat = flatten_tree(&page(), false);
        assert_eq!(
            names(&flat),
            vec![
                "WebArea:Login",
                "heading:Sign In",
                "textbox:Email",
                "button:Sign In",
                "text:v1.2",
            ]
        );
        assert_eq!(flat[1].level, Some(1));
        assert_eq!(flat[2].placeholder.as_deref(), Some("Enter your email"));
    }

    #[test]
    fn ignored_nodes_kept_on_request() {
        let flat = flatten_tree(&page(), true);
        assert_eq!(flat.len(), 7);
        assert!(flat.iter().any(|d| d.name.as_deref() == Some("Accept")));
        assert!(flat.iter().find(|d| d.role.as_deref() == Some("dialog")).unwrap().ignored);
    }

    #[test]
    fn description_only_nodes_keep_their_description() {
        let root: AccessibilityNode = serde_json::from_value(serde_json::json!({
            "role": "button",
            "description": "Opens the account menu"
        }))
        .unwrap();
        let flat = flatten_tree(&root, false);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].placeholder, None);
        assert_eq!(
            crate::signature::extract(&flat[0]).text,
            "button, description: Opens the account menu"
        );
    }

    #[test]
    fn bare_containers_are_skipped() {
        let root = AccessibilityNode {
            role: Some("list".to_string()),
            ..AccessibilityNode::default()
        };
        assert!(flatten_tree(&root, false).is_empty());
    }
}
