//! Template Renderer
//!
//! Clones template content once per render item, substitutes `${path}`
//! placeholders, expands nested-array elements and inserts the result.
//!
//! Substitution runs in two phases over each subtree so the tree is never
//! mutated while it is being walked:
//!
//! ```text
//! plan_subtree   → text substitutions + nested expansions (read only)
//! apply          → set texts, build expansion containers, replace nodes
//! ```
//!
//! Only text nodes receive data. Nothing is ever parsed as markup.
//!
//! Whatever a render takes out of the document (old target children on
//! `update`, the target on `swap`, expanded marker elements, emptied
//! fragments) is released back to the arena unless it is pinned, so
//! repeated renders do not grow the document.

use std::borrow::Cow;

use serde_json::Value;
use tracing::debug;

use crate::binding::Action;
use crate::dom::{Document, NodeId};
use crate::path;
use crate::template;

/// Element name of the container replacing an expanded nested-array element
const NESTED_CONTAINER: &str = "div";

#[derive(Debug, Default)]
struct Plan {
    texts: Vec<NodeId>,
    /// (element, entries of the array field)
    expansions: Vec<(NodeId, Vec<Value>)>,
}

/// Collect work for the subtree under `root`
///
/// `root`'s own direct text children are substituted; `root` itself is never
/// treated as a nested-array element.
fn plan_subtree(doc: &Document, root: NodeId, item: &Value, nested_attr: &str) -> Plan {
    let mut plan = Plan::default();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        let mut substitute_own_text = true;

        if node != root {
            if let Some(key) = doc.get_attribute(node, nested_attr) {
                // Marker elements never get their own text substituted
                substitute_own_text = false;
                if let Some(Value::Array(entries)) = path::lookup(item, key) {
                    plan.expansions.push((node, entries.clone()));
                    continue;
                }
            }
        }

        for &child in doc.children(node).iter().rev() {
            if doc.text(child).is_some() {
                if substitute_own_text {
                    plan.texts.push(child);
                }
            } else if doc.is_element(child) {
                stack.push(child);
            }
        }
    }
    plan
}

/// Substitute placeholders in the subtree under `root` against `item`
pub fn substitute_subtree(doc: &mut Document, root: NodeId, item: &Value, nested_attr: &str) {
    let plan = plan_subtree(doc, root, item, nested_attr);

    for text_node in plan.texts {
        let replaced = match doc.text(text_node).map(|text| template::substitute(text, item)) {
            Some(Cow::Owned(replaced)) => replaced,
            _ => continue,
        };
        doc.set_text(text_node, replaced);
    }

    for (element, entries) in plan.expansions {
        let container = expand_nested(doc, element, &entries, nested_attr);
        doc.replace_with(element, container);
        doc.release(element);
    }
}

/// One substituted clone of `element` per entry, inside a fresh container
///
/// Clones keep the marker attribute; a clone root is never expanded again.
fn expand_nested(
    doc: &mut Document,
    element: NodeId,
    entries: &[Value],
    nested_attr: &str,
) -> NodeId {
    let container = doc.create_element(NESTED_CONTAINER);
    for entry in entries {
        let clone = doc.clone_node(element, true);
        substitute_subtree(doc, clone, entry, nested_attr);
        doc.append_child(container, clone);
    }
    container
}

/// Render items: the array's elements in order, or the value itself
pub fn render_items(data: &Value) -> Vec<&Value> {
    match data {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Build one fragment holding a substituted copy of the template per item
///
/// `None` when `template` has no content fragment.
pub fn render_fragment(
    doc: &mut Document,
    template: NodeId,
    data: &Value,
    nested_attr: &str,
) -> Option<(NodeId, usize)> {
    let content = doc.template_content(template)?;
    let fragment = doc.create_fragment();
    let items = render_items(data);
    for item in &items {
        let clone = doc.clone_node(content, true);
        substitute_subtree(doc, clone, item, nested_attr);
        doc.append_child(fragment, clone);
        doc.release(clone);
    }
    Some((fragment, items.len()))
}

/// Insert `fragment` into `target` according to `action`
///
/// Removed nodes and the spent fragment are released. A `swap` on a detached
/// target inserts nothing.
pub fn apply_action(doc: &mut Document, action: Action, target: NodeId, fragment: NodeId) {
    match action {
        Action::Append => doc.append_child(target, fragment),
        Action::Swap => {
            if doc.parent(target).is_some() {
                doc.replace_with(target, fragment);
                doc.release(target);
            }
        }
        Action::Update => {
            for old in doc.clear_children(target) {
                doc.release(old);
            }
            doc.append_child(target, fragment);
        }
    }
    doc.release(fragment);
}

/// Render `data` through `template` into `target`; returns the item count
pub fn render(
    doc: &mut Document,
    template: NodeId,
    data: &Value,
    target: NodeId,
    action: Action,
    nested_attr: &str,
) -> usize {
    let Some((fragment, items)) = render_fragment(doc, template, data, nested_attr) else {
        debug!(template = template.index(), "not a template element, nothing rendered");
        return 0;
    };
    apply_action(doc, action, target, fragment);
    debug!(
        template = template.index(),
        target = %doc.describe(target),
        action = action.as_str(),
        items,
        "rendered"
    );
    items
}
