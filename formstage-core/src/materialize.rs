//! Turning component records into DOM: the shared field-element builder
//! and the editor preview, which is a pure function of the form tree.

use crate::component::ComponentData;
use crate::dom::{Dom, NodeConfig, NodeId};
use crate::form::Form;
use crate::kind::ComponentKind;
use serde_json::Value;
use std::collections::HashMap;

/// Class marking a container with no children.
pub const EMPTY_CLASS: &str = "empty";

/// HTML attribute name for a data key.
pub fn attr_name(key: &str) -> &str {
    match key {
        "className" => "class",
        other => other,
    }
}

/// Attribute text for a data value; `None` means "leave it off".
///
/// `true` becomes a bare attribute, arrays of `{value, selected}` entries
/// yield the selected value.
pub fn attr_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some(String::new()),
        Value::Bool(false) | Value::Null => None,
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let chosen = items
                .iter()
                .find(|i| i.get("selected").and_then(Value::as_bool) == Some(true))
                .or_else(|| items.first())?;
            match chosen.get("value") {
                Some(v) => attr_value(v),
                None => attr_value(chosen),
            }
        }
        Value::Object(_) => None,
    }
}

fn apply_attrs(mut node: NodeConfig, field: &ComponentData, skip: &[&str]) -> NodeConfig {
    for (key, value) in field.attrs.iter().flatten() {
        if skip.contains(&key.as_str()) {
            continue;
        }
        if let Some(text) = attr_value(value) {
            node = node.attr(attr_name(key), text);
        }
    }
    node
}

fn option_text(option: &Value, key: &str) -> Option<String> {
    option.get(key).and_then(attr_value)
}

/// The form element for `field`, with `element_id` as its DOM id.
pub fn field_element(field: &ComponentData, element_id: &str) -> NodeConfig {
    let tag = field.tag.clone().unwrap_or_else(|| "input".to_string());
    let options = field.options.as_deref().unwrap_or(&[]);

    if field.uses_checked_options() && !options.is_empty() {
        let input_type = field.field_type();
        let mut group = NodeConfig::new("div").attr("id", element_id);
        for (i, option) in options.iter().enumerate() {
            let option_id = format!("{}-{}", element_id, i);
            let mut input = NodeConfig::new("input")
                .attr("type", input_type.as_str())
                .attr("id", option_id.as_str())
                .attr("name", element_id);
            if let Some(value) = option_text(option, "value") {
                input = input.attr("value", value);
            }
            if option.get("checked").and_then(Value::as_bool) == Some(true) {
                input = input.attr("checked", "");
            }
            if i == 0 && field.attr("required").and_then(Value::as_bool) == Some(true) {
                input = input.attr("required", "");
            }
            let label = NodeConfig::new("label")
                .attr("for", option_id.as_str())
                .text(option_text(option, "label").unwrap_or_default());
            group = group.child(NodeConfig::new("div").child(input).child(label));
        }
        return group;
    }

    let mut node = apply_attrs(NodeConfig::new(tag.as_str()), field, &[]);
    node = node.attr("id", element_id);
    if matches!(tag.as_str(), "input" | "select" | "textarea") {
        node = node.attr("name", element_id);
    }
    if tag == "select" {
        for option in options {
            let mut opt = NodeConfig::new("option");
            if let Some(value) = option_text(option, "value") {
                opt = opt.attr("value", value);
            }
            if option.get("selected").and_then(Value::as_bool) == Some(true) {
                opt = opt.attr("selected", "");
            }
            node = node.child(opt.text(option_text(option, "label").unwrap_or_default()));
        }
    }
    if let Some(content) = field.content.as_deref().filter(|c| !c.is_empty()) {
        node = node.text(content);
    }
    node
}

/// `label` for `field`, unless hidden or blank.
pub fn field_label(field: &ComponentData, element_id: &str) -> Option<NodeConfig> {
    let hidden = field
        .config_value("hideLabel")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let text = field.label().filter(|l| !l.is_empty())?;
    if hidden {
        return None;
    }
    Some(NodeConfig::new("label").attr("for", element_id).text(text))
}

/// Wrapper `div` (`<id>-wrapper`) holding the label and the element.
pub fn field_wrapper(field: &ComponentData, element_id: &str) -> NodeConfig {
    let mut wrapper = NodeConfig::new("div")
        .attr("id", format!("{}-wrapper", element_id))
        .attr("class", "formstage-field-wrapper");
    if let Some(label) = field_label(field, element_id) {
        wrapper = wrapper.child(label);
    }
    wrapper.child(field_element(field, element_id))
}

/// The editor's DOM view of a form.
#[derive(Debug, Clone)]
pub struct Preview {
    pub dom: Dom,
    pub root: NodeId,
    nodes: HashMap<String, NodeId>,
}

impl Preview {
    /// Node hosting component `id`.
    pub fn node_of(&self, id: &str) -> Option<NodeId> {
        self.nodes.get(id).copied().filter(|n| self.dom.exists(*n))
    }

    /// Component ids of `id`'s child nodes, read in DOM order.
    pub fn child_ids(&self, id: &str) -> Vec<String> {
        let Some(node) = self.node_of(id) else {
            return Vec::new();
        };
        self.dom
            .element_children(node)
            .into_iter()
            .filter_map(|c| self.dom.attr(c, "data-component").map(str::to_string))
            .collect()
    }

    pub fn is_marked_empty(&self, id: &str) -> bool {
        self.node_of(id)
            .is_some_and(|n| self.dom.has_class(n, EMPTY_CLASS))
    }
}

/// Materialize the editor view of `form`, in stored order.
pub fn materialize(form: &Form) -> Preview {
    let mut dom = Dom::new();
    let mut nodes = HashMap::new();
    let root = build(form, form.stage_id(), &mut dom, &mut nodes);
    Preview {
        root: root.unwrap_or_else(|| dom.create_element("div")),
        dom,
        nodes,
    }
}

fn build(
    form: &Form,
    id: &str,
    dom: &mut Dom,
    nodes: &mut HashMap<String, NodeId>,
) -> Option<NodeId> {
    let kind = form.kind_of(id)?;
    let record = form.get(id)?;
    let node = dom.create_element(kind.dom_tag());
    dom.set_attr(node, "id", id);
    dom.set_attr(node, "data-component", id);
    dom.add_class(node, kind.dom_class());
    if form.is_empty(id) {
        dom.add_class(node, EMPTY_CLASS);
    }
    match kind {
        ComponentKind::Column => {
            if let Some(width) = record.config_value("width").and_then(Value::as_str) {
                dom.set_attr(node, "style", &format!("width: {}", width));
            }
        }
        ComponentKind::Field => {
            let preview = dom.create(&field_wrapper(record, &format!("{}-preview", id)));
            dom.append_child(node, preview);
        }
        ComponentKind::Stage | ComponentKind::Row => {}
    }
    nodes.insert(id.to_string(), node);
    for child in record.children() {
        if let Some(c) = build(form, child, dom, nodes) {
            dom.append_child(node, c);
        }
    }
    Some(node)
}
