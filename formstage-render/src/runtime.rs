//! Runtime condition engine for rendered forms.
//!
//! Conditions are compiled into rules once per render. Sources that resolve
//! to a live node get a listener; events bubble from the target node up to
//! the form root and every rule listening on the way is re-evaluated. All
//! side effects are expressed as [`Patch`]es and applied to the DOM.

use formstage_core::conditions::{Address, Assignment, Comparison, Condition, Property, ThenClause};
use formstage_core::dom::{Dom, NodeId};
use formstage_core::utils;
use formstage_core::{ComponentKind, FormData};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// DOM mutation produced by a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Patch {
    SetHidden { id: String, hidden: bool },
    SetValue { id: String, value: String },
    SetChecked { id: String, checked: bool },
    SetRequired { id: String, required: bool },
}

impl Patch {
    pub fn id(&self) -> &str {
        match self {
            Patch::SetHidden { id, .. }
            | Patch::SetValue { id, .. }
            | Patch::SetChecked { id, .. }
            | Patch::SetRequired { id, .. } => id,
        }
    }
}

/// Apply `patch` to the element with its id under `root`. Unknown ids are ignored.
pub fn apply_patch(dom: &mut Dom, root: NodeId, patch: &Patch) {
    let Some(node) = dom.get_by_id(root, patch.id()) else {
        return;
    };
    match patch {
        Patch::SetHidden { hidden: true, .. } => dom.set_attr(node, "hidden", ""),
        Patch::SetHidden { hidden: false, .. } => dom.remove_attr(node, "hidden"),
        Patch::SetValue { value, .. } => dom.set_value(node, value),
        Patch::SetChecked { checked, .. } => dom.set_checked(node, *checked),
        Patch::SetRequired { required: true, .. } => dom.set_attr(node, "required", ""),
        Patch::SetRequired { required: false, .. } => dom.remove_attr(node, "required"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Input,
    Change,
}

/// Event a source element is listened on: `input` for free text,
/// `change` for selects, checkboxes and radios.
pub fn listen_event(dom: &Dom, node: NodeId) -> EventKind {
    match dom.tag(node) {
        Some("textarea") => EventKind::Input,
        Some("input") => match dom.attr(node, "type") {
            Some("checkbox") | Some("radio") => EventKind::Change,
            _ => EventKind::Input,
        },
        _ => EventKind::Change,
    }
}

#[derive(Debug, Clone)]
struct Rule {
    field_id: String,
    index: usize,
    condition: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listener {
    pub node: NodeId,
    pub event: EventKind,
    rule: usize,
}

/// Compiled conditions of one rendered form.
#[derive(Debug, Clone, Default)]
pub struct Runtime {
    rules: Vec<Rule>,
    listeners: Vec<Listener>,
    /// Element ids that carried `required` when rendered.
    required: HashSet<String>,
    external: Value,
}

impl Runtime {
    /// Compile the conditions of `data` against the rendered `dom`.
    ///
    /// A rule with a source that resolves to no live node is left out.
    pub fn build(dom: &Dom, root: NodeId, data: &FormData, external: &Map<String, Value>) -> Self {
        let mut runtime = Runtime {
            external: Value::Object(external.clone()),
            ..Default::default()
        };
        runtime.required = dom
            .descendants(root)
            .into_iter()
            .filter(|n| dom.has_attr(*n, "required"))
            .filter_map(|n| dom.attr(n, "id").map(str::to_string))
            .collect();

        for (field_id, field) in &data.fields {
            for (index, condition) in field.conditions.iter().flatten().enumerate() {
                let mut sources = Vec::new();
                let mut inert = false;
                for clause in &condition.if_ {
                    match clause.source_address() {
                        Some(Address::External { .. }) => {}
                        Some(Address::Component { kind, id, .. }) => match resolve(dom, root, kind, &id) {
                            Some(node) => sources.push(node),
                            None => inert = true,
                        },
                        None => inert = true,
                    }
                }
                if inert || condition.if_.is_empty() {
                    tracing::debug!(field = %field_id, condition = index, "condition source does not resolve, rule is inert");
                    continue;
                }
                let rule = runtime.rules.len();
                runtime.rules.push(Rule {
                    field_id: field_id.clone(),
                    index,
                    condition: condition.clone(),
                });
                for node in sources {
                    let listener = Listener {
                        node,
                        event: listen_event(dom, node),
                        rule,
                    };
                    if !runtime.listeners.contains(&listener) {
                        runtime.listeners.push(listener);
                    }
                }
            }
        }
        tracing::debug!(rules = runtime.rules.len(), listeners = runtime.listeners.len(), "conditions compiled");
        runtime
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    /// Whether any listener for `event` sits on `node`.
    pub fn is_listening(&self, node: NodeId, event: EventKind) -> bool {
        self.listeners.iter().any(|l| l.node == node && l.event == event)
    }

    /// Evaluate every rule once, as on first render.
    pub fn apply_conditions(&self, dom: &mut Dom, root: NodeId) -> Vec<Patch> {
        let all: Vec<usize> = (0..self.rules.len()).collect();
        self.run_rules(dom, root, &all)
    }

    /// Deliver `event` at `target` and bubble it to the root.
    pub fn dispatch(&self, dom: &mut Dom, root: NodeId, target: NodeId, event: EventKind) -> Vec<Patch> {
        let path = dom.ancestors(target);
        let mut rules = Vec::new();
        for node in path {
            for l in self.listeners.iter().filter(|l| l.node == node && l.event == event) {
                if !rules.contains(&l.rule) {
                    rules.push(l.rule);
                }
            }
        }
        self.run_rules(dom, root, &rules)
    }

    fn run_rules(&self, dom: &mut Dom, root: NodeId, rules: &[usize]) -> Vec<Patch> {
        let mut patches = Vec::new();
        for &i in rules {
            let Some(rule) = self.rules.get(i) else { continue };
            let Some(result) = self.evaluate_condition(dom, root, &rule.condition) else {
                tracing::debug!(field = %rule.field_id, condition = rule.index, "condition skipped");
                continue;
            };
            for clause in &rule.condition.then {
                for patch in self.exec_result(dom, root, clause, result) {
                    apply_patch(dom, root, &patch);
                    patches.push(patch);
                }
            }
        }
        patches
    }

    /// Every `if` clause must hold. `None` when a comparison is unknown or
    /// an operand cannot be read.
    pub fn evaluate_condition(&self, dom: &Dom, root: NodeId, condition: &Condition) -> Option<bool> {
        if condition.if_.is_empty() {
            return None;
        }
        let mut result = true;
        for clause in &condition.if_ {
            let source = clause.source_address()?;
            let property = clause.source_property.as_deref().and_then(Property::parse);
            let left = self.read(dom, root, &source, property)?;
            let comparison = clause.comparison.as_deref().and_then(Comparison::parse)?;
            let right = match &clause.target {
                Some(Value::String(s)) if Address::is_address(s) => {
                    let address = Address::parse(s)?;
                    let property = clause
                        .target_property
                        .as_deref()
                        .and_then(Property::parse)
                        .or(Some(Property::Value));
                    self.read(dom, root, &address, property)?
                }
                Some(literal) => literal.clone(),
                None => Value::Null,
            };
            result &= comparison.apply(&left, &right);
        }
        Some(result)
    }

    fn read(&self, dom: &Dom, root: NodeId, address: &Address, property: Option<Property>) -> Option<Value> {
        match address {
            Address::External { path } => utils::get_path(&self.external, path).cloned(),
            Address::Component { kind, id, .. } => {
                let node = resolve(dom, root, *kind, id)?;
                read_property(dom, *kind, node, property?)
            }
        }
    }

    /// Patches for one `then` clause given the `if` outcome.
    ///
    /// Visibility clauses apply their complement when `result` is false;
    /// value assignments only run when it is true.
    pub fn exec_result(
        &self,
        dom: &Dom,
        root: NodeId,
        clause: &ThenClause,
        result: bool,
    ) -> Vec<Patch> {
        let Some(Address::Component { kind, id, .. }) = clause.target_address() else {
            return Vec::new();
        };
        let Some(node) = resolve(dom, root, kind, &id) else {
            tracing::debug!(address = %id, "condition target does not resolve");
            return Vec::new();
        };
        let Some(property) = clause.target_property.as_deref().and_then(Property::parse) else {
            return Vec::new();
        };
        let Some(element_id) = dom.attr(node, "id").map(str::to_string) else {
            return Vec::new();
        };
        match property {
            Property::IsVisible | Property::IsNotVisible => {
                let show = if property == Property::IsVisible { result } else { !result };
                self.visibility(dom, kind, node, show)
            }
            _ if !result => Vec::new(),
            Property::Value => match assignment(clause) {
                Some(value) => vec![Patch::SetValue {
                    id: element_id,
                    value: scalar_text(&value),
                }],
                None => Vec::new(),
            },
            Property::Checked => match assignment(clause) {
                Some(value) => vec![Patch::SetChecked {
                    id: element_id,
                    checked: truthy(&value),
                }],
                None => Vec::new(),
            },
        }
    }

    fn visibility(&self, dom: &Dom, kind: ComponentKind, node: NodeId, show: bool) -> Vec<Patch> {
        let holder = visibility_node(dom, kind, node);
        let Some(holder_id) = dom.attr(holder, "id") else {
            return Vec::new();
        };
        let mut patches = vec![Patch::SetHidden {
            id: holder_id.to_string(),
            hidden: !show,
        }];
        for n in dom.descendants(holder) {
            let Some(id) = dom.attr(n, "id") else { continue };
            if self.required.contains(id) {
                patches.push(Patch::SetRequired {
                    id: id.to_string(),
                    required: show,
                });
            }
        }
        patches
    }
}

fn assignment(clause: &ThenClause) -> Option<Value> {
    clause.assignment.as_deref().and_then(Assignment::parse)?;
    Some(clause.value.clone().unwrap_or(Value::Null))
}

/// Live node for a component. The stage is the form root itself.
pub fn resolve(dom: &Dom, root: NodeId, kind: ComponentKind, id: &str) -> Option<NodeId> {
    if kind == ComponentKind::Stage {
        return Some(root);
    }
    dom.get_by_id(root, id)
}

/// Node whose `hidden` attribute controls visibility: a field's wrapper,
/// or the container itself.
pub fn visibility_node(dom: &Dom, kind: ComponentKind, node: NodeId) -> NodeId {
    match kind {
        ComponentKind::Field => dom.parent(node).unwrap_or(node),
        _ => node,
    }
}

fn choice_inputs(dom: &Dom, node: NodeId) -> Vec<NodeId> {
    dom.descendants(node)
        .into_iter()
        .filter(|n| dom.tag(*n) == Some("input"))
        .filter(|n| matches!(dom.attr(*n, "type"), Some("checkbox") | Some("radio")))
        .collect()
}

fn is_choice_group(dom: &Dom, node: NodeId) -> bool {
    dom.tag(node) == Some("div") && !choice_inputs(dom, node).is_empty()
}

/// Read `property` from a live node.
///
/// Checkbox groups report the checked values as an array, radio groups the
/// checked value, and `checked` on a group is true when any option is.
pub fn read_property(dom: &Dom, kind: ComponentKind, node: NodeId, property: Property) -> Option<Value> {
    match property {
        Property::Value if is_choice_group(dom, node) => {
            let inputs = choice_inputs(dom, node);
            let radio = inputs.iter().any(|n| dom.attr(*n, "type") == Some("radio"));
            let checked: Vec<Value> = inputs
                .iter()
                .filter(|n| dom.checked(**n))
                .map(|n| Value::String(dom.value(*n).unwrap_or("on").to_string()))
                .collect();
            if radio {
                Some(checked.into_iter().next().unwrap_or(Value::String(String::new())))
            } else {
                Some(Value::Array(checked))
            }
        }
        Property::Value => Some(Value::String(dom.value(node).unwrap_or("").to_string())),
        Property::Checked if is_choice_group(dom, node) => Some(Value::Bool(
            choice_inputs(dom, node).iter().any(|n| dom.checked(*n)),
        )),
        Property::Checked => Some(Value::Bool(dom.checked(node))),
        Property::IsVisible | Property::IsNotVisible => {
            let holder = visibility_node(dom, kind, node);
            let visible = !dom.has_attr(holder, "hidden");
            Some(Value::Bool(if property == Property::IsVisible {
                visible
            } else {
                !visible
            }))
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::String(s) => !s.is_empty() && s != "false",
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}
