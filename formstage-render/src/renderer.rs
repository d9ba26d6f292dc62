//! Turns a form-data document into a live form: DOM, condition runtime and
//! input groups.

use crate::html;
use crate::runtime::{EventKind, Patch, Runtime};
use formstage_core::dom::{Dom, NodeConfig, NodeId};
use formstage_core::events::EventBus;
use formstage_core::materialize;
use formstage_core::utils;
use formstage_core::validator;
use formstage_core::{ComponentData, FormData, FormError, FormEvent, FormResult, RendererOptions};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

pub const FORM_CLASS: &str = "formstage-form";
pub const ROW_CLASS: &str = "formstage-row";
pub const COLUMN_CLASS: &str = "formstage-column";
pub const INPUT_GROUP_CLASS: &str = "formstage-input-group";
pub const ADD_GROUP_CLASS: &str = "formstage-input-group-add";
pub const REMOVE_GROUP_CLASS: &str = "formstage-input-group-remove";

pub struct Renderer {
    options: RendererOptions,
    events: EventBus,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("options", &self.options)
            .finish()
    }
}

impl Renderer {
    pub fn new(options: RendererOptions) -> Self {
        Renderer {
            options,
            events: EventBus::new(),
        }
    }

    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&FormEvent) + 'static) {
        self.events.subscribe(listener);
    }

    pub fn render_json(&mut self, json: &str) -> FormResult<RenderedForm> {
        self.render(&FormData::from_json(json)?)
    }

    /// Build the live form for `data`, in stored order, and run every
    /// condition once.
    pub fn render(&mut self, data: &FormData) -> FormResult<RenderedForm> {
        validator::validate_form_data(data)?;
        let form_id = if data.id.is_empty() {
            utils::generate_id()
        } else {
            data.id.clone()
        };

        let mut dom = Dom::new();
        let root = dom.create_element("form");
        dom.set_attr(root, "id", &form_id);
        dom.add_class(root, FORM_CLASS);

        let mut groups = Vec::new();
        for stage in data.stages.values() {
            for row_id in stage.children() {
                let Some(row) = data.rows.get(row_id) else { continue };
                let node = dom.create(&row_config(data, row_id, row));
                dom.append_child(root, node);
                if is_input_group(row) {
                    groups.push(InputGroup {
                        row: row_id.clone(),
                        clones: Vec::new(),
                    });
                }
            }
        }
        sync_select_values(&mut dom, root);

        let runtime = Runtime::build(&dom, root, data, &self.options.external);
        let initial = runtime.apply_conditions(&mut dom, root);
        let container = self
            .options
            .render_container
            .clone()
            .unwrap_or_else(|| form_id.clone());
        tracing::info!(form = %form_id, container = %container, rules = runtime.rule_count(), "form rendered");
        self.events.emit(FormEvent::Rendered {
            container: container.clone(),
        });

        Ok(RenderedForm {
            dom,
            root,
            form_id,
            container,
            runtime,
            groups,
            initial,
        })
    }
}

fn is_input_group(row: &ComponentData) -> bool {
    row.config_value("inputGroup").and_then(Value::as_bool) == Some(true)
}

fn row_config(data: &FormData, row_id: &str, row: &ComponentData) -> NodeConfig {
    let fieldset = row.config_value("fieldset").and_then(Value::as_bool) == Some(true);
    let mut node = NodeConfig::new(if fieldset { "fieldset" } else { "div" })
        .attr("id", row_id)
        .attr("class", ROW_CLASS);
    if fieldset {
        let legend = row
            .config_value("legend")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !legend.is_empty() {
            node = node.child(NodeConfig::new("legend").text(legend));
        }
    }
    for column_id in row.children() {
        let Some(column) = data.columns.get(column_id) else { continue };
        let mut col = NodeConfig::new("div")
            .attr("id", column_id.as_str())
            .attr("class", COLUMN_CLASS);
        if let Some(width) = column.config_value("width").and_then(Value::as_str) {
            col = col.attr("style", format!("width: {}", width));
        }
        for field_id in column.children() {
            if let Some(field) = data.fields.get(field_id) {
                col = col.child(materialize::field_wrapper(field, field_id));
            }
        }
        node = node.child(col);
    }
    if is_input_group(row) {
        let class = format!("{} {}", ROW_CLASS, INPUT_GROUP_CLASS);
        node = node.attr("class", class).child(
            NodeConfig::new("button")
                .attr("type", "button")
                .attr("class", ADD_GROUP_CLASS)
                .attr("data-row", row_id)
                .text("+"),
        );
    }
    node
}

/// Give each `select` the value of its selected (or first) option.
fn sync_select_values(dom: &mut Dom, root: NodeId) {
    let selects: Vec<NodeId> = dom
        .descendants(root)
        .into_iter()
        .filter(|n| dom.tag(*n) == Some("select"))
        .collect();
    for select in selects {
        let options = dom.element_children(select);
        let chosen = options
            .iter()
            .copied()
            .find(|o| dom.has_attr(*o, "selected"))
            .or_else(|| options.first().copied());
        if let Some(option) = chosen {
            let value = dom
                .attr(option, "value")
                .map(str::to_string)
                .unwrap_or_else(|| dom.text_content(option));
            dom.set_value(select, &value);
        }
    }
}

/// A row that users can repeat, with the ids of its live clones.
#[derive(Debug, Clone, PartialEq)]
pub struct InputGroup {
    pub row: String,
    pub clones: Vec<String>,
}

/// A rendered form instance.
#[derive(Debug, Clone)]
pub struct RenderedForm {
    pub dom: Dom,
    pub root: NodeId,
    form_id: String,
    container: String,
    runtime: Runtime,
    groups: Vec<InputGroup>,
    initial: Vec<Patch>,
}

impl RenderedForm {
    pub fn form_id(&self) -> &str {
        &self.form_id
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Patches produced by the first evaluation of every condition.
    pub fn initial_patches(&self) -> &[Patch] {
        &self.initial
    }

    pub fn input_groups(&self) -> &[InputGroup] {
        &self.groups
    }

    /// Element by DOM id.
    pub fn element(&self, id: &str) -> Option<NodeId> {
        self.dom.get_by_id(self.root, id)
    }

    fn require(&self, id: &str) -> FormResult<NodeId> {
        self.element(id).ok_or_else(|| FormError::ComponentNotFound {
            kind: "element".to_string(),
            id: id.to_string(),
        })
    }

    pub fn wrapper(&self, field_id: &str) -> Option<NodeId> {
        self.element(&format!("{}-wrapper", field_id))
    }

    /// Whether a field's wrapper carries `hidden`.
    pub fn is_hidden(&self, field_id: &str) -> bool {
        self.wrapper(field_id)
            .is_some_and(|w| self.dom.has_attr(w, "hidden"))
    }

    pub fn value(&self, id: &str) -> Option<&str> {
        self.element(id).and_then(|n| self.dom.value(n))
    }

    /// Type into a text control.
    pub fn input(&mut self, id: &str, text: &str) -> FormResult<Vec<Patch>> {
        let node = self.require(id)?;
        self.dom.set_value(node, text);
        Ok(self.runtime.dispatch(&mut self.dom, self.root, node, EventKind::Input))
    }

    /// Choose a value in a select.
    pub fn select(&mut self, id: &str, value: &str) -> FormResult<Vec<Patch>> {
        let node = self.require(id)?;
        self.dom.set_value(node, value);
        Ok(self.runtime.dispatch(&mut self.dom, self.root, node, EventKind::Change))
    }

    /// Tick or untick a checkbox/radio. Checking a radio clears its siblings.
    pub fn set_checked(&mut self, id: &str, checked: bool) -> FormResult<Vec<Patch>> {
        let node = self.require(id)?;
        if checked && self.dom.attr(node, "type") == Some("radio") {
            if let Some(name) = self.dom.attr(node, "name").map(str::to_string) {
                let siblings: Vec<NodeId> = self
                    .dom
                    .descendants(self.root)
                    .into_iter()
                    .filter(|n| *n != node && self.dom.attr(*n, "name") == Some(name.as_str()))
                    .collect();
                for sibling in siblings {
                    self.dom.set_checked(sibling, false);
                }
            }
        }
        self.dom.set_checked(node, checked);
        Ok(self.runtime.dispatch(&mut self.dom, self.root, node, EventKind::Change))
    }

    /// Duplicate an input-group row after its last copy. The clone gets fresh
    /// ids, its labels follow them, and it carries a remove button instead of
    /// the add button. Returns the clone's row id.
    pub fn add_input_group(&mut self, row_id: &str) -> FormResult<String> {
        let slot = self
            .groups
            .iter()
            .position(|g| g.row == row_id)
            .ok_or_else(|| FormError::ValidationError(format!("row '{}' is not an input group", row_id)))?;
        let source = self.require(row_id)?;
        let parent = self.dom.parent(source).unwrap_or(self.root);
        let copy = self
            .dom
            .deep_clone(source)
            .ok_or_else(|| FormError::ValidationError(format!("row '{}' could not be cloned", row_id)))?;

        let nodes = self.dom.descendants(copy);
        let mut ids: HashMap<String, String> = HashMap::new();
        for n in &nodes {
            if let Some(old) = self.dom.attr(*n, "id").map(str::to_string) {
                let fresh = Uuid::new_v4().to_string();
                self.dom.set_attr(*n, "id", &fresh);
                ids.insert(old, fresh);
            }
        }
        for n in &nodes {
            for attr in ["for", "name"] {
                let remapped = self.dom.attr(*n, attr).and_then(|v| ids.get(v)).cloned();
                if let Some(new) = remapped {
                    self.dom.set_attr(*n, attr, &new);
                }
            }
            if self.dom.has_class(*n, ADD_GROUP_CLASS) {
                self.dom.remove(*n);
            }
        }
        let clone_id = ids.get(row_id).cloned().unwrap_or_default();
        let remove = NodeConfig::new("button")
            .attr("type", "button")
            .attr("class", REMOVE_GROUP_CLASS)
            .attr("data-row", clone_id.as_str())
            .text("-");
        self.dom.render(&remove, copy);

        let last = self.groups[slot]
            .clones
            .last()
            .and_then(|id| self.element(id))
            .unwrap_or(source);
        let at = self
            .dom
            .children(parent)
            .iter()
            .position(|c| *c == last)
            .map(|i| i + 1)
            .unwrap_or(usize::MAX);
        self.dom.insert_child(parent, copy, at);
        self.groups[slot].clones.push(clone_id.clone());
        tracing::debug!(row = %row_id, clone = %clone_id, "input group duplicated");
        Ok(clone_id)
    }

    /// Remove a clone made by [`add_input_group`](Self::add_input_group).
    pub fn remove_input_group(&mut self, clone_id: &str) -> FormResult<()> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.clones.iter().any(|c| c == clone_id))
            .ok_or_else(|| FormError::ComponentNotFound {
                kind: "input group clone".to_string(),
                id: clone_id.to_string(),
            })?;
        group.clones.retain(|c| c != clone_id);
        if let Some(node) = self.dom.get_by_id(self.root, clone_id) {
            self.dom.remove(node);
        }
        Ok(())
    }

    pub fn to_html(&self) -> String {
        html::to_html(&self.dom, self.root)
    }

    /// The form as a standalone HTML page.
    pub fn page(&self, title: &str) -> FormResult<String> {
        html::page(title, &self.to_html(), None)
    }
}
