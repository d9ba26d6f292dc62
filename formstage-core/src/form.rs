//! The form context: the four component stores plus the parent index that
//! turns them into one tree. Every structural change goes through here so
//! that `children` order, parent links and id uniqueness stay consistent.

use crate::columns;
use crate::component::ComponentData;
use crate::config::ComponentConfigs;
use crate::document::FormData;
use crate::error::{FormError, FormResult};
use crate::events::{Change, EventBus, FormEvent};
use crate::kind::ComponentKind;
use crate::store::{ComponentStore, TemplateLookup};
use crate::utils;
use crate::validator;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

#[derive(Debug)]
pub struct Form {
    id: String,
    root: String,
    stages: ComponentStore,
    rows: ComponentStore,
    columns: ComponentStore,
    fields: ComponentStore,
    /// child id -> parent id
    parents: HashMap<String, String>,
    /// id -> kind, across all stores
    kinds: HashMap<String, ComponentKind>,
    extra: Map<String, Value>,
    events: EventBus,
}

impl Default for Form {
    fn default() -> Self {
        Form::new()
    }
}

impl Form {
    pub fn new() -> Self {
        Form::with_config(&ComponentConfigs::default())
    }

    /// Empty form whose stores merge `config` over each kind's defaults.
    pub fn with_config(config: &ComponentConfigs) -> Self {
        let store = |kind| ComponentStore::with_config_defaults(kind, config.for_kind(kind));
        let mut form = Form {
            id: utils::generate_id(),
            root: String::new(),
            stages: store(ComponentKind::Stage),
            rows: store(ComponentKind::Row),
            columns: store(ComponentKind::Column),
            fields: store(ComponentKind::Field),
            parents: HashMap::new(),
            kinds: HashMap::new(),
            extra: Map::new(),
            events: EventBus::new(),
        };
        form.ensure_stage();
        form
    }

    fn ensure_stage(&mut self) {
        if let Some(first) = self.stages.ids().into_iter().next() {
            self.root = first;
            return;
        }
        // Adding to an empty store with no supplied data cannot fail.
        if let Ok(id) = self.stages.add(None, None) {
            self.kinds.insert(id.clone(), ComponentKind::Stage);
            self.root = id;
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The root stage.
    pub fn stage_id(&self) -> &str {
        &self.root
    }

    pub fn store(&self, kind: ComponentKind) -> &ComponentStore {
        match kind {
            ComponentKind::Stage => &self.stages,
            ComponentKind::Row => &self.rows,
            ComponentKind::Column => &self.columns,
            ComponentKind::Field => &self.fields,
        }
    }

    fn store_mut(&mut self, kind: ComponentKind) -> &mut ComponentStore {
        match kind {
            ComponentKind::Stage => &mut self.stages,
            ComponentKind::Row => &mut self.rows,
            ComponentKind::Column => &mut self.columns,
            ComponentKind::Field => &mut self.fields,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&FormEvent) + 'static) {
        self.events.subscribe(listener);
    }

    pub(crate) fn emit(&mut self, event: FormEvent) {
        self.events.emit(event);
    }

    // ─── Lookup ──────────────────────────────────────────────────────

    pub fn kind_of(&self, id: &str) -> Option<ComponentKind> {
        self.kinds.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.kinds.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ComponentData> {
        self.store(self.kind_of(id)?).get(id)
    }

    fn require(&self, id: &str) -> FormResult<ComponentKind> {
        self.kind_of(id).ok_or_else(|| FormError::ComponentNotFound {
            kind: "component".to_string(),
            id: id.to_string(),
        })
    }

    /// Read `path` inside component `id`.
    pub fn get_value(&self, id: &str, path: &str) -> Option<Value> {
        self.get(id)?.get(path)
    }

    /// Resolve a document path such as `fields.<id>.attrs.type`.
    ///
    /// The leading segment may be a store key or a singular kind name.
    pub fn resolve(&self, path: &str) -> Option<Value> {
        let (head, rest) = path.split_once('.')?;
        let kind = ComponentKind::from_any(head)?;
        self.store(kind).get_path(rest)
    }

    /// `"<store>.<id>."`, the prefix under which a component's data lives.
    pub fn data_path(&self, id: &str) -> Option<String> {
        let kind = self.kind_of(id)?;
        Some(format!("{}.{}.", kind.store_key(), id))
    }

    pub fn parent(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    pub fn children(&self, id: &str) -> &[String] {
        self.get(id).map(ComponentData::children).unwrap_or(&[])
    }

    pub fn index_in_parent(&self, id: &str) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| c == id)
    }

    /// Derived "empty" marker of a container.
    pub fn is_empty(&self, id: &str) -> bool {
        self.kind_of(id).is_some_and(ComponentKind::is_container) && self.children(id).is_empty()
    }

    pub fn component_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn all_ids(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Field ids in document order (stage → rows → columns → fields).
    pub fn fields_in_order(&self) -> Vec<String> {
        self.walk()
            .into_iter()
            .filter(|(kind, _)| *kind == ComponentKind::Field)
            .map(|(_, id)| id)
            .collect()
    }

    /// Depth-first walk of the tree from the root stage, in stored order.
    pub fn walk(&self) -> Vec<(ComponentKind, String)> {
        let mut out = Vec::new();
        self.walk_from(&self.root, &mut out);
        out
    }

    fn walk_from(&self, id: &str, out: &mut Vec<(ComponentKind, String)>) {
        let Some(kind) = self.kind_of(id) else { return };
        out.push((kind, id.to_string()));
        for child in self.children(id) {
            self.walk_from(child, out);
        }
    }

    // ─── Structural mutation ─────────────────────────────────────────

    /// Create a component of `kind` under `parent` at `index` (end if `None`).
    ///
    /// Supplied `data` is merged over the kind defaults; any `children` in
    /// it are ignored because children are only linked structurally.
    pub fn add(
        &mut self,
        kind: ComponentKind,
        parent: Option<&str>,
        data: Option<&Value>,
        index: Option<usize>,
    ) -> FormResult<String> {
        let mut data = data.cloned().unwrap_or_else(|| json!({}));
        if let Some(obj) = data.as_object_mut() {
            obj.remove("children");
        }
        if let Some(id) = data.get("id").and_then(Value::as_str) {
            if self.contains(id) {
                return Err(FormError::DuplicateId { id: id.to_string() });
            }
        }
        match parent {
            Some(parent) => self.check_parent(parent, kind)?,
            None if kind != ComponentKind::Stage => {
                return Err(FormError::ValidationError(format!(
                    "a {} must be added to a {}",
                    kind,
                    kind.parent_kind().map(ComponentKind::name).unwrap_or("container")
                )));
            }
            None => {}
        }

        let id = self.store_mut(kind).add(None, Some(&data))?;
        self.register(kind, id.clone(), parent, index)?;
        Ok(id)
    }

    /// Materialize a field from a control template and place it in `column`.
    pub fn add_field_from_template(
        &mut self,
        control_id: &str,
        lookup: &dyn TemplateLookup,
        column: &str,
        index: Option<usize>,
    ) -> FormResult<String> {
        self.check_parent(column, ComponentKind::Field)?;
        let id = self.fields.get_or_materialize(control_id, lookup)?;
        if self.contains(&id) {
            // An existing field was referenced; move it instead of duplicating.
            self.move_to(&id, column, index)?;
            return Ok(id);
        }
        self.register(ComponentKind::Field, id.clone(), Some(column), index)?;
        Ok(id)
    }

    fn register(
        &mut self,
        kind: ComponentKind,
        id: String,
        parent: Option<&str>,
        index: Option<usize>,
    ) -> FormResult<()> {
        self.kinds.insert(id.clone(), kind);
        tracing::debug!(kind = %kind, id = %id, "component created");
        self.emit(FormEvent::ComponentAdded {
            kind,
            id: id.clone(),
            parent: parent.map(str::to_string),
        });
        if let Some(parent) = parent {
            self.attach(parent, &id, index)?;
            if kind == ComponentKind::Column {
                columns::redistribute(self, parent)?;
            }
        }
        Ok(())
    }

    fn check_parent(&self, parent: &str, child_kind: ComponentKind) -> FormResult<()> {
        let parent_kind = self.kind_of(parent).ok_or_else(|| FormError::ComponentNotFound {
            kind: child_kind
                .parent_kind()
                .map(ComponentKind::name)
                .unwrap_or("container")
                .to_string(),
            id: parent.to_string(),
        })?;
        if parent_kind.child_kind() != Some(child_kind) {
            return Err(FormError::InvalidChild {
                parent: parent_kind.to_string(),
                child: child_kind.to_string(),
            });
        }
        Ok(())
    }

    fn attach(&mut self, parent: &str, child: &str, index: Option<usize>) -> FormResult<()> {
        let child_kind = self.require(child)?;
        self.check_parent(parent, child_kind)?;
        if let Some(owner) = self.parents.get(child) {
            return Err(FormError::SharedChild {
                id: child.to_string(),
                first: owner.clone(),
                second: parent.to_string(),
            });
        }
        let parent_kind = self.require(parent)?;
        let record = self
            .store_mut(parent_kind)
            .get_mut(parent)
            .ok_or_else(|| FormError::ComponentNotFound {
                kind: parent_kind.to_string(),
                id: parent.to_string(),
            })?;
        let children = record.children_mut();
        let previous = children.clone();
        let at = index.unwrap_or(children.len()).min(children.len());
        children.insert(at, child.to_string());
        let value = children.clone();
        self.parents.insert(child.to_string(), parent.to_string());
        self.emit_children_change(parent_kind, parent, previous, value);
        Ok(())
    }

    /// Unlink `child` from its parent; returns the old parent and position.
    fn detach(&mut self, child: &str) -> Option<(String, usize)> {
        let parent = self.parents.remove(child)?;
        let parent_kind = self.kind_of(&parent)?;
        let record = self.store_mut(parent_kind).get_mut(&parent)?;
        let children = record.children_mut();
        let previous = children.clone();
        let at = children.iter().position(|c| c == child)?;
        children.remove(at);
        let value = children.clone();
        self.emit_children_change(parent_kind, &parent, previous, value);
        Some((parent, at))
    }

    fn emit_children_change(
        &mut self,
        kind: ComponentKind,
        id: &str,
        previous: Vec<String>,
        value: Vec<String>,
    ) {
        self.emit(FormEvent::ComponentUpdated(Change {
            kind,
            id: id.to_string(),
            path: "children".to_string(),
            previous: Some(json!(previous)),
            value: Some(json!(value)),
        }));
    }

    /// Move an existing component under `new_parent` at `index`.
    ///
    /// `index` counts positions after the component left its old parent.
    /// The old parent is not cascaded; drag coordination decides that.
    pub fn move_to(&mut self, id: &str, new_parent: &str, index: Option<usize>) -> FormResult<()> {
        let kind = self.require(id)?;
        self.check_parent(new_parent, kind)?;
        let old = self.detach(id);
        if let Err(e) = self.attach(new_parent, id, index) {
            // Put it back where it was so no orphan is left behind.
            if let Some((parent, at)) = old {
                self.attach(&parent, id, Some(at))?;
            }
            return Err(e);
        }
        if kind == ComponentKind::Column {
            if let Some((old_parent, _)) = &old {
                if old_parent != new_parent && self.contains(old_parent) {
                    columns::redistribute(self, old_parent)?;
                }
            }
            columns::redistribute(self, new_parent)?;
        }
        Ok(())
    }

    /// Rewrite the child order of `parent`. `order` must be a permutation.
    pub fn reorder(&mut self, parent: &str, order: &[String]) -> FormResult<()> {
        let kind = self.require(parent)?;
        let current = self.children(parent).to_vec();
        let mut a = current.clone();
        let mut b = order.to_vec();
        a.sort();
        b.sort();
        if a != b {
            return Err(FormError::ValidationError(format!(
                "new order for {} '{}' is not a permutation of its children",
                kind, parent
            )));
        }
        if current == order {
            return Ok(());
        }
        if let Some(record) = self.store_mut(kind).get_mut(parent) {
            *record.children_mut() = order.to_vec();
        }
        self.emit_children_change(kind, parent, current, order.to_vec());
        Ok(())
    }

    /// Remove a component and everything below it.
    ///
    /// A parent left without children is removed as well, repeatedly, up to
    /// the stage, which is only ever emptied. Returns every removed id.
    pub fn remove(&mut self, id: &str) -> FormResult<Vec<String>> {
        let kind = self.require(id)?;
        if kind == ComponentKind::Stage {
            return self.empty(id);
        }
        let parent = self.parent(id).map(str::to_string);
        let mut removed = Vec::new();
        self.remove_subtree(id, &mut removed);
        if let Some(parent) = parent {
            self.cascade_empty(&parent, &mut removed)?;
        }
        Ok(removed)
    }

    /// Remove every child of `id`. Returns the removed direct children.
    ///
    /// Unlike `remove`, the emptied container itself stays.
    pub fn empty(&mut self, id: &str) -> FormResult<Vec<String>> {
        self.require(id)?;
        let children = self.children(id).to_vec();
        let mut removed = Vec::new();
        for child in &children {
            self.remove_subtree(child, &mut removed);
        }
        if self.kind_of(id) == Some(ComponentKind::Row) {
            columns::redistribute(self, id)?;
        }
        Ok(children)
    }

    fn remove_subtree(&mut self, id: &str, removed: &mut Vec<String>) {
        let Some(kind) = self.kind_of(id) else { return };
        for child in self.children(id).to_vec() {
            self.remove_subtree(&child, removed);
        }
        self.detach(id);
        self.store_mut(kind).remove(id);
        self.kinds.remove(id);
        tracing::debug!(kind = %kind, id = %id, "component removed");
        self.emit(FormEvent::ComponentRemoved {
            kind,
            id: id.to_string(),
        });
        removed.push(id.to_string());
    }

    fn cascade_empty(&mut self, parent: &str, removed: &mut Vec<String>) -> FormResult<()> {
        let Some(kind) = self.kind_of(parent) else {
            return Ok(());
        };
        if !self.children(parent).is_empty() {
            if kind == ComponentKind::Row {
                columns::redistribute(self, parent)?;
            }
            return Ok(());
        }
        if kind == ComponentKind::Stage {
            tracing::debug!(stage = %parent, "stage is empty");
            return Ok(());
        }
        let grandparent = self.parent(parent).map(str::to_string);
        self.remove_subtree(parent, removed);
        match grandparent {
            Some(g) => self.cascade_empty(&g, removed),
            None => Ok(()),
        }
    }

    /// Set `path` inside component `id`; emits a change descriptor.
    ///
    /// `children` is structural and only changes through add/move/remove.
    pub fn set(&mut self, id: &str, path: &str, value: Value) -> FormResult<Option<Value>> {
        let kind = self.require(id)?;
        if utils::root_key(path).as_deref() == Some("children") {
            return Err(FormError::ReadOnlyPath {
                path: path.to_string(),
            });
        }
        let record = self
            .store_mut(kind)
            .get_mut(id)
            .ok_or_else(|| FormError::ComponentNotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            })?;
        let previous = record.set(path, value.clone())?;
        self.emit(FormEvent::ComponentUpdated(Change {
            kind,
            id: id.to_string(),
            path: path.to_string(),
            previous: previous.clone(),
            value: Some(value),
        }));
        Ok(previous)
    }

    /// Remove a single attribute, option or condition by path.
    pub fn remove_path(&mut self, id: &str, path: &str) -> FormResult<Option<Value>> {
        let kind = self.require(id)?;
        if utils::root_key(path).as_deref() == Some("children") {
            return Err(FormError::ReadOnlyPath {
                path: path.to_string(),
            });
        }
        let record = self
            .store_mut(kind)
            .get_mut(id)
            .ok_or_else(|| FormError::ComponentNotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            })?;
        let removed = record.remove(path)?;
        if removed.is_some() {
            self.emit(FormEvent::ComponentUpdated(Change {
                kind,
                id: id.to_string(),
                path: path.to_string(),
                previous: removed.clone(),
                value: None,
            }));
        }
        Ok(removed)
    }

    /// Duplicate `id` and its subtree with fresh ids, placed right after it.
    pub fn clone_component(&mut self, id: &str) -> FormResult<String> {
        let kind = self.require(id)?;
        let parent = self
            .parent(id)
            .map(str::to_string)
            .ok_or_else(|| FormError::ValidationError(format!("{} '{}' cannot be cloned", kind, id)))?;
        let index = self.index_in_parent(id).map(|i| i + 1);
        self.clone_into(id, &parent, index)
    }

    fn clone_into(&mut self, id: &str, parent: &str, index: Option<usize>) -> FormResult<String> {
        let kind = self.require(id)?;
        let record = self
            .get(id)
            .cloned()
            .ok_or_else(|| FormError::ComponentNotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            })?;
        let mut value = record.to_value()?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("id");
        }
        let new_id = self.add(kind, Some(parent), Some(&value), index)?;
        for child in record.children() {
            self.clone_into(child, &new_id, None)?;
        }
        if kind == ComponentKind::Row {
            // Column clones were redistributed one by one; restore the source widths.
            let widths: Vec<Option<Value>> = record
                .children()
                .iter()
                .map(|c| self.get_value(c, "config.width"))
                .collect();
            let clones = self.children(&new_id).to_vec();
            for (col, width) in clones.iter().zip(widths) {
                if let Some(width) = width {
                    self.set(col, "config.width", width)?;
                }
            }
        }
        Ok(new_id)
    }

    /// Move/edit/clone/remove controls for a component.
    pub fn action_buttons(&self, id: &str) -> Option<ActionButtons> {
        let kind = self.kind_of(id)?;
        let buttons = match kind {
            ComponentKind::Stage => Vec::new(),
            _ => vec![
                ActionButton::new(Action::Move, kind),
                ActionButton::new(Action::Edit, kind),
                ActionButton::new(Action::Clone, kind),
                ActionButton::new(Action::Remove, kind),
            ],
        };
        Some(ActionButtons {
            kind,
            component_id: id.to_string(),
            buttons,
        })
    }

    // ─── Document ────────────────────────────────────────────────────

    pub fn form_data(&self) -> FormData {
        FormData {
            id: self.id.clone(),
            stages: self.stages.to_records(),
            rows: self.rows.to_records(),
            columns: self.columns.to_records(),
            fields: self.fields.to_records(),
            extra: self.extra.clone(),
        }
    }

    pub fn to_json(&self) -> FormResult<String> {
        self.form_data().to_json()
    }

    /// Replace the whole tree with `data`. Nothing changes if validation fails.
    pub fn load(&mut self, data: FormData) -> FormResult<()> {
        validator::validate_form_data(&data)?;

        let mut kinds = HashMap::new();
        let mut parents = HashMap::new();
        for kind in ComponentKind::ALL {
            for (id, record) in data.records(kind) {
                kinds.insert(id.clone(), kind);
                for child in record.children() {
                    parents.insert(child.clone(), id.clone());
                }
            }
        }

        self.id = if data.id.is_empty() {
            utils::generate_id()
        } else {
            data.id.clone()
        };
        self.extra = data.extra.clone();
        for kind in ComponentKind::ALL {
            self.store_mut(kind).load(data.records(kind).clone());
        }
        self.kinds = kinds;
        self.parents = parents;
        self.ensure_stage();
        tracing::info!(form = %self.id, components = self.kinds.len(), "form loaded");
        let form_id = self.id.clone();
        self.emit(FormEvent::Loaded { form_id });
        Ok(())
    }

    /// Parse and load a JSON document.
    pub fn load_json(&mut self, json: &str) -> FormResult<()> {
        self.load(FormData::from_json(json)?)
    }

    /// Clear the form: every row, column and field goes, stages stay empty.
    pub fn clear_all(&mut self) {
        self.stages.clear_all();
        for kind in [ComponentKind::Row, ComponentKind::Column, ComponentKind::Field] {
            self.store_mut(kind).clear();
        }
        self.kinds.retain(|_, k| *k == ComponentKind::Stage);
        self.parents.clear();
        self.emit(FormEvent::Cleared);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Move,
    Edit,
    Clone,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionButton {
    pub action: Action,
    pub title: String,
    pub icon: String,
}

impl ActionButton {
    fn new(action: Action, kind: ComponentKind) -> Self {
        let (verb, icon) = match action {
            Action::Move => ("Move", "move"),
            Action::Edit => ("Edit", "edit"),
            Action::Clone => ("Clone", "copy"),
            Action::Remove => ("Remove", "remove"),
        };
        ActionButton {
            action,
            title: format!("{} {}", verb, kind),
            icon: format!("{}-{}", icon, kind),
        }
    }
}

/// Declarative description of a component's action buttons.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionButtons {
    pub kind: ComponentKind,
    pub component_id: String,
    pub buttons: Vec<ActionButton>,
}
