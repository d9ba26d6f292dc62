//! The editor context: one form, its palette, drag state, preview and
//! collaborators, with every mutation followed by preview regeneration and
//! (optionally) session persistence.

use crate::columns::{self, PresetOption, ResizeStart};
use crate::conditions::{self, AddressOption, ConditionMap};
use crate::config::EditorOptions;
use crate::controls::ControlRegistry;
use crate::dnd::{self, Container, DragDrop, DragItem, DragState, DropOutcome, DRAGGING_CLASS};
use crate::document::FormData;
use crate::error::FormResult;
use crate::events::{Actions, Confirm, ConfirmRequest, DefaultActions, FormEvent};
use crate::form::{ActionButtons, Form};
use crate::kind::ComponentKind;
use crate::materialize::{self, Preview};
use crate::panels::{self, EditInput, EditOutcome, EditPanels, PanelContext};
use crate::resources::{self, ResourceLoader, ResourcePlan, Resources};
use crate::storage::{MemoryStorage, SessionStorage, STORAGE_KEY};
use serde_json::Value;

pub struct Editor {
    options: EditorOptions,
    form: Form,
    controls: ControlRegistry,
    dnd: DragDrop,
    condition_map: ConditionMap,
    storage: Box<dyn SessionStorage>,
    actions: Box<dyn Actions>,
    resources: Resources,
    preview: Preview,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("form", &self.form.id())
            .field("components", &self.form.component_count())
            .field("dragging", &self.dnd.is_dragging())
            .finish()
    }
}

impl Editor {
    /// Editor backed by in-memory session storage.
    pub fn new(options: EditorOptions) -> FormResult<Self> {
        Editor::with_storage(options, Box::new(MemoryStorage::new()))
    }

    /// Build the editor. The initial document comes from `formData`, else
    /// from session storage when enabled, else the form starts empty.
    ///
    /// Subscribers attach after construction, so the initial load is
    /// announced by [`init_resources`](Self::init_resources) instead.
    pub fn with_storage(options: EditorOptions, storage: Box<dyn SessionStorage>) -> FormResult<Self> {
        let controls = ControlRegistry::new(&options.controls)?;
        let mut form = Form::with_config(&options.config);

        if let Some(data) = options.form_data()? {
            form.load(data)?;
        } else if options.session_storage {
            if let Some(saved) = storage.get(STORAGE_KEY) {
                // A stale or corrupt saved copy must not block the editor.
                if let Err(e) = form.load_json(&saved) {
                    tracing::warn!(error = %e, "ignoring saved form data");
                }
            }
        }

        let condition_map = ConditionMap::build(&form);
        let preview = materialize::materialize(&form);
        tracing::info!(form = %form.id(), controls = controls.len(), "editor ready");
        Ok(Editor {
            options,
            form,
            controls,
            dnd: DragDrop::new(),
            condition_map,
            storage,
            actions: Box::new(DefaultActions),
            resources: Resources::default(),
            preview,
        })
    }

    pub fn with_actions(mut self, actions: impl Actions + 'static) -> Self {
        self.actions = Box::new(actions);
        self
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&FormEvent) + 'static) {
        self.form.subscribe(listener);
    }

    /// Load sprite, style and locale concurrently, then emit `Loaded`: the
    /// editor is interactive from here on.
    pub async fn init_resources<L: ResourceLoader>(&mut self, loader: &L) -> &Resources {
        let plan = ResourcePlan::from_options(&self.options);
        self.resources = resources::load_resources(loader, &plan).await;
        let form_id = self.form.id().to_string();
        self.form.emit(FormEvent::Loaded { form_id });
        &self.resources
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn controls(&self) -> &ControlRegistry {
        &self.controls
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn condition_map(&self) -> &ConditionMap {
        &self.condition_map
    }

    /// Current editor DOM.
    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    pub fn form_data(&self) -> FormData {
        self.form.form_data()
    }

    /// Regenerate derived state after a structural or data change.
    fn changed(&mut self) {
        self.condition_map = ConditionMap::build(&self.form);
        self.preview = materialize::materialize(&self.form);
        self.persist();
    }

    fn persist(&mut self) {
        if !self.options.session_storage {
            return;
        }
        match self.form.to_json() {
            Ok(json) => {
                if let Err(e) = self.storage.set(STORAGE_KEY, &json) {
                    tracing::warn!(error = %e, "session storage write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "form data could not be serialized"),
        }
    }

    // ─── Components ──────────────────────────────────────────────────

    pub fn add(
        &mut self,
        kind: ComponentKind,
        parent: Option<&str>,
        data: Option<&Value>,
        index: Option<usize>,
    ) -> FormResult<String> {
        let id = self.form.add(kind, parent, data, index)?;
        self.changed();
        Ok(id)
    }

    /// Place a new field built from a palette control into `column`.
    pub fn add_control(&mut self, control_id: &str, column: &str, index: Option<usize>) -> FormResult<String> {
        let id = self
            .form
            .add_field_from_template(control_id, &self.controls, column, index)?;
        self.changed();
        Ok(id)
    }

    pub fn set(&mut self, id: &str, path: &str, value: Value) -> FormResult<Option<Value>> {
        let previous = self.form.set(id, path, value)?;
        self.changed();
        Ok(previous)
    }

    /// Remove a component (cascading) and blank condition clauses that
    /// pointed at anything removed.
    pub fn remove(&mut self, id: &str) -> FormResult<Vec<String>> {
        let removed = self.form.remove(id)?;
        for gone in &removed {
            conditions::clear_stale_references(&mut self.form, &mut self.condition_map, gone)?;
        }
        self.changed();
        Ok(removed)
    }

    pub fn empty(&mut self, id: &str) -> FormResult<Vec<String>> {
        let before: Vec<String> = self.form.all_ids().map(str::to_string).collect();
        let removed = self.form.empty(id)?;
        self.forget_removed(&before)?;
        self.changed();
        Ok(removed)
    }

    /// Blank condition clauses that point at any of `before` that is gone.
    fn forget_removed(&mut self, before: &[String]) -> FormResult<()> {
        let gone: Vec<&String> = before.iter().filter(|id| !self.form.contains(id)).collect();
        for id in gone {
            conditions::clear_stale_references(&mut self.form, &mut self.condition_map, id)?;
        }
        Ok(())
    }

    pub fn clone_component(&mut self, id: &str) -> FormResult<String> {
        let copy = self.form.clone_component(id)?;
        self.changed();
        Ok(copy)
    }

    pub fn action_buttons(&self, id: &str) -> Option<ActionButtons> {
        self.form.action_buttons(id)
    }

    // ─── Drag and drop ───────────────────────────────────────────────

    pub fn dnd(&self) -> &DragDrop {
        &self.dnd
    }

    /// Begin dragging; the source node gets the dragging marker.
    pub fn start_drag(&mut self, item: DragItem, source: Container) -> FormResult<()> {
        let node = match &item {
            DragItem::Component(id) => self.preview.node_of(id),
            DragItem::Control(_) => None,
        };
        self.dnd.start(item, source, node)?;
        if let Some(node) = node {
            self.preview.dom.add_class(node, DRAGGING_CLASS);
        }
        Ok(())
    }

    pub fn drop_on(&mut self, target: &Container, index: Option<usize>) -> FormResult<DropOutcome> {
        let node = match self.dnd.state() {
            DragState::Dragging(session) => session.node,
            DragState::Idle => None,
        };
        let result = self
            .dnd
            .drop_on(&mut self.form, &self.controls, target, index);
        match &result {
            Ok(DropOutcome::Rejected { .. }) | Err(_) => {
                if let Some(node) = node {
                    DragDrop::on_end(&mut self.preview.dom, node);
                }
            }
            Ok(_) => self.changed(),
        }
        result
    }

    pub fn cancel_drag(&mut self) -> FormResult<()> {
        let session = self.dnd.cancel()?;
        if let Some(node) = session.node {
            DragDrop::on_end(&mut self.preview.dom, node);
        }
        Ok(())
    }

    /// Advance deferred preview timers.
    pub fn tick(&mut self, ms: u64) -> usize {
        self.preview.dom.advance(ms)
    }

    pub fn sort(&mut self, container: &str, order: &[String]) -> FormResult<DropOutcome> {
        let outcome = dnd::on_sort(&mut self.form, container, order)?;
        self.changed();
        Ok(outcome)
    }

    // ─── Columns ─────────────────────────────────────────────────────

    pub fn resize_columns(&mut self, start: &ResizeStart, delta_px: f64) -> FormResult<(f64, f64)> {
        let widths = columns::resize(&mut self.form, start, delta_px)?;
        self.changed();
        Ok(widths)
    }

    pub fn column_presets(&self, row: &str) -> FormResult<Vec<PresetOption>> {
        columns::preset_options(&self.form, row)
    }

    pub fn apply_column_preset(&mut self, row: &str, value: &str) -> FormResult<()> {
        columns::apply_preset(&mut self.form, row, value)?;
        self.changed();
        Ok(())
    }

    // ─── Edit panels ─────────────────────────────────────────────────

    pub fn edit_panels(&self, id: &str) -> FormResult<EditPanels> {
        let ctx = PanelContext {
            external: Some(&self.options.external),
        };
        panels::build_panels(&self.form, id, &ctx)
    }

    /// Component and external addresses for condition selects.
    pub fn address_options(&self) -> Vec<AddressOption> {
        let mut options = conditions::component_address_options(&self.form);
        options.extend(conditions::external_address_options(&self.options.external));
        options
    }

    fn after_edit(&mut self, outcome: EditOutcome) -> EditOutcome {
        if outcome.is_applied() {
            self.changed();
        }
        outcome
    }

    pub fn edit(&mut self, id: &str, path: &str, input: EditInput) -> FormResult<EditOutcome> {
        let outcome = panels::apply_edit(&mut self.form, &mut self.condition_map, id, path, input)?;
        Ok(self.after_edit(outcome))
    }

    pub fn add_attribute(&mut self, id: &str, key: &str, value: Value) -> FormResult<EditOutcome> {
        let outcome = panels::add_attribute(&mut self.form, self.actions.as_mut(), id, key, value)?;
        Ok(self.after_edit(outcome))
    }

    pub fn add_option(&mut self, id: &str) -> FormResult<EditOutcome> {
        let outcome = panels::add_option(&mut self.form, self.actions.as_mut(), id)?;
        Ok(self.after_edit(outcome))
    }

    pub fn add_condition(&mut self, id: &str) -> FormResult<EditOutcome> {
        let outcome = panels::add_condition(&mut self.form, id)?;
        Ok(self.after_edit(outcome))
    }

    pub fn remove_entry(&mut self, id: &str, path: &str) -> FormResult<EditOutcome> {
        let outcome = panels::remove_entry(&mut self.form, id, path)?;
        Ok(self.after_edit(outcome))
    }

    // ─── Document ────────────────────────────────────────────────────

    pub fn load_json(&mut self, json: &str) -> FormResult<()> {
        self.form.load_json(json)?;
        self.changed();
        Ok(())
    }

    /// Serialize the form, hand it to the save hook and emit `Saved`.
    pub fn save(&mut self) -> FormResult<FormData> {
        let data = self.form.form_data();
        self.actions.save(&data);
        self.persist();
        self.form.emit(FormEvent::Saved {
            form_data: data.clone(),
        });
        Ok(data)
    }

    /// Clear every field after `confirm` agrees. Returns whether it did.
    pub fn clear_all(&mut self, confirm: &mut dyn Confirm) -> bool {
        let request = ConfirmRequest::ClearAll {
            field_count: self.form.store(ComponentKind::Field).size(),
        };
        if !confirm.confirm(&request) {
            tracing::debug!("clear all declined");
            return false;
        }
        let before: Vec<String> = self.form.all_ids().map(str::to_string).collect();
        self.form.clear_all();
        if let Err(e) = self.forget_removed(&before) {
            tracing::warn!(error = %e, "stale condition references left after clear");
        }
        self.changed();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnd::ContainerRole;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn stage(editor: &Editor) -> Container {
        Container::new(ContainerRole::Stage, editor.form().stage_id())
    }

    fn drop_control(editor: &mut Editor, control: &str) -> String {
        let group = editor.controls().group_of(control).unwrap().id.clone();
        editor
            .start_drag(
                DragItem::Control(control.into()),
                Container::new(ContainerRole::ControlPanel, group),
            )
            .unwrap();
        let target = stage(editor);
        match editor.drop_on(&target, None).unwrap() {
            DropOutcome::Added { id, .. } => id,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mutations_emit_and_regenerate_preview() {
        let mut editor = Editor::new(EditorOptions::default()).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        editor.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        let field = drop_control(&mut editor, "text-input");
        assert!(editor.preview().node_of(&field).is_some());
        editor.set(&field, "config.label", json!("Name")).unwrap();
        assert!(events
            .borrow()
            .iter()
            .any(|e| matches!(e, FormEvent::ComponentUpdated(c) if c.path == "config.label")));
    }

    #[test]
    fn test_session_storage_round_trip() {
        let options = EditorOptions {
            session_storage: true,
            ..Default::default()
        };
        let storage = Rc::new(RefCell::new(MemoryStorage::new()));

        struct Shared(Rc<RefCell<MemoryStorage>>);
        impl SessionStorage for Shared {
            fn get(&self, key: &str) -> Option<String> {
                self.0.borrow().get(key)
            }
            fn set(&mut self, key: &str, value: &str) -> FormResult<()> {
                self.0.borrow_mut().set(key, value)
            }
            fn remove(&mut self, key: &str) {
                self.0.borrow_mut().remove(key)
            }
        }

        let mut editor =
            Editor::with_storage(options.clone(), Box::new(Shared(storage.clone()))).unwrap();
        let field = drop_control(&mut editor, "select");
        let reopened = Editor::with_storage(options, Box::new(Shared(storage))).unwrap();
        assert!(reopened.form().contains(&field));
        assert_eq!(reopened.form_data(), editor.form_data());
    }

    #[test]
    fn test_clear_all_asks_first() {
        let mut editor = Editor::new(EditorOptions::default()).unwrap();
        drop_control(&mut editor, "text-input");
        let mut asked = None;
        let mut deny = |r: &ConfirmRequest| {
            asked = Some(r.clone());
            false
        };
        assert!(!editor.clear_all(&mut deny));
        assert_eq!(asked, Some(ConfirmRequest::ClearAll { field_count: 1 }));
        assert_eq!(editor.form().store(ComponentKind::Field).size(), 1);

        let mut allow = |_: &ConfirmRequest| true;
        assert!(editor.clear_all(&mut allow));
        assert_eq!(editor.form().store(ComponentKind::Field).size(), 0);
        assert!(editor.preview().is_marked_empty(editor.form().stage_id()));
    }

    #[test]
    fn test_save_emits_saved() {
        let mut editor = Editor::new(EditorOptions::default()).unwrap();
        let saved = Rc::new(RefCell::new(None));
        let sink = saved.clone();
        editor.subscribe(move |e| {
            if let FormEvent::Saved { form_data } = e {
                *sink.borrow_mut() = Some(form_data.clone());
            }
        });
        drop_control(&mut editor, "textarea");
        let data = editor.save().unwrap();
        assert_eq!(saved.borrow().as_ref(), Some(&data));
    }

    #[test]
    fn test_removing_source_clears_condition_reference() {
        let mut editor = Editor::new(EditorOptions::default()).unwrap();
        let a = drop_control(&mut editor, "checkbox");
        let b = drop_control(&mut editor, "text-input");
        editor.add_condition(&b).unwrap();
        editor
            .edit(
                &b,
                "conditions.0.if.0.source",
                EditInput::Select(json!(format!("field.{}", a))),
            )
            .unwrap();
        assert_eq!(editor.condition_map().references(&a).len(), 1);
        editor.remove(&a).unwrap();
        assert_eq!(
            editor.form().get_value(&b, "conditions.0.if.0.source"),
            Some(json!(""))
        );
    }

    #[test]
    fn test_emptying_container_clears_condition_reference() {
        let mut editor = Editor::new(EditorOptions::default()).unwrap();
        let a = drop_control(&mut editor, "checkbox");
        let b = drop_control(&mut editor, "text-input");
        editor.add_condition(&b).unwrap();
        editor
            .edit(
                &b,
                "conditions.0.then.0.target",
                EditInput::Select(json!(format!("field.{}", a))),
            )
            .unwrap();
        let column = editor.form().parent(&a).unwrap().to_string();
        let row = editor.form().parent(&column).unwrap().to_string();

        editor.empty(&row).unwrap();
        assert!(!editor.form().contains(&a));
        assert_eq!(
            editor.form().get_value(&b, "conditions.0.then.0.target"),
            Some(json!(""))
        );
        assert!(editor.condition_map().references(&a).is_empty());
    }

    #[test]
    fn test_failed_drop_still_clears_marker() {
        let mut editor = Editor::new(EditorOptions::default()).unwrap();
        let field = drop_control(&mut editor, "text-input");
        let column = editor.form().parent(&field).unwrap().to_string();
        editor
            .start_drag(
                DragItem::Component(field.clone()),
                Container::new(ContainerRole::Column, column.clone()),
            )
            .unwrap();
        let node = editor.preview().node_of(&field).unwrap();
        assert!(editor.preview().dom.has_class(node, DRAGGING_CLASS));

        // The dragged field disappears before the drop lands.
        editor.form.remove(&field).unwrap();
        let stage = stage(&editor);
        assert!(editor.drop_on(&stage, None).is_err());
        assert!(!editor.dnd().is_dragging());
        assert_eq!(editor.preview().dom.pending_timers(), 1);
        editor.tick(dnd::DRAG_RESET_MS);
        assert!(!editor.preview().dom.has_class(node, DRAGGING_CLASS));
    }

    #[tokio::test]
    async fn test_init_resources_announces_loaded() {
        struct NoResources;
        impl ResourceLoader for NoResources {
            async fn fetch(&self, location: &str) -> FormResult<String> {
                Err(crate::error::FormError::ResourceUnavailable {
                    location: location.to_string(),
                    reason: "offline".to_string(),
                })
            }
        }

        let mut editor = Editor::new(EditorOptions::default()).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        editor.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        editor.init_resources(&NoResources).await;
        let form_id = editor.form().id().to_string();
        assert_eq!(*events.borrow(), vec![FormEvent::Loaded { form_id }]);
    }

    #[test]
    fn test_rejected_drop_clears_marker_later() {
        let mut editor = Editor::new(EditorOptions::default()).unwrap();
        let field = drop_control(&mut editor, "text-input");
        let column = editor.form().parent(&field).unwrap().to_string();
        let row = editor.form().parent(&column).unwrap().to_string();
        editor
            .start_drag(
                DragItem::Component(row.clone()),
                Container::new(ContainerRole::Stage, editor.form().stage_id()),
            )
            .unwrap();
        let node = editor.preview().node_of(&row).unwrap();
        assert!(editor.preview().dom.has_class(node, DRAGGING_CLASS));
        let outcome = editor
            .drop_on(&Container::new(ContainerRole::Column, column), None)
            .unwrap();
        assert!(matches!(outcome, DropOutcome::Rejected { .. }));
        editor.tick(dnd::DRAG_RESET_MS);
        assert!(!editor.preview().dom.has_class(node, DRAGGING_CLASS));
    }
}
