//! Drag-and-drop coordination between containers.
//!
//! Each container has a role with fixed acceptance rules. The coordinator
//! owns the single drag session and turns drops into store mutations.

use crate::controls::{ControlRegistry, ControlRole};
use crate::dom::{Dom, NodeId, TimerAction};
use crate::error::{FormError, FormResult};
use crate::form::Form;
use crate::kind::ComponentKind;
use serde::Serialize;

/// Class carried by a node while it is being dragged.
pub const DRAGGING_CLASS: &str = "dragging";
/// Delay before the dragging marker is cleared after a drop.
pub const DRAG_RESET_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerRole {
    Stage,
    Row,
    Column,
    ControlPanel,
}

impl ContainerRole {
    pub fn for_kind(kind: ComponentKind) -> Option<ContainerRole> {
        match kind {
            ComponentKind::Stage => Some(ContainerRole::Stage),
            ComponentKind::Row => Some(ContainerRole::Row),
            ComponentKind::Column => Some(ContainerRole::Column),
            ComponentKind::Field => None,
        }
    }

    pub fn sortable(self) -> bool {
        !matches!(self, ContainerRole::ControlPanel)
    }

    /// Items dragged out of a clone source stay where they are.
    pub fn clone_source(self) -> bool {
        matches!(self, ContainerRole::ControlPanel)
    }
}

/// A drop target or drag source: a component container or a palette group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    pub role: ContainerRole,
    pub id: String,
}

impl Container {
    pub fn new(role: ContainerRole, id: impl Into<String>) -> Self {
        Container {
            role,
            id: id.into(),
        }
    }

    /// The container backing component `id`, if it is one.
    pub fn of(form: &Form, id: &str) -> Option<Container> {
        let role = ContainerRole::for_kind(form.kind_of(id)?)?;
        Some(Container::new(role, id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "camelCase")]
pub enum DragItem {
    /// A palette control, by control id.
    Control(String),
    /// A placed component, by component id.
    Component(String),
}

/// What a dragged item is, for acceptance checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    FieldControl,
    RowControl,
    ColumnControl,
    Existing(ComponentKind),
}

impl ItemKind {
    fn from_role(role: ControlRole) -> Self {
        match role {
            ControlRole::Field => ItemKind::FieldControl,
            ControlRole::Row => ItemKind::RowControl,
            ControlRole::Column => ItemKind::ColumnControl,
        }
    }
}

/// How an accepted item lands in a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Existing component moves as is.
    Move,
    /// Existing component moves inside freshly created wrappers.
    Wrap,
    /// A new component is built from the control.
    Create,
}

fn placement(role: ContainerRole, item: ItemKind) -> Option<Placement> {
    use ComponentKind as K;
    use ContainerRole as R;
    match (role, item) {
        (R::ControlPanel, _) => None,
        (R::Stage, ItemKind::Existing(K::Row)) => Some(Placement::Move),
        (R::Stage, ItemKind::Existing(K::Column | K::Field)) => Some(Placement::Wrap),
        (R::Stage, ItemKind::FieldControl | ItemKind::RowControl | ItemKind::ColumnControl) => {
            Some(Placement::Create)
        }
        (R::Row, ItemKind::Existing(K::Column)) => Some(Placement::Move),
        (R::Row, ItemKind::Existing(K::Field)) => Some(Placement::Wrap),
        (R::Row, ItemKind::FieldControl | ItemKind::ColumnControl) => Some(Placement::Create),
        (R::Column, ItemKind::Existing(K::Field)) => Some(Placement::Move),
        (R::Column, ItemKind::FieldControl) => Some(Placement::Create),
        _ => None,
    }
}

/// Whether `role` takes `item` at all.
pub fn accepts(role: ContainerRole, item: ItemKind) -> bool {
    placement(role, item).is_some()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum DropOutcome {
    /// New records were created; `id` is the dropped component.
    Added { id: String, created: Vec<String> },
    /// An existing component changed parent.
    Moved { id: String, created: Vec<String> },
    /// Reorder within the same container.
    Sorted { id: String },
    /// Incompatible target; nothing changed.
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub item: DragItem,
    pub source: Container,
    /// Editor node marked as dragging, if any.
    pub node: Option<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

/// Owner of the one drag session.
#[derive(Debug, Clone, Default)]
pub struct DragDrop {
    state: DragState,
}

impl DragDrop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Begin a drag. Fails while another drag is in flight.
    pub fn start(&mut self, item: DragItem, source: Container, node: Option<NodeId>) -> FormResult<()> {
        if self.is_dragging() {
            return Err(FormError::DragInProgress);
        }
        tracing::debug!(item = ?item, source = %source.id, "drag started");
        self.state = DragState::Dragging(DragSession { item, source, node });
        Ok(())
    }

    /// Abandon the drag without touching the form.
    pub fn cancel(&mut self) -> FormResult<DragSession> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging(session) => Ok(session),
            DragState::Idle => Err(FormError::NoActiveDrag),
        }
    }

    /// Finish the active drag by dropping onto `target` at `index`.
    pub fn drop_on(
        &mut self,
        form: &mut Form,
        controls: &ControlRegistry,
        target: &Container,
        index: Option<usize>,
    ) -> FormResult<DropOutcome> {
        let session = self.cancel()?;
        let item_id = match &session.item {
            DragItem::Control(id) | DragItem::Component(id) => id.clone(),
        };
        if target.id == item_id {
            return Ok(rejected("cannot drop a component into itself"));
        }
        if session.source == *target && target.role.sortable() {
            return on_sort_move(form, &item_id, target, index);
        }
        on_add(form, controls, &session.item, target, index)
    }

    /// Clear the dragging marker on the session node after a short delay.
    pub fn on_end(dom: &mut Dom, node: NodeId) {
        dom.schedule(
            DRAG_RESET_MS,
            TimerAction::RemoveClass {
                node,
                class: DRAGGING_CLASS.to_string(),
            },
        );
    }
}

fn rejected(reason: &str) -> DropOutcome {
    tracing::debug!(reason, "drop rejected");
    DropOutcome::Rejected {
        reason: reason.to_string(),
    }
}

fn item_kind(
    form: &Form,
    controls: &ControlRegistry,
    item: &DragItem,
) -> FormResult<ItemKind> {
    match item {
        DragItem::Control(id) => controls
            .get(id)
            .map(|c| ItemKind::from_role(c.role()))
            .ok_or_else(|| FormError::UnknownControl(id.clone())),
        DragItem::Component(id) => form
            .kind_of(id)
            .map(ItemKind::Existing)
            .ok_or_else(|| FormError::ComponentNotFound {
                kind: "component".to_string(),
                id: id.clone(),
            }),
    }
}

/// Land `item` in `target`: create from a control or move an existing
/// component, wrapping it in a new row/column when the target needs one.
pub fn on_add(
    form: &mut Form,
    controls: &ControlRegistry,
    item: &DragItem,
    target: &Container,
    index: Option<usize>,
) -> FormResult<DropOutcome> {
    let target_kind = form.kind_of(&target.id);
    if target.role == ContainerRole::ControlPanel
        || target_kind.and_then(ContainerRole::for_kind) != Some(target.role)
    {
        return Ok(rejected("target is not a component container"));
    }
    let kind = item_kind(form, controls, item)?;
    if let DragItem::Component(id) = item {
        if is_ancestor(form, id, &target.id) {
            return Ok(rejected("cannot drop a component inside itself"));
        }
    }
    let Some(placement) = placement(target.role, kind) else {
        return Ok(rejected("container does not accept this item"));
    };

    match (placement, item) {
        (Placement::Create, DragItem::Control(control_id)) => {
            create_from_control(form, controls, control_id, kind, target, index)
        }
        (Placement::Move, DragItem::Component(id)) => {
            let old_parent = form.parent(id).map(str::to_string);
            form.move_to(id, &target.id, index)?;
            cleanup_source(form, old_parent.as_deref())?;
            Ok(DropOutcome::Moved {
                id: id.clone(),
                created: Vec::new(),
            })
        }
        (Placement::Wrap, DragItem::Component(id)) => {
            let old_parent = form.parent(id).map(str::to_string);
            let item_kind = form.kind_of(id).unwrap_or(ComponentKind::Field);
            let (holder, created) = build_wrappers(form, target, item_kind, index)?;
            form.move_to(id, &holder, None)?;
            cleanup_source(form, old_parent.as_deref())?;
            Ok(DropOutcome::Moved {
                id: id.clone(),
                created,
            })
        }
        _ => Ok(rejected("container does not accept this item")),
    }
}

fn is_ancestor(form: &Form, ancestor: &str, id: &str) -> bool {
    let mut cur = Some(id);
    while let Some(c) = cur {
        if c == ancestor {
            return true;
        }
        cur = form.parent(c);
    }
    false
}

/// Create the row/column wrappers needed to host an item of `kind` in
/// `target`. Returns the innermost new container and all created ids.
fn build_wrappers(
    form: &mut Form,
    target: &Container,
    kind: ComponentKind,
    index: Option<usize>,
) -> FormResult<(String, Vec<String>)> {
    let mut created = Vec::new();
    let mut holder = target.id.clone();
    let mut at = index;
    let mut level = ComponentKind::Stage;
    if target.role == ContainerRole::Row {
        level = ComponentKind::Row;
    }
    // Walk down the hierarchy until the holder can take `kind` directly.
    while level.child_kind() != Some(kind) {
        let Some(next) = level.child_kind() else { break };
        holder = form.add(next, Some(&holder), None, at)?;
        created.push(holder.clone());
        at = None;
        level = next;
    }
    Ok((holder, created))
}

fn create_from_control(
    form: &mut Form,
    controls: &ControlRegistry,
    control_id: &str,
    kind: ItemKind,
    target: &Container,
    index: Option<usize>,
) -> FormResult<DropOutcome> {
    let (id, created) = match kind {
        ItemKind::FieldControl => {
            let (column, mut created) = build_wrappers(form, target, ComponentKind::Field, index)?;
            let at = if created.is_empty() { index } else { None };
            let id = form.add_field_from_template(control_id, controls, &column, at)?;
            created.push(id.clone());
            (id, created)
        }
        ItemKind::ColumnControl => {
            let (row, mut created) = build_wrappers(form, target, ComponentKind::Column, index)?;
            let at = if created.is_empty() { index } else { None };
            let id = form.add(ComponentKind::Column, Some(&row), None, at)?;
            created.push(id.clone());
            (id, created)
        }
        ItemKind::RowControl => {
            let row = form.add(ComponentKind::Row, Some(&target.id), None, index)?;
            let column = form.add(ComponentKind::Column, Some(&row), None, None)?;
            (row.clone(), vec![row, column])
        }
        ItemKind::Existing(_) => return Ok(rejected("control expected")),
    };
    tracing::debug!(control = %control_id, id = %id, target = %target.id, "control dropped");
    Ok(DropOutcome::Added { id, created })
}

/// After an item left `container`: an emptied structural wrapper goes too.
pub fn on_remove(form: &mut Form, container: &str) -> FormResult<Vec<String>> {
    match form.kind_of(container) {
        None | Some(ComponentKind::Stage) | Some(ComponentKind::Field) => Ok(Vec::new()),
        Some(_) if form.children(container).is_empty() => form.remove(container),
        Some(ComponentKind::Row) => {
            crate::columns::redistribute(form, container)?;
            Ok(Vec::new())
        }
        Some(_) => Ok(Vec::new()),
    }
}

fn cleanup_source(form: &mut Form, old_parent: Option<&str>) -> FormResult<()> {
    if let Some(parent) = old_parent {
        on_remove(form, parent)?;
    }
    Ok(())
}

/// Rewrite `container`'s order to the given child order.
pub fn on_sort(form: &mut Form, container: &str, order: &[String]) -> FormResult<DropOutcome> {
    form.reorder(container, order)?;
    Ok(DropOutcome::Sorted {
        id: container.to_string(),
    })
}

fn on_sort_move(
    form: &mut Form,
    id: &str,
    target: &Container,
    index: Option<usize>,
) -> FormResult<DropOutcome> {
    if form.parent(id) != Some(target.id.as_str()) {
        return Ok(rejected("item is not a child of the sorted container"));
    }
    let mut order: Vec<String> = form
        .children(&target.id)
        .iter()
        .filter(|c| *c != id)
        .cloned()
        .collect();
    let at = index.unwrap_or(order.len()).min(order.len());
    order.insert(at, id.to_string());
    on_sort(form, &target.id, &order)?;
    Ok(DropOutcome::Sorted { id: id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::LAYOUT_COLUMN;

    fn setup() -> (Form, ControlRegistry, DragDrop) {
        (Form::new(), ControlRegistry::default(), DragDrop::new())
    }

    fn palette(controls: &ControlRegistry, id: &str) -> Container {
        Container::new(ContainerRole::ControlPanel, controls.group_of(id).unwrap().id.clone())
    }

    fn drop_control(
        form: &mut Form,
        controls: &ControlRegistry,
        dnd: &mut DragDrop,
        control: &str,
        target: &Container,
    ) -> DropOutcome {
        dnd.start(DragItem::Control(control.into()), palette(controls, control), None)
            .unwrap();
        dnd.drop_on(form, controls, target, None).unwrap()
    }

    #[test]
    fn test_control_on_stage_wraps_in_row_and_column() {
        let (mut form, controls, mut dnd) = setup();
        let stage = Container::of(&form, form.stage_id()).unwrap();
        let outcome = drop_control(&mut form, &controls, &mut dnd, "text-input", &stage);
        let DropOutcome::Added { id, created } = outcome else {
            panic!("expected Added");
        };
        assert_eq!(created.len(), 3);
        let column = form.parent(&id).unwrap().to_string();
        let row = form.parent(&column).unwrap();
        assert_eq!(form.parent(row), Some(form.stage_id()));
        assert_eq!(form.get(&id).unwrap().field_type(), "text");
        assert!(!dnd.is_dragging());
    }

    #[test]
    fn test_layout_column_on_column_is_rejected() {
        let (mut form, controls, mut dnd) = setup();
        let stage = Container::of(&form, form.stage_id()).unwrap();
        drop_control(&mut form, &controls, &mut dnd, "text-input", &stage);
        let column_id = form.store(ComponentKind::Column).ids()[0].clone();
        let column = Container::of(&form, &column_id).unwrap();
        let before = (
            form.store(ComponentKind::Column).size(),
            form.store(ComponentKind::Field).size(),
        );
        let outcome = drop_control(&mut form, &controls, &mut dnd, LAYOUT_COLUMN, &column);
        assert!(matches!(outcome, DropOutcome::Rejected { .. }));
        let after = (
            form.store(ComponentKind::Column).size(),
            form.store(ComponentKind::Field).size(),
        );
        assert_eq!(before, after);
    }

    #[test]
    fn test_second_drag_is_refused() {
        let (form, _, mut dnd) = setup();
        let stage = Container::of(&form, form.stage_id()).unwrap();
        dnd.start(DragItem::Control("text-input".into()), stage.clone(), None)
            .unwrap();
        assert_eq!(
            dnd.start(DragItem::Control("select".into()), stage, None),
            Err(FormError::DragInProgress)
        );
        dnd.cancel().unwrap();
        assert_eq!(dnd.cancel(), Err(FormError::NoActiveDrag));
    }

    #[test]
    fn test_moving_last_field_cleans_up_source() {
        let (mut form, controls, mut dnd) = setup();
        let stage = Container::of(&form, form.stage_id()).unwrap();
        let DropOutcome::Added { id: a, .. } =
            drop_control(&mut form, &controls, &mut dnd, "text-input", &stage)
        else {
            panic!("expected Added");
        };
        let DropOutcome::Added { id: b, .. } =
            drop_control(&mut form, &controls, &mut dnd, "select", &stage)
        else {
            panic!("expected Added");
        };
        let col_a = form.parent(&a).unwrap().to_string();
        let col_b = form.parent(&b).unwrap().to_string();
        let row_b = form.parent(&col_b).unwrap().to_string();

        dnd.start(
            DragItem::Component(b.clone()),
            Container::of(&form, &col_b).unwrap(),
            None,
        )
        .unwrap();
        let target = Container::of(&form, &col_a).unwrap();
        let outcome = dnd.drop_on(&mut form, &controls, &target, Some(0)).unwrap();
        assert!(matches!(outcome, DropOutcome::Moved { .. }));
        assert_eq!(form.children(&col_a), &[b, a]);
        assert!(!form.contains(&col_b));
        assert!(!form.contains(&row_b));
    }

    #[test]
    fn test_sort_within_container() {
        let (mut form, controls, mut dnd) = setup();
        let stage_id = form.stage_id().to_string();
        let stage = Container::of(&form, &stage_id).unwrap();
        drop_control(&mut form, &controls, &mut dnd, "text-input", &stage);
        drop_control(&mut form, &controls, &mut dnd, "textarea", &stage);
        let rows = form.children(&stage_id).to_vec();
        dnd.start(DragItem::Component(rows[1].clone()), stage.clone(), None)
            .unwrap();
        let outcome = dnd.drop_on(&mut form, &controls, &stage, Some(0)).unwrap();
        assert_eq!(outcome, DropOutcome::Sorted { id: rows[1].clone() });
        assert_eq!(form.children(&stage_id), &[rows[1].clone(), rows[0].clone()]);
    }

    #[test]
    fn test_acceptance_table() {
        assert!(accepts(ContainerRole::Stage, ItemKind::Existing(ComponentKind::Field)));
        assert!(accepts(ContainerRole::Row, ItemKind::ColumnControl));
        assert!(!accepts(ContainerRole::Row, ItemKind::RowControl));
        assert!(!accepts(ContainerRole::Column, ItemKind::Existing(ComponentKind::Row)));
        assert!(!accepts(ContainerRole::ControlPanel, ItemKind::FieldControl));
    }

    #[test]
    fn test_on_end_clears_dragging_marker() {
        let mut dom = Dom::new();
        let node = dom.create_element("div");
        dom.add_class(node, DRAGGING_CLASS);
        DragDrop::on_end(&mut dom, node);
        dom.advance(DRAG_RESET_MS);
        assert!(!dom.has_class(node, DRAGGING_CLASS));
    }
}
