//! Edit-panel generation and the write-back of panel edits.
//!
//! Rows are derived from the runtime shape of each value (see
//! [`ValueKind`]); edits are dispatched the same way before they reach the
//! form. Disabled and locked entries come from
//! `config.panels.<panel>.{disabled,locked,hideDisabled}`.

use crate::component::ComponentData;
use crate::conditions::{self, Condition, ConditionMap};
use crate::error::{FormError, FormResult};
use crate::events::{Actions, AttributeRequest, FormEvent, OptionRequest};
use crate::form::Form;
use crate::kind::ComponentKind;
use crate::utils::{self, Segment};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

fn attribute_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z_:][-a-zA-Z0-9_:.]*$").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PanelName {
    Attrs,
    Options,
    Conditions,
    Config,
}

impl PanelName {
    pub const ALL: [PanelName; 4] = [
        PanelName::Attrs,
        PanelName::Options,
        PanelName::Conditions,
        PanelName::Config,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PanelName::Attrs => "attrs",
            PanelName::Options => "options",
            PanelName::Conditions => "conditions",
            PanelName::Config => "config",
        }
    }

    pub fn parse(s: &str) -> Option<PanelName> {
        PanelName::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

/// Runtime shape of a data value, which picks the generated input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Boolean,
    Number,
    Array,
    Object,
    Null,
}

impl ValueKind {
    pub fn of(value: &Value) -> ValueKind {
        match value {
            Value::String(_) => ValueKind::String,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::Null => ValueKind::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: Value,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelInput {
    Text { value: String },
    Checkbox { checked: bool },
    /// Exclusive boolean; checking one clears its siblings.
    Radio { checked: bool, name: String },
    Number { value: Value },
    Select {
        options: Vec<SelectOption>,
        /// Options are component or external addresses.
        address: bool,
    },
    Group { rows: Vec<PanelRow> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelRow {
    pub key: String,
    /// Path of the value inside the component record.
    pub path: String,
    pub input: PanelInput,
    pub disabled: bool,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub name: PanelName,
    pub rows: Vec<PanelRow>,
    /// Whether the panel offers a "+" button.
    pub addable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPanels {
    pub component_id: String,
    pub panels: Vec<Panel>,
}

impl EditPanels {
    pub fn panel(&self, name: PanelName) -> Option<&Panel> {
        self.panels.iter().find(|p| p.name == name)
    }
}

/// `config.panels.<name>` for one panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelPolicy {
    pub disabled: Vec<String>,
    pub locked: Vec<String>,
    pub hide_disabled: bool,
}

impl PanelPolicy {
    pub fn for_panel(record: &ComponentData, panel: PanelName) -> PanelPolicy {
        let Some(cfg) = record
            .config_value("panels")
            .and_then(|p| p.get(panel.as_str()))
        else {
            return PanelPolicy::default();
        };
        let list = |key: &str| -> Vec<String> {
            cfg.get(key)
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default()
        };
        PanelPolicy {
            disabled: list("disabled"),
            locked: list("locked"),
            hide_disabled: cfg.get("hideDisabled").and_then(Value::as_bool).unwrap_or(false),
        }
    }

    pub fn is_disabled(&self, key: &str) -> bool {
        self.disabled.iter().any(|k| k == key)
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.locked.iter().any(|k| k == key)
    }
}

/// Collaborator data needed to fill address selects.
#[derive(Debug, Clone, Default)]
pub struct PanelContext<'a> {
    pub external: Option<&'a Map<String, Value>>,
}

// ─── Generation ──────────────────────────────────────────────────────

/// Build every panel for component `id`.
///
/// Fields get attrs/options/conditions/config; layout fields and the
/// other kinds only get a config panel.
pub fn build_panels(form: &Form, id: &str, ctx: &PanelContext<'_>) -> FormResult<EditPanels> {
    let kind = form.kind_of(id).ok_or_else(|| FormError::ComponentNotFound {
        kind: "component".to_string(),
        id: id.to_string(),
    })?;
    let record = form.get(id).ok_or_else(|| FormError::ComponentNotFound {
        kind: kind.to_string(),
        id: id.to_string(),
    })?;

    let mut panels = Vec::new();
    if kind == ComponentKind::Field && !record.is_layout() {
        panels.push(attrs_panel(record));
        if record.options.is_some() {
            panels.push(options_panel(record));
        }
        panels.push(conditions_panel(form, record, ctx));
    }
    panels.push(config_panel(kind, record));
    Ok(EditPanels {
        component_id: id.to_string(),
        panels,
    })
}

fn attrs_panel(record: &ComponentData) -> Panel {
    let policy = PanelPolicy::for_panel(record, PanelName::Attrs);
    let rows = record
        .attrs
        .iter()
        .flatten()
        .filter_map(|(k, v)| {
            let row = value_row(record, k, &format!("attrs.{}", k), v, &policy)?;
            Some(row)
        })
        .collect();
    Panel {
        name: PanelName::Attrs,
        rows,
        addable: true,
    }
}

fn options_panel(record: &ComponentData) -> Panel {
    let policy = PanelPolicy::for_panel(record, PanelName::Options);
    let rows = record
        .options
        .iter()
        .flatten()
        .enumerate()
        .map(|(i, option)| PanelRow {
            key: i.to_string(),
            path: format!("options.{}", i),
            input: match option {
                Value::Object(map) => PanelInput::Group {
                    rows: map
                        .iter()
                        .filter_map(|(k, v)| {
                            value_row(record, k, &format!("options.{}.{}", i, k), v, &policy)
                        })
                        .collect(),
                },
                other => PanelInput::Text {
                    value: scalar_text(other),
                },
            },
            disabled: false,
            locked: policy.is_locked(&i.to_string()),
        })
        .collect();
    Panel {
        name: PanelName::Options,
        rows,
        addable: true,
    }
}

fn conditions_panel(form: &Form, record: &ComponentData, ctx: &PanelContext<'_>) -> Panel {
    let mut addresses = conditions::component_address_options(form);
    if let Some(external) = ctx.external {
        addresses.extend(conditions::external_address_options(external));
    }
    let address_select = |current: Option<&str>| PanelInput::Select {
        options: std::iter::once(SelectOption {
            label: String::new(),
            value: json!(""),
            selected: current.unwrap_or("").is_empty(),
        })
        .chain(addresses.iter().map(|a| SelectOption {
            label: a.label.clone(),
            value: json!(a.value),
            selected: current == Some(a.value.as_str()),
        }))
        .collect(),
        address: true,
    };
    let vocab_select = |choices: Vec<conditions::AddressOption>, current: Option<&str>| {
        PanelInput::Select {
            options: choices
                .into_iter()
                .map(|c| SelectOption {
                    selected: current == Some(c.value.as_str()),
                    label: c.label,
                    value: json!(c.value),
                })
                .collect(),
            address: false,
        }
    };
    let row = |key: &str, path: String, input: PanelInput| PanelRow {
        key: key.to_string(),
        path,
        input,
        disabled: false,
        locked: false,
    };

    let mut rows = Vec::new();
    for (ci, cond) in record.conditions.iter().flatten().enumerate() {
        let mut if_rows = Vec::new();
        for (i, clause) in cond.if_.iter().enumerate() {
            let base = format!("conditions.{}.if.{}", ci, i);
            let shown = conditions::if_clause_inputs(clause);
            let mut clause_rows = vec![
                row("source", format!("{}.source", base), address_select(clause.source.as_deref())),
                row(
                    "sourceProperty",
                    format!("{}.sourceProperty", base),
                    vocab_select(conditions::property_options(), clause.source_property.as_deref()),
                ),
            ];
            if shown.comparison {
                clause_rows.push(row(
                    "comparison",
                    format!("{}.comparison", base),
                    vocab_select(conditions::comparison_options(), clause.comparison.as_deref()),
                ));
            }
            if shown.target {
                let input = match &clause.target {
                    Some(Value::String(s)) if clause.target_address().is_some() => {
                        address_select(Some(s.as_str()))
                    }
                    other => PanelInput::Text {
                        value: other.as_ref().map(scalar_text).unwrap_or_default(),
                    },
                };
                clause_rows.push(row("target", format!("{}.target", base), input));
            }
            if shown.target_property {
                clause_rows.push(row(
                    "targetProperty",
                    format!("{}.targetProperty", base),
                    vocab_select(conditions::property_options(), clause.target_property.as_deref()),
                ));
            }
            if_rows.push(row(&i.to_string(), base, PanelInput::Group { rows: clause_rows }));
        }

        let mut then_rows = Vec::new();
        for (i, clause) in cond.then.iter().enumerate() {
            let base = format!("conditions.{}.then.{}", ci, i);
            let shown = conditions::then_clause_inputs(clause);
            let mut clause_rows = vec![row(
                "target",
                format!("{}.target", base),
                address_select(clause.target.as_deref()),
            )];
            if shown.target_property {
                clause_rows.push(row(
                    "targetProperty",
                    format!("{}.targetProperty", base),
                    vocab_select(conditions::property_options(), clause.target_property.as_deref()),
                ));
            }
            if shown.assignment {
                clause_rows.push(row(
                    "assignment",
                    format!("{}.assignment", base),
                    vocab_select(
                        vec![conditions::AddressOption {
                            label: "equals".into(),
                            value: "equals".into(),
                        }],
                        clause.assignment.as_deref(),
                    ),
                ));
            }
            if shown.value {
                clause_rows.push(row(
                    "value",
                    format!("{}.value", base),
                    PanelInput::Text {
                        value: clause.value.as_ref().map(scalar_text).unwrap_or_default(),
                    },
                ));
            }
            then_rows.push(row(&i.to_string(), base, PanelInput::Group { rows: clause_rows }));
        }

        rows.push(row(
            &ci.to_string(),
            format!("conditions.{}", ci),
            PanelInput::Group {
                rows: vec![
                    row("if", format!("conditions.{}.if", ci), PanelInput::Group { rows: if_rows }),
                    row("then", format!("conditions.{}.then", ci), PanelInput::Group { rows: then_rows }),
                ],
            },
        ));
    }
    Panel {
        name: PanelName::Conditions,
        rows,
        addable: true,
    }
}

fn config_panel(kind: ComponentKind, record: &ComponentData) -> Panel {
    let policy = PanelPolicy::for_panel(record, PanelName::Config);
    let keys: Vec<String> = match kind {
        ComponentKind::Field => vec!["label".to_string()],
        _ => record
            .config
            .iter()
            .flatten()
            .map(|(k, _)| k.clone())
            .filter(|k| k != "panels")
            .collect(),
    };
    let rows = keys
        .iter()
        .filter_map(|k| {
            let v = record.config_value(k).cloned().unwrap_or_else(|| json!(""));
            value_row(record, k, &format!("config.{}", k), &v, &policy)
        })
        .collect();
    Panel {
        name: PanelName::Config,
        rows,
        addable: false,
    }
}

fn scalar_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Whether a boolean at `key` behaves as a radio among sibling options.
fn is_radio(record: &ComponentData, path: &str, key: &str) -> bool {
    if !path.starts_with("options.") {
        return false;
    }
    match key {
        "selected" => record.attr("multiple").and_then(Value::as_bool) != Some(true),
        "checked" => record.field_type() == "radio",
        _ => false,
    }
}

/// One row for a leaf (or a group for an object), dispatched on value kind.
///
/// Returns `None` when the key is disabled and the panel hides disabled rows.
fn value_row(
    record: &ComponentData,
    key: &str,
    path: &str,
    value: &Value,
    policy: &PanelPolicy,
) -> Option<PanelRow> {
    let disabled = policy.is_disabled(key);
    if disabled && policy.hide_disabled {
        return None;
    }
    let input = match ValueKind::of(value) {
        ValueKind::String | ValueKind::Null => PanelInput::Text {
            value: scalar_text(value),
        },
        ValueKind::Boolean => {
            let checked = value.as_bool().unwrap_or(false);
            if is_radio(record, path, key) {
                PanelInput::Radio {
                    checked,
                    name: format!("{}-{}", record.id, key),
                }
            } else {
                PanelInput::Checkbox { checked }
            }
        }
        ValueKind::Number => PanelInput::Number {
            value: value.clone(),
        },
        ValueKind::Array => PanelInput::Select {
            options: array_select_options(value),
            address: false,
        },
        ValueKind::Object => PanelInput::Group {
            rows: value
                .as_object()
                .into_iter()
                .flatten()
                .filter_map(|(k, v)| value_row(record, k, &format!("{}.{}", path, k), v, policy))
                .collect(),
        },
    };
    Some(PanelRow {
        key: key.to_string(),
        path: path.to_string(),
        input,
        disabled,
        locked: policy.is_locked(key),
    })
}

fn array_select_options(value: &Value) -> Vec<SelectOption> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .map(|item| match item {
            Value::Object(map) => {
                let v = map.get("value").cloned().unwrap_or(Value::Null);
                SelectOption {
                    label: map
                        .get("label")
                        .map(scalar_text)
                        .unwrap_or_else(|| scalar_text(&v)),
                    value: v,
                    selected: map.get("selected").and_then(Value::as_bool).unwrap_or(false),
                }
            }
            other => SelectOption {
                label: scalar_text(other),
                value: other.clone(),
                selected: false,
            },
        })
        .collect()
}

// ─── Edits ───────────────────────────────────────────────────────────

/// A value coming back from a panel input.
#[derive(Debug, Clone, PartialEq)]
pub enum EditInput {
    Text(String),
    Bool(bool),
    /// Raw number input text.
    Number(String),
    Select(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum EditOutcome {
    Applied { path: String, value: Option<Value> },
    Rejected(Notice),
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, EditOutcome::Applied { .. })
    }
}

fn reject(form: &mut Form, message: String) -> EditOutcome {
    tracing::info!(%message, "edit rejected");
    form.emit(FormEvent::Notice {
        message: message.clone(),
    });
    EditOutcome::Rejected(Notice { message })
}

fn record_of<'a>(form: &'a Form, id: &str) -> FormResult<&'a ComponentData> {
    form.get(id).ok_or_else(|| FormError::ComponentNotFound {
        kind: "component".to_string(),
        id: id.to_string(),
    })
}

/// Panel and named keys of `path`, for policy checks.
fn policy_keys(path: &str) -> FormResult<(Option<PanelName>, Vec<String>)> {
    let segments = utils::parse_path(path)?;
    let panel = match segments.first() {
        Some(Segment::Key(k)) => PanelName::parse(k),
        _ => None,
    };
    let keys = segments
        .iter()
        .skip(1)
        .filter_map(|s| match s {
            Segment::Key(k) => Some(k.clone()),
            Segment::Index(_) => None,
        })
        .collect();
    Ok((panel, keys))
}

/// Refusal message when `path` touches a disabled or locked entry.
fn blocked(record: &ComponentData, path: &str) -> FormResult<Option<String>> {
    let (Some(panel), keys) = policy_keys(path)? else {
        return Ok(None);
    };
    let policy = PanelPolicy::for_panel(record, panel);
    for key in keys {
        if policy.is_disabled(&key) {
            return Ok(Some(format!("'{}' is disabled for this field", key)));
        }
        if policy.is_locked(&key) {
            return Ok(Some(format!("'{}' is locked for this field", key)));
        }
    }
    Ok(None)
}

fn mismatch(path: &str, expected: &str) -> FormError {
    FormError::InvalidValue {
        path: path.to_string(),
        reason: format!("expected {} input", expected),
    }
}

/// Write a panel input back into component `id` at `path`.
///
/// Disabled or locked entries are refused with a notice, as is number
/// input that does not parse. Address changes keep `map` in step.
pub fn apply_edit(
    form: &mut Form,
    map: &mut ConditionMap,
    id: &str,
    path: &str,
    input: EditInput,
) -> FormResult<EditOutcome> {
    let record = record_of(form, id)?;
    let refusal = blocked(record, path)?;
    let segments = utils::parse_path(path)?;
    let key = match segments.last() {
        Some(Segment::Key(k)) => k.clone(),
        _ => String::new(),
    };
    let radio = is_radio(record, path, &key);
    let current = record.get(path);
    if let Some(message) = refusal {
        return Ok(reject(form, message));
    }
    let current = current.ok_or_else(|| FormError::InvalidPath {
        path: path.to_string(),
        reason: "no value at this path".to_string(),
    })?;

    let value = match (ValueKind::of(&current), input) {
        (ValueKind::String | ValueKind::Null, EditInput::Text(s) | EditInput::Select(Value::String(s))) => {
            if let Some(outcome) = apply_address_edit(form, map, id, &segments, &s)? {
                return Ok(outcome);
            }
            json!(s)
        }
        (ValueKind::Boolean, EditInput::Bool(b)) => {
            if radio && b {
                clear_sibling_flags(form, id, &segments, &key)?;
            }
            json!(b)
        }
        (ValueKind::Number, EditInput::Number(s) | EditInput::Text(s)) => {
            match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => number_value(n),
                _ => return Ok(reject(form, format!("'{}' is not a number", s))),
            }
        }
        (ValueKind::Array, EditInput::Select(choice)) => {
            return apply_array_select(form, id, path, &current, choice);
        }
        (ValueKind::Object, _) => {
            return Err(FormError::InvalidPath {
                path: path.to_string(),
                reason: "objects are edited key by key".to_string(),
            })
        }
        (ValueKind::Boolean, _) => return Err(mismatch(path, "boolean")),
        (ValueKind::Number, _) => return Err(mismatch(path, "number")),
        (ValueKind::Array, _) => return Err(mismatch(path, "select")),
        (ValueKind::String | ValueKind::Null, _) => return Err(mismatch(path, "text")),
    };
    form.set(id, path, value.clone())?;
    Ok(EditOutcome::Applied {
        path: path.to_string(),
        value: Some(value),
    })
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

/// Route `conditions.N.if.M.source` and `conditions.N.then.M.target`
/// through the condition helpers so the reverse map follows.
fn apply_address_edit(
    form: &mut Form,
    map: &mut ConditionMap,
    id: &str,
    segments: &[Segment],
    value: &str,
) -> FormResult<Option<EditOutcome>> {
    let [Segment::Key(root), Segment::Index(ci), Segment::Key(part), Segment::Index(i), Segment::Key(key)] =
        segments
    else {
        return Ok(None);
    };
    if root != "conditions" {
        return Ok(None);
    }
    match (part.as_str(), key.as_str()) {
        ("if", "source") => conditions::set_if_source(form, map, id, *ci, *i, value)?,
        ("then", "target") => conditions::set_then_target(form, map, id, *ci, *i, value)?,
        _ => return Ok(None),
    }
    Ok(Some(EditOutcome::Applied {
        path: segments.iter().map(|s| s.to_string()).collect::<Vec<_>>().join("."),
        value: Some(json!(value)),
    }))
}

/// Clear `key` on every other entry of the array holding `segments`.
fn clear_sibling_flags(form: &mut Form, id: &str, segments: &[Segment], key: &str) -> FormResult<()> {
    let [parent @ .., Segment::Index(own), _] = segments else {
        return Ok(());
    };
    let parent_path = parent.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(".");
    let len = form
        .get_value(id, &parent_path)
        .and_then(|v| v.as_array().map(Vec::len))
        .unwrap_or(0);
    for j in (0..len).filter(|j| j != own) {
        let path = format!("{}.{}.{}", parent_path, j, key);
        if form.get_value(id, &path) == Some(json!(true)) {
            form.set(id, &path, json!(false))?;
        }
    }
    Ok(())
}

/// Arrays of scalars: write the chosen scalar. Arrays of `{value, selected}`
/// entries: move the `selected` flag to the chosen entry.
fn apply_array_select(
    form: &mut Form,
    id: &str,
    path: &str,
    current: &Value,
    choice: Value,
) -> FormResult<EditOutcome> {
    let items = current.as_array().cloned().unwrap_or_default();
    let flagged = items.iter().any(|i| i.get("value").is_some());
    if flagged {
        let Some(pos) = items
            .iter()
            .position(|i| i.get("value").is_some_and(|v| conditions::values_equal(v, &choice)))
        else {
            return Err(FormError::InvalidValue {
                path: path.to_string(),
                reason: format!("{} is not one of the choices", choice),
            });
        };
        let updated: Vec<Value> = items
            .into_iter()
            .enumerate()
            .map(|(i, mut item)| {
                if let Some(obj) = item.as_object_mut() {
                    obj.insert("selected".to_string(), json!(i == pos));
                }
                item
            })
            .collect();
        form.set(id, path, Value::Array(updated.clone()))?;
        return Ok(EditOutcome::Applied {
            path: path.to_string(),
            value: Some(Value::Array(updated)),
        });
    }
    if !items.iter().any(|i| conditions::values_equal(i, &choice)) {
        return Err(FormError::InvalidValue {
            path: path.to_string(),
            reason: format!("{} is not one of the choices", choice),
        });
    }
    form.set(id, path, choice.clone())?;
    Ok(EditOutcome::Applied {
        path: path.to_string(),
        value: Some(choice),
    })
}

// ─── Add / remove ────────────────────────────────────────────────────

/// "+Attribute": add `key` to the field's attrs.
pub fn add_attribute(
    form: &mut Form,
    actions: &mut dyn Actions,
    id: &str,
    key: &str,
    value: Value,
) -> FormResult<EditOutcome> {
    let record = record_of(form, id)?;
    let policy = PanelPolicy::for_panel(record, PanelName::Attrs);
    let exists = record.attr(key).is_some();
    if !attribute_name_regex().is_match(key) {
        return Ok(reject(form, format!("'{}' is not a valid attribute name", key)));
    }
    if policy.is_disabled(key) || policy.is_locked(key) {
        return Ok(reject(form, format!("Attribute '{}' is not allowed on this field", key)));
    }
    if exists {
        return Ok(reject(form, format!("Attribute '{}' already exists", key)));
    }
    let request = AttributeRequest {
        field_id: id.to_string(),
        key: key.to_string(),
        value: value.clone(),
    };
    if !actions.add_attribute(&request) {
        return Ok(reject(form, format!("Adding attribute '{}' was cancelled", key)));
    }
    let path = format!("attrs.{}", key);
    form.set(id, &path, value.clone())?;
    Ok(EditOutcome::Applied {
        path,
        value: Some(value),
    })
}

/// "+Option": append `{label: "Option N", value: "option-N", selected|checked: false}`.
pub fn add_option(form: &mut Form, actions: &mut dyn Actions, id: &str) -> FormResult<EditOutcome> {
    let record = record_of(form, id)?;
    let n = record.options.as_ref().map(Vec::len).unwrap_or(0);
    let flag = if record.uses_checked_options() {
        "checked"
    } else {
        "selected"
    };
    let label = format!("Option {}", n + 1);
    let option = json!({ "label": label, "value": utils::slugify(&label), flag: false });
    let request = OptionRequest {
        field_id: id.to_string(),
        option: option.clone(),
    };
    if !actions.add_option(&request) {
        return Ok(reject(form, "Adding an option was cancelled".to_string()));
    }
    let path = append(form, id, "options", n, option.clone())?;
    Ok(EditOutcome::Applied {
        path,
        value: Some(option),
    })
}

/// "+Condition": append one blank if/then pair.
pub fn add_condition(form: &mut Form, id: &str) -> FormResult<EditOutcome> {
    let record = record_of(form, id)?;
    let n = record.conditions.as_ref().map(Vec::len).unwrap_or(0);
    let value = serde_json::to_value(Condition::blank())?;
    let path = append(form, id, "conditions", n, value.clone())?;
    Ok(EditOutcome::Applied {
        path,
        value: Some(value),
    })
}

fn append(form: &mut Form, id: &str, key: &str, len: usize, value: Value) -> FormResult<String> {
    if len == 0 {
        form.set(id, key, json!([value]))?;
        return Ok(format!("{}.0", key));
    }
    let path = format!("{}.{}", key, len);
    form.set(id, &path, value)?;
    Ok(path)
}

/// Remove one attribute, option or condition. Locked entries are kept.
pub fn remove_entry(form: &mut Form, id: &str, path: &str) -> FormResult<EditOutcome> {
    let record = record_of(form, id)?;
    let (panel, keys) = policy_keys(path)?;
    if let Some(panel) = panel {
        let policy = PanelPolicy::for_panel(record, panel);
        let index_key = utils::parse_path(path)?
            .get(1)
            .map(|s| s.to_string())
            .unwrap_or_default();
        if keys.iter().any(|k| policy.is_locked(k)) || policy.is_locked(&index_key) {
            return Ok(reject(form, format!("'{}' is locked for this field", path)));
        }
    }
    let removed = form.remove_path(id, path)?;
    Ok(EditOutcome::Applied {
        path: path.to_string(),
        value: removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::ControlRegistry;
    use crate::events::DefaultActions;
    use pretty_assertions::assert_eq;

    fn form_with(control: &str) -> (Form, String) {
        let mut form = Form::new();
        let stage = form.stage_id().to_string();
        let row = form.add(ComponentKind::Row, Some(&stage), None, None).unwrap();
        let col = form.add(ComponentKind::Column, Some(&row), None, None).unwrap();
        let registry = ControlRegistry::default();
        let field = form
            .add_field_from_template(control, &registry, &col, None)
            .unwrap();
        (form, field)
    }

    #[test]
    fn test_value_kind_dispatch() {
        let (form, field) = form_with("select");
        let panels = build_panels(&form, &field, &PanelContext::default()).unwrap();
        let attrs = panels.panel(PanelName::Attrs).unwrap();
        let required = attrs.rows.iter().find(|r| r.key == "required").unwrap();
        assert_eq!(required.input, PanelInput::Checkbox { checked: false });
        let class = attrs.rows.iter().find(|r| r.key == "className").unwrap();
        assert_eq!(class.input, PanelInput::Text { value: String::new() });

        let options = panels.panel(PanelName::Options).unwrap();
        assert_eq!(options.rows.len(), 3);
        let PanelInput::Group { rows } = &options.rows[0].input else {
            panic!("expected group");
        };
        let selected = rows.iter().find(|r| r.key == "selected").unwrap();
        assert!(matches!(selected.input, PanelInput::Radio { checked: false, .. }));
    }

    #[test]
    fn test_disabled_attribute_edit_is_rejected() {
        let (mut form, field) = form_with("text-input");
        form.set(&field, "config.panels", json!({"attrs": {"disabled": ["type"]}}))
            .unwrap();
        let before = form.get_value(&field, "attrs");
        let mut map = ConditionMap::default();
        let outcome = apply_edit(
            &mut form,
            &mut map,
            &field,
            "attrs.type",
            EditInput::Text("email".into()),
        )
        .unwrap();
        assert!(matches!(outcome, EditOutcome::Rejected(_)));
        assert_eq!(form.get_value(&field, "attrs"), before);
    }

    #[test]
    fn test_hide_disabled_omits_row() {
        let (mut form, field) = form_with("text-input");
        form.set(
            &field,
            "config.panels",
            json!({"attrs": {"disabled": ["type"], "hideDisabled": true}}),
        )
        .unwrap();
        let panels = build_panels(&form, &field, &PanelContext::default()).unwrap();
        let attrs = panels.panel(PanelName::Attrs).unwrap();
        assert!(attrs.rows.iter().all(|r| r.key != "type"));
    }

    #[test]
    fn test_radio_edit_clears_siblings() {
        let (mut form, field) = form_with("select");
        let mut map = ConditionMap::default();
        apply_edit(&mut form, &mut map, &field, "options.0.selected", EditInput::Bool(true)).unwrap();
        apply_edit(&mut form, &mut map, &field, "options.2.selected", EditInput::Bool(true)).unwrap();
        let flags: Vec<_> = (0..3)
            .map(|i| form.get_value(&field, &format!("options.{}.selected", i)))
            .collect();
        assert_eq!(flags, vec![Some(json!(false)), Some(json!(false)), Some(json!(true))]);
    }

    #[test]
    fn test_number_edit() {
        let (mut form, field) = form_with("text-input");
        form.set(&field, "attrs.maxlength", json!(10)).unwrap();
        let mut map = ConditionMap::default();
        apply_edit(&mut form, &mut map, &field, "attrs.maxlength", EditInput::Number("25".into()))
            .unwrap();
        assert_eq!(form.get_value(&field, "attrs.maxlength"), Some(json!(25)));
        let outcome = apply_edit(
            &mut form,
            &mut map,
            &field,
            "attrs.maxlength",
            EditInput::Number("lots".into()),
        )
        .unwrap();
        assert!(!outcome.is_applied());
    }

    #[test]
    fn test_flagged_array_select_moves_selection() {
        let (mut form, field) = form_with("button");
        let mut map = ConditionMap::default();
        apply_edit(&mut form, &mut map, &field, "attrs.type", EditInput::Select(json!("submit")))
            .unwrap();
        let flags: Vec<_> = form
            .get_value(&field, "attrs.type")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["selected"].clone())
            .collect();
        assert_eq!(flags, vec![json!(false), json!(true), json!(false)]);
    }

    #[test]
    fn test_add_attribute_validates_name() {
        let (mut form, field) = form_with("text-input");
        let mut actions = DefaultActions;
        let bad = add_attribute(&mut form, &mut actions, &field, "1bad", json!("x")).unwrap();
        assert!(!bad.is_applied());
        let ok = add_attribute(&mut form, &mut actions, &field, "data-test", json!("x")).unwrap();
        assert!(ok.is_applied());
        assert_eq!(form.get_value(&field, "attrs.data-test"), Some(json!("x")));
    }

    #[test]
    fn test_add_attribute_hook_can_veto() {
        struct Deny;
        impl Actions for Deny {
            fn add_attribute(&mut self, _request: &AttributeRequest) -> bool {
                false
            }
        }
        let (mut form, field) = form_with("text-input");
        let outcome = add_attribute(&mut form, &mut Deny, &field, "title", json!("x")).unwrap();
        assert!(!outcome.is_applied());
        assert_eq!(form.get_value(&field, "attrs.title"), None);
    }

    #[test]
    fn test_add_option_uses_checked_for_checkbox() {
        let (mut form, field) = form_with("checkbox");
        add_option(&mut form, &mut DefaultActions, &field).unwrap();
        assert_eq!(
            form.get_value(&field, "options.3"),
            Some(json!({"label": "Option 4", "value": "option-4", "checked": false}))
        );
    }

    #[test]
    fn test_add_and_remove_condition() {
        let (mut form, field) = form_with("text-input");
        let outcome = add_condition(&mut form, &field).unwrap();
        assert_eq!(
            outcome,
            EditOutcome::Applied {
                path: "conditions.0".into(),
                value: Some(serde_json::to_value(Condition::blank()).unwrap()),
            }
        );
        remove_entry(&mut form, &field, "conditions.0").unwrap();
        assert_eq!(form.get_value(&field, "conditions"), Some(json!([])));
    }

    #[test]
    fn test_condition_source_edit_updates_map() {
        let (mut form, a) = form_with("checkbox");
        let col = form.parent(&a).unwrap().to_string();
        let b = form.add(ComponentKind::Field, Some(&col), None, None).unwrap();
        add_condition(&mut form, &b).unwrap();
        let mut map = ConditionMap::build(&form);
        let source = format!("field.{}", a);
        apply_edit(
            &mut form,
            &mut map,
            &b,
            "conditions.0.if.0.source",
            EditInput::Select(json!(source)),
        )
        .unwrap();
        assert_eq!(map.references(&a).len(), 1);
        let panels = build_panels(&form, &b, &PanelContext::default()).unwrap();
        assert_eq!(panels.panel(PanelName::Conditions).unwrap().rows.len(), 1);
    }
}
