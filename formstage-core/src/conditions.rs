//! Conditional logic data model: if/then rules, component addresses,
//! comparison tables, and the editor-side authoring helpers.

use crate::error::{FormError, FormResult};
use crate::form::Form;
use crate::kind::ComponentKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// One if/then rule attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "if", default)]
    pub if_: Vec<IfClause>,
    #[serde(default)]
    pub then: Vec<ThenClause>,
    /// Keys this crate does not model, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Condition {
    /// Shape appended by the "+Condition" button.
    pub fn blank() -> Self {
        Condition {
            if_: vec![IfClause::blank()],
            then: vec![ThenClause::blank()],
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfClause {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<String>,
    /// Literal to compare with, or an address of another component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_property: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IfClause {
    pub fn blank() -> Self {
        IfClause {
            source: Some(String::new()),
            source_property: Some(String::new()),
            comparison: Some(String::new()),
            target: Some(Value::String(String::new())),
            target_property: Some(String::new()),
            extra: Map::new(),
        }
    }

    pub fn source_address(&self) -> Option<Address> {
        self.source.as_deref().and_then(Address::parse)
    }

    /// The target as an address, when it is one rather than a literal.
    pub fn target_address(&self) -> Option<Address> {
        self.target.as_ref().and_then(Value::as_str).and_then(Address::parse)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThenClause {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThenClause {
    pub fn blank() -> Self {
        ThenClause {
            target: Some(String::new()),
            target_property: Some(String::new()),
            assignment: Some(String::new()),
            value: Some(Value::String(String::new())),
            extra: Map::new(),
        }
    }

    pub fn target_address(&self) -> Option<Address> {
        self.target.as_deref().and_then(Address::parse)
    }
}

// ─── Addresses ───────────────────────────────────────────────────────

fn address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(stage|row|column|field|external)\.([^.]+)(?:\.(.+))?$").unwrap()
    })
}

/// A reference to a placed component (optionally a property path inside
/// it) or to a value in the external data map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Component {
        kind: ComponentKind,
        id: String,
        path: Option<String>,
    },
    External {
        path: String,
    },
}

impl Address {
    pub fn parse(s: &str) -> Option<Address> {
        let caps = address_regex().captures(s)?;
        let head = caps.get(1)?.as_str();
        let first = caps.get(2)?.as_str().to_string();
        let rest = caps.get(3).map(|m| m.as_str().to_string());
        if head == "external" {
            let path = match rest {
                Some(rest) => format!("{}.{}", first, rest),
                None => first,
            };
            return Some(Address::External { path });
        }
        Some(Address::Component {
            kind: ComponentKind::from_any(head)?,
            id: first,
            path: rest,
        })
    }

    pub fn is_address(s: &str) -> bool {
        address_regex().is_match(s)
    }

    pub fn component(kind: ComponentKind, id: &str) -> Address {
        Address::Component {
            kind,
            id: id.to_string(),
            path: None,
        }
    }

    /// Id of the addressed component, for component addresses.
    pub fn component_id(&self) -> Option<&str> {
        match self {
            Address::Component { id, .. } => Some(id),
            Address::External { .. } => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Component { kind, id, path } => match path {
                Some(p) => write!(f, "{}.{}.{}", kind, id, p),
                None => write!(f, "{}.{}", kind, id),
            },
            Address::External { path } => write!(f, "external.{}", path),
        }
    }
}

// ─── Operator vocabularies ───────────────────────────────────────────

/// Properties a condition can read from or write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Value,
    Checked,
    IsVisible,
    IsNotVisible,
}

impl Property {
    pub const ALL: [Property; 4] = [
        Property::Value,
        Property::Checked,
        Property::IsVisible,
        Property::IsNotVisible,
    ];

    pub fn parse(s: &str) -> Option<Property> {
        Property::ALL.into_iter().find(|p| p.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Property::Value => "value",
            Property::Checked => "checked",
            Property::IsVisible => "isVisible",
            Property::IsNotVisible => "isNotVisible",
        }
    }

    pub fn is_visibility(self) -> bool {
        matches!(self, Property::IsVisible | Property::IsNotVisible)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equals,
    NotEquals,
    Contains,
    NotContains,
}

impl Comparison {
    pub const ALL: [Comparison; 4] = [
        Comparison::Equals,
        Comparison::NotEquals,
        Comparison::Contains,
        Comparison::NotContains,
    ];

    /// Unknown keys yield `None`, which callers treat as a no-op.
    pub fn parse(s: &str) -> Option<Comparison> {
        Comparison::ALL.into_iter().find(|c| c.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Equals => "equals",
            Comparison::NotEquals => "notEquals",
            Comparison::Contains => "contains",
            Comparison::NotContains => "notContains",
        }
    }

    pub fn apply(self, source: &Value, target: &Value) -> bool {
        match self {
            Comparison::Equals => values_equal(source, target),
            Comparison::NotEquals => !values_equal(source, target),
            Comparison::Contains => value_contains(source, target),
            Comparison::NotContains => !value_contains(source, target),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Equals,
}

impl Assignment {
    pub fn parse(s: &str) -> Option<Assignment> {
        match s {
            "equals" => Some(Assignment::Equals),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        "equals"
    }
}

/// Deep equality; scalars of different JSON types compare by string form.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (scalar_string(a), scalar_string(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Substring test for strings, membership for arrays, key presence for maps.
pub fn value_contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => scalar_string(needle).is_some_and(|n| s.contains(n.as_str())),
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        Value::Object(map) => scalar_string(needle).is_some_and(|n| map.contains_key(&n)),
        _ => false,
    }
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

// ─── Authoring helpers ───────────────────────────────────────────────

/// A selectable entry in an address autocomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressOption {
    pub label: String,
    pub value: String,
}

/// Every placed field, in document order, as an address option.
///
/// Fields whose labels collide are told apart as `"<label> (<n>) <type>"`.
pub fn component_address_options(form: &Form) -> Vec<AddressOption> {
    let fields: Vec<(String, String, String)> = form
        .fields_in_order()
        .into_iter()
        .filter_map(|id| form.get(&id).map(|f| (id, f)))
        .map(|(id, f)| {
            let label = f
                .label()
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .or_else(|| f.meta_str("id").map(str::to_string))
                .unwrap_or_else(|| f.field_type());
            (id, label, f.field_type())
        })
        .collect();

    let mut totals: HashMap<&str, usize> = HashMap::new();
    for (_, label, _) in &fields {
        *totals.entry(label.as_str()).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    fields
        .iter()
        .map(|(id, label, field_type)| {
            let text = if totals[label.as_str()] > 1 {
                let n = seen.entry(label.as_str()).or_default();
                *n += 1;
                format!("{} ({}) {}", label, n, field_type)
            } else {
                label.clone()
            };
            AddressOption {
                label: text,
                value: Address::component(ComponentKind::Field, id).to_string(),
            }
        })
        .collect()
}

/// Leaves of the external data map as `external.<path>` options.
pub fn external_address_options(external: &Map<String, Value>) -> Vec<AddressOption> {
    fn walk(prefix: &str, value: &Value, out: &mut Vec<AddressOption>) {
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    let next = if prefix.is_empty() {
                        k.clone()
                    } else {
                        format!("{}.{}", prefix, k)
                    };
                    walk(&next, v, out);
                }
            }
            _ => out.push(AddressOption {
                label: prefix.to_string(),
                value: format!("external.{}", prefix),
            }),
        }
    }
    let mut out = Vec::new();
    for (k, v) in external {
        walk(k, v, &mut out);
    }
    out
}

/// Which inputs of an `if` clause row are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfClauseInputs {
    pub comparison: bool,
    pub target: bool,
    pub target_property: bool,
}

pub fn if_clause_inputs(clause: &IfClause) -> IfClauseInputs {
    let visibility_source = clause
        .source_property
        .as_deref()
        .and_then(Property::parse)
        .is_some_and(Property::is_visibility);
    let has_target_address = clause.target_address().is_some();
    IfClauseInputs {
        comparison: !visibility_source,
        target: !visibility_source,
        target_property: !visibility_source && has_target_address,
    }
}

/// Which inputs of a `then` clause row are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThenClauseInputs {
    pub target_property: bool,
    pub assignment: bool,
    pub value: bool,
}

pub fn then_clause_inputs(clause: &ThenClause) -> ThenClauseInputs {
    let has_target = clause.target_address().is_some();
    let assigns_value =
        clause.target_property.as_deref().and_then(Property::parse) == Some(Property::Value);
    ThenClauseInputs {
        target_property: has_target,
        assignment: has_target && assigns_value,
        value: has_target && assigns_value,
    }
}

/// Position of a clause inside a field's conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseRef {
    If(usize),
    Then(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionRef {
    pub field_id: String,
    pub condition: usize,
    pub clause: ClauseRef,
}

impl ConditionRef {
    fn path(&self, key: &str) -> String {
        match self.clause {
            ClauseRef::If(i) => format!("conditions.{}.if.{}.{}", self.condition, i, key),
            ClauseRef::Then(i) => format!("conditions.{}.then.{}.{}", self.condition, i, key),
        }
    }
}

/// Reverse lookup: component id -> clauses that reference it.
#[derive(Debug, Clone, Default)]
pub struct ConditionMap {
    refs: HashMap<String, Vec<ConditionRef>>,
}

impl ConditionMap {
    pub fn build(form: &Form) -> Self {
        let mut map = ConditionMap::default();
        for field_id in form.store(ComponentKind::Field).ids() {
            let Some(field) = form.get(&field_id) else { continue };
            for (ci, cond) in field.conditions.iter().flatten().enumerate() {
                for (i, clause) in cond.if_.iter().enumerate() {
                    let r = ConditionRef {
                        field_id: field_id.clone(),
                        condition: ci,
                        clause: ClauseRef::If(i),
                    };
                    for addr in [clause.source_address(), clause.target_address()]
                        .into_iter()
                        .flatten()
                    {
                        map.insert(&addr, r.clone());
                    }
                }
                for (i, clause) in cond.then.iter().enumerate() {
                    if let Some(addr) = clause.target_address() {
                        map.insert(
                            &addr,
                            ConditionRef {
                                field_id: field_id.clone(),
                                condition: ci,
                                clause: ClauseRef::Then(i),
                            },
                        );
                    }
                }
            }
        }
        map
    }

    fn insert(&mut self, addr: &Address, r: ConditionRef) {
        if let Some(id) = addr.component_id() {
            let entry = self.refs.entry(id.to_string()).or_default();
            if !entry.contains(&r) {
                entry.push(r);
            }
        }
    }

    pub fn references(&self, component_id: &str) -> &[ConditionRef] {
        self.refs.get(component_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn forget_ref(&mut self, r: &ConditionRef) {
        for list in self.refs.values_mut() {
            list.retain(|x| x != r);
        }
        self.refs.retain(|_, v| !v.is_empty());
    }
}

/// Point an `if` clause at a new source.
///
/// The property/comparison picked for the old source no longer applies, so
/// both are reset, and the reverse map moves the reference.
pub fn set_if_source(
    form: &mut Form,
    map: &mut ConditionMap,
    field_id: &str,
    condition: usize,
    clause: usize,
    source: &str,
) -> FormResult<()> {
    if !source.is_empty() && !Address::is_address(source) {
        return Err(FormError::InvalidAddress(source.to_string()));
    }
    let r = ConditionRef {
        field_id: field_id.to_string(),
        condition,
        clause: ClauseRef::If(clause),
    };
    let previous = form.get_value(field_id, &r.path("source"));
    if previous.as_ref().and_then(Value::as_str) == Some(source) {
        return Ok(());
    }
    form.set(field_id, &r.path("source"), json!(source))?;
    form.set(field_id, &r.path("sourceProperty"), json!(""))?;
    form.set(field_id, &r.path("comparison"), json!(""))?;

    map.forget_ref(&r);
    if let Some(addr) = Address::parse(source) {
        map.insert(&addr, r.clone());
    }
    // The clause may still reference a component through its target.
    if let Some(addr) = form
        .get_value(field_id, &r.path("target"))
        .and_then(|v| v.as_str().and_then(Address::parse))
    {
        map.insert(&addr, r);
    }
    Ok(())
}

/// Point a `then` clause at a new target.
pub fn set_then_target(
    form: &mut Form,
    map: &mut ConditionMap,
    field_id: &str,
    condition: usize,
    clause: usize,
    target: &str,
) -> FormResult<()> {
    if !target.is_empty() && !Address::is_address(target) {
        return Err(FormError::InvalidAddress(target.to_string()));
    }
    let r = ConditionRef {
        field_id: field_id.to_string(),
        condition,
        clause: ClauseRef::Then(clause),
    };
    form.set(field_id, &r.path("target"), json!(target))?;
    form.set(field_id, &r.path("targetProperty"), json!(""))?;
    map.forget_ref(&r);
    if let Some(addr) = Address::parse(target) {
        map.insert(&addr, r);
    }
    Ok(())
}

/// Blank every clause address that points at `removed_id`.
///
/// Returns how many clauses were cleaned.
pub fn clear_stale_references(
    form: &mut Form,
    map: &mut ConditionMap,
    removed_id: &str,
) -> FormResult<usize> {
    let refs = map.refs.remove(removed_id).unwrap_or_default();
    let mut cleaned = 0;
    for r in &refs {
        if !form.contains(&r.field_id) {
            continue;
        }
        let keys: &[&str] = match r.clause {
            ClauseRef::If(_) => &["source", "target"],
            ClauseRef::Then(_) => &["target"],
        };
        for key in keys {
            let path = r.path(key);
            let points_here = form
                .get_value(&r.field_id, &path)
                .and_then(|v| v.as_str().and_then(Address::parse))
                .is_some_and(|a| a.component_id() == Some(removed_id));
            if points_here {
                form.set(&r.field_id, &path, json!(""))?;
                cleaned += 1;
            }
        }
    }
    Ok(cleaned)
}

pub fn property_options() -> Vec<AddressOption> {
    Property::ALL
        .into_iter()
        .map(|p| AddressOption {
            label: p.as_str().to_string(),
            value: p.as_str().to_string(),
        })
        .collect()
}

pub fn comparison_options() -> Vec<AddressOption> {
    Comparison::ALL
        .into_iter()
        .map(|c| AddressOption {
            label: c.as_str().to_string(),
            value: c.as_str().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse() {
        assert_eq!(
            Address::parse("field.fA"),
            Some(Address::component(ComponentKind::Field, "fA"))
        );
        assert_eq!(
            Address::parse("field.fA.attrs.value"),
            Some(Address::Component {
                kind: ComponentKind::Field,
                id: "fA".into(),
                path: Some("attrs.value".into()),
            })
        );
        assert_eq!(
            Address::parse("external.user.name"),
            Some(Address::External {
                path: "user.name".into()
            })
        );
        assert_eq!(Address::parse("widget.x"), None);
        assert_eq!(Address::parse("field"), None);
        assert_eq!(
            Address::parse("field.fA.attrs.value").unwrap().to_string(),
            "field.fA.attrs.value"
        );
    }

    #[test]
    fn test_comparisons() {
        assert!(Comparison::Equals.apply(&json!(true), &json!(true)));
        assert!(Comparison::Equals.apply(&json!(true), &json!("true")));
        assert!(Comparison::Equals.apply(&json!(5), &json!("5")));
        assert!(Comparison::NotEquals.apply(&json!("a"), &json!("b")));
        assert!(Comparison::Contains.apply(&json!("hello world"), &json!("world")));
        assert!(Comparison::Contains.apply(&json!(["a", "b"]), &json!("b")));
        assert!(Comparison::NotContains.apply(&json!("abc"), &json!("z")));
        assert!(!Comparison::Equals.apply(&json!({"a": 1}), &json!({"a": 2})));
    }

    #[test]
    fn test_unknown_operators_are_none() {
        assert_eq!(Comparison::parse("greaterThan"), None);
        assert_eq!(Assignment::parse("plus"), None);
        assert_eq!(Property::parse("isVisible"), Some(Property::IsVisible));
    }

    #[test]
    fn test_condition_serde_uses_if_key() {
        let raw = json!({
            "if": [{"source": "field.fA", "sourceProperty": "checked", "comparison": "equals", "target": true}],
            "then": [{"target": "field.fB", "targetProperty": "isVisible", "assignment": "equals"}]
        });
        let cond: Condition = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(cond.if_[0].source.as_deref(), Some("field.fA"));
        assert_eq!(cond.if_[0].target, Some(json!(true)));
        assert_eq!(serde_json::to_value(&cond).unwrap(), raw);
    }

    #[test]
    fn test_clause_inputs() {
        let mut clause = IfClause::blank();
        clause.source_property = Some("isVisible".into());
        let inputs = if_clause_inputs(&clause);
        assert!(!inputs.comparison && !inputs.target);

        clause.source_property = Some("value".into());
        clause.target = Some(json!("field.other"));
        assert!(if_clause_inputs(&clause).target_property);

        let then = ThenClause {
            target: Some("field.fB".into()),
            target_property: Some("value".into()),
            ..ThenClause::blank()
        };
        assert!(then_clause_inputs(&then).value);
    }

    #[test]
    fn test_external_options_flatten_leaves() {
        let ext = json!({"user": {"name": "Ada", "age": 36}, "plan": "pro"});
        let opts = external_address_options(ext.as_object().unwrap());
        let values: Vec<_> = opts.iter().map(|o| o.value.as_str()).collect();
        assert!(values.contains(&"external.user.name"));
        assert!(values.contains(&"external.plan"));
        assert_eq!(opts.len(), 3);
    }
}
