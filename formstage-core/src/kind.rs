use crate::error::FormError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// The four structural component kinds, root first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    Stage,
    Row,
    Column,
    Field,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 4] = [
        ComponentKind::Stage,
        ComponentKind::Row,
        ComponentKind::Column,
        ComponentKind::Field,
    ];

    /// Singular name used in component addresses (`field.<id>`).
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Stage => "stage",
            ComponentKind::Row => "row",
            ComponentKind::Column => "column",
            ComponentKind::Field => "field",
        }
    }

    /// Key of this kind's store in the form-data document.
    pub fn store_key(self) -> &'static str {
        match self {
            ComponentKind::Stage => "stages",
            ComponentKind::Row => "rows",
            ComponentKind::Column => "columns",
            ComponentKind::Field => "fields",
        }
    }

    pub fn child_kind(self) -> Option<ComponentKind> {
        match self {
            ComponentKind::Stage => Some(ComponentKind::Row),
            ComponentKind::Row => Some(ComponentKind::Column),
            ComponentKind::Column => Some(ComponentKind::Field),
            ComponentKind::Field => None,
        }
    }

    pub fn parent_kind(self) -> Option<ComponentKind> {
        match self {
            ComponentKind::Stage => None,
            ComponentKind::Row => Some(ComponentKind::Stage),
            ComponentKind::Column => Some(ComponentKind::Row),
            ComponentKind::Field => Some(ComponentKind::Column),
        }
    }

    /// Tag of the editor node that hosts this component.
    pub fn dom_tag(self) -> &'static str {
        "div"
    }

    /// Class carried by the editor node.
    pub fn dom_class(self) -> &'static str {
        match self {
            ComponentKind::Stage => "formstage-stage",
            ComponentKind::Row => "formstage-row",
            ComponentKind::Column => "formstage-column",
            ComponentKind::Field => "formstage-field",
        }
    }

    /// Default record shape before any supplied data is merged over it.
    pub fn default_data(self) -> Value {
        match self {
            ComponentKind::Stage => json!({ "children": [] }),
            ComponentKind::Row => json!({
                "children": [],
                "config": { "fieldset": false, "legend": "", "inputGroup": false }
            }),
            ComponentKind::Column => json!({
                "children": [],
                "config": { "width": "100%" }
            }),
            ComponentKind::Field => json!({
                "tag": "input",
                "attrs": {},
                "meta": {},
                "config": { "label": "" }
            }),
        }
    }

    pub fn is_container(self) -> bool {
        self.child_kind().is_some()
    }

    /// Resolve a kind from either its singular or store name.
    pub fn from_any(name: &str) -> Option<ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .find(|k| k.name() == name || k.store_key() == name)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComponentKind {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentKind::from_any(s).ok_or_else(|| FormError::UnknownKind(s.to_string()))
    }
}
