use crate::component::ComponentData;
use crate::error::FormResult;
use crate::kind::ComponentKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type Records = BTreeMap<String, ComponentData>;

/// The persisted form-data document: one map of records per kind.
///
/// The `children` arrays inside the records are the only source of
/// render order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub stages: Records,
    #[serde(default)]
    pub rows: Records,
    #[serde(default)]
    pub columns: Records,
    #[serde(default)]
    pub fields: Records,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FormData {
    /// Parse a document from JSON. Malformed input fails with `ParseError`.
    pub fn from_json(json: &str) -> FormResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Accept either a JSON object or a JSON string that encodes one.
    pub fn from_value(value: Value) -> FormResult<Self> {
        match value {
            Value::String(s) => FormData::from_json(&s),
            other => Ok(serde_json::from_value(other)?),
        }
    }

    pub fn to_json(&self) -> FormResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn records(&self, kind: ComponentKind) -> &Records {
        match kind {
            ComponentKind::Stage => &self.stages,
            ComponentKind::Row => &self.rows,
            ComponentKind::Column => &self.columns,
            ComponentKind::Field => &self.fields,
        }
    }

    /// Look a record up in whichever store holds it.
    pub fn find(&self, id: &str) -> Option<(ComponentKind, &ComponentData)> {
        ComponentKind::ALL
            .into_iter()
            .find_map(|k| self.records(k).get(id).map(|r| (k, r)))
    }

    pub fn component_count(&self) -> usize {
        ComponentKind::ALL
            .into_iter()
            .map(|k| self.records(k).len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormError;
    use serde_json::json;

    #[test]
    fn test_from_json_reports_position() {
        let err = FormData::from_json("{\"id\": \"x\",\n \"stages\": [}").unwrap_err();
        match err {
            FormError::ParseError { line, .. } => assert_eq!(line, 2),
            other => panic!("expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_from_value_accepts_string() {
        let doc = json!({"id": "f1", "stages": {"s1": {"id": "s1", "children": []}}});
        let a = FormData::from_value(doc.clone()).unwrap();
        let b = FormData::from_value(Value::String(doc.to_string())).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.find("s1").map(|(k, _)| k), Some(ComponentKind::Stage));
    }
}
