use crate::conditions::Condition;
use crate::error::{FormError, FormResult};
use crate::kind::ComponentKind;
use crate::utils;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Data record of one placed component (stage, row, column or field).
///
/// Optional sections stay `None` when absent so that a loaded document
/// serializes back key for key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
    /// Keys this crate does not model, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Root keys that `set` refuses to touch.
const READ_ONLY_KEYS: &[&str] = &["id", "meta"];

impl ComponentData {
    /// Build a record of `kind`: type defaults, then `data` merged over them.
    pub fn with_defaults(kind: ComponentKind, id: &str, data: Option<&Value>) -> FormResult<Self> {
        let mut value = kind.default_data();
        if let Some(data) = data {
            utils::merge(&mut value, data);
        }
        let mut record: ComponentData = serde_json::from_value(value)?;
        record.id = id.to_string();
        Ok(record)
    }

    pub fn children(&self) -> &[String] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn children_mut(&mut self) -> &mut Vec<String> {
        self.children.get_or_insert_with(Vec::new)
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.as_ref().and_then(|c| c.get(key))
    }

    pub fn set_config(&mut self, key: &str, value: Value) {
        self.config
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
    }

    pub fn label(&self) -> Option<&str> {
        self.config_value("label").and_then(Value::as_str)
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.as_ref().and_then(|a| a.get(key))
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.get(key)).and_then(Value::as_str)
    }

    /// Layout primitives are structural and carry no attrs/options.
    pub fn is_layout(&self) -> bool {
        self.meta_str("group") == Some("layout")
    }

    /// The `type` attribute when present, else the tag name.
    pub fn field_type(&self) -> String {
        self.attr("type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.tag.clone())
            .unwrap_or_else(|| "input".to_string())
    }

    /// Whether option entries use `checked` (checkbox/radio) instead of `selected`.
    pub fn uses_checked_options(&self) -> bool {
        matches!(self.field_type().as_str(), "checkbox" | "radio")
    }

    pub fn to_value(&self) -> FormResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Read a dotted path inside this record.
    pub fn get(&self, path: &str) -> Option<Value> {
        let value = self.to_value().ok()?;
        utils::get_path(&value, path).cloned()
    }

    /// Write a dotted path, returning the previous value.
    ///
    /// The record is re-validated against its typed shape, so writing a
    /// string where `children` expects a list fails without side effects.
    pub fn set(&mut self, path: &str, new_value: Value) -> FormResult<Option<Value>> {
        self.check_writable(path)?;
        let mut value = self.to_value()?;
        let previous = utils::set_path(&mut value, path, new_value)?;
        self.replace_from(value, path)?;
        Ok(previous)
    }

    /// Remove the entry at `path`: splice for indices, delete for keys.
    pub fn remove(&mut self, path: &str) -> FormResult<Option<Value>> {
        self.check_writable(path)?;
        let mut value = self.to_value()?;
        let removed = utils::remove_path(&mut value, path)?;
        if removed.is_some() {
            self.replace_from(value, path)?;
        }
        Ok(removed)
    }

    fn check_writable(&self, path: &str) -> FormResult<()> {
        match utils::root_key(path) {
            Some(key) if READ_ONLY_KEYS.contains(&key.as_str()) => Err(FormError::ReadOnlyPath {
                path: path.to_string(),
            }),
            Some(_) => Ok(()),
            None => Err(FormError::InvalidPath {
                path: path.to_string(),
                reason: "path must start with a key".to_string(),
            }),
        }
    }

    fn replace_from(&mut self, value: Value, path: &str) -> FormResult<()> {
        let updated: ComponentData =
            serde_json::from_value(value).map_err(|e| FormError::InvalidValue {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        *self = updated;
        Ok(())
    }
}
