//! Editor and renderer options, loadable from JSON or YAML.

use crate::document::FormData;
use crate::error::FormResult;
use crate::kind::ComponentKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Per-kind config merged over the built-in defaults of new records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfigs {
    pub stage: Value,
    pub row: Value,
    pub column: Value,
    pub field: Value,
}

impl ComponentConfigs {
    pub fn for_kind(&self, kind: ComponentKind) -> Value {
        match kind {
            ComponentKind::Stage => self.stage.clone(),
            ComponentKind::Row => self.row.clone(),
            ComponentKind::Column => self.column.clone(),
            ComponentKind::Field => self.field.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisableOptions {
    pub groups: Vec<String>,
    pub elements: Vec<String>,
}

/// Control palette registration, ordering and disable lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlOptions {
    pub sortable: bool,
    pub group_order: Vec<String>,
    /// group id -> control ids listed first, in this order
    pub element_order: BTreeMap<String, Vec<String>>,
    pub disable: DisableOptions,
    /// Custom controls, in the same shape as field data plus `meta.id`.
    pub elements: Vec<Value>,
}

impl Default for ControlOptions {
    fn default() -> Self {
        ControlOptions {
            sortable: true,
            group_order: vec!["common".into(), "html".into(), "layout".into()],
            element_order: BTreeMap::new(),
            disable: DisableOptions::default(),
            elements: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct I18nOptions {
    pub location: Option<String>,
    pub locale: String,
}

impl Default for I18nOptions {
    fn default() -> Self {
        I18nOptions {
            location: None,
            locale: "en-US".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorOptions {
    pub editor_container: Option<String>,
    pub controls: ControlOptions,
    pub config: ComponentConfigs,
    /// Outside data that conditions may address as `external.<path>`.
    pub external: Map<String, Value>,
    pub session_storage: bool,
    pub i18n: I18nOptions,
    pub svg_sprite: Option<String>,
    pub style: Option<String>,
    /// Initial document, as an object or a JSON string.
    pub form_data: Option<Value>,
}

impl EditorOptions {
    pub fn from_json(json: &str) -> FormResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> FormResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// The initial document, parsed.
    pub fn form_data(&self) -> FormResult<Option<FormData>> {
        self.form_data.clone().map(FormData::from_value).transpose()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RendererOptions {
    pub render_container: Option<String>,
    pub external: Map<String, Value>,
}

impl RendererOptions {
    pub fn from_json(json: &str) -> FormResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> FormResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
