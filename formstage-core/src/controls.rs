//! Control palette: templates that seed new fields or layout primitives.

use crate::config::ControlOptions;
use crate::error::{FormError, FormResult};
use crate::store::TemplateLookup;
use serde::Serialize;
use serde_json::{json, Value};

pub const LAYOUT_ROW: &str = "layout-row";
pub const LAYOUT_COLUMN: &str = "layout-column";

/// What dropping a control creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlRole {
    Field,
    Row,
    Column,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Control {
    pub id: String,
    pub group: String,
    pub label: String,
    pub icon: String,
    /// Field data seeded on drop.
    pub template: Value,
}

impl Control {
    /// Build a control from field-shaped data carrying `meta.id`.
    pub fn from_template(template: Value) -> FormResult<Self> {
        let meta = template.get("meta");
        let id = meta
            .and_then(|m| m.get("id"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FormError::ValidationError("control is missing meta.id".to_string()))?
            .to_string();
        let group = meta
            .and_then(|m| m.get("group"))
            .and_then(Value::as_str)
            .unwrap_or("common")
            .to_string();
        let icon = meta
            .and_then(|m| m.get("icon"))
            .and_then(Value::as_str)
            .unwrap_or(&id)
            .to_string();
        let label = template
            .pointer("/config/label")
            .and_then(Value::as_str)
            .unwrap_or(&id)
            .to_string();
        Ok(Control {
            id,
            group,
            label,
            icon,
            template,
        })
    }

    pub fn role(&self) -> ControlRole {
        match self.id.as_str() {
            LAYOUT_ROW => ControlRole::Row,
            LAYOUT_COLUMN => ControlRole::Column,
            _ => ControlRole::Field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlGroup {
    pub id: String,
    pub label: String,
    pub controls: Vec<String>,
}

fn group_label(id: &str) -> String {
    match id {
        "common" => "Form Fields".to_string(),
        "html" => "HTML Elements".to_string(),
        "layout" => "Layout".to_string(),
        other => other.to_string(),
    }
}

fn control(id: &str, group: &str, label: &str, mut data: Value) -> Value {
    data["meta"] = json!({ "group": group, "icon": id, "id": id });
    let config = data
        .as_object_mut()
        .map(|o| o.entry("config").or_insert_with(|| json!({})));
    if let Some(config) = config {
        config["label"] = json!(label);
    }
    data
}

fn choice_options(flag: &str) -> Value {
    Value::Array(
        (1..=3)
            .map(|n| json!({ "label": format!("Option {}", n), "value": format!("option-{}", n), flag: false }))
            .collect(),
    )
}

/// The built-in palette.
pub fn default_controls() -> Vec<Value> {
    vec![
        control("text-input", "common", "Text Input", json!({
            "tag": "input",
            "attrs": { "type": "text", "required": false, "className": "" }
        })),
        control("textarea", "common", "Textarea", json!({
            "tag": "textarea",
            "attrs": { "required": false, "className": "" }
        })),
        control("number", "common", "Number", json!({
            "tag": "input",
            "attrs": { "type": "number", "required": false, "className": "" }
        })),
        control("date-input", "common", "Date", json!({
            "tag": "input",
            "attrs": { "type": "date", "required": false, "className": "" }
        })),
        control("select", "common", "Select", json!({
            "tag": "select",
            "attrs": { "required": false, "multiple": false, "className": "" },
            "options": choice_options("selected")
        })),
        control("checkbox", "common", "Checkbox Group", json!({
            "tag": "input",
            "attrs": { "type": "checkbox", "required": false },
            "options": choice_options("checked")
        })),
        control("radio", "common", "Radio Group", json!({
            "tag": "input",
            "attrs": { "type": "radio", "required": false },
            "options": choice_options("checked")
        })),
        control("button", "common", "Button", json!({
            "tag": "button",
            "content": "Button",
            "attrs": {
                "type": [
                    { "label": "Button", "value": "button", "selected": true },
                    { "label": "Submit", "value": "submit", "selected": false },
                    { "label": "Reset", "value": "reset", "selected": false }
                ],
                "className": ""
            },
            "config": { "hideLabel": true }
        })),
        control("hidden", "common", "Hidden Input", json!({
            "tag": "input",
            "attrs": { "type": "hidden", "value": "" },
            "config": { "hideLabel": true }
        })),
        control("upload", "common", "File Upload", json!({
            "tag": "input",
            "attrs": { "type": "file", "required": false, "multiple": false }
        })),
        control("header", "html", "Header", json!({
            "tag": "h1",
            "content": "Header",
            "attrs": { "className": "" },
            "config": { "hideLabel": true, "editableContent": true }
        })),
        control("paragraph", "html", "Paragraph", json!({
            "tag": "p",
            "content": "Leverage agile frameworks to provide a robust synopsis for high level overviews.",
            "attrs": { "className": "" },
            "config": { "hideLabel": true, "editableContent": true }
        })),
        control("divider", "html", "Divider", json!({
            "tag": "hr",
            "attrs": { "className": "" },
            "config": { "hideLabel": true }
        })),
        control(LAYOUT_ROW, "layout", "Row", json!({})),
        control(LAYOUT_COLUMN, "layout", "Column", json!({})),
    ]
}

/// The registered controls, grouped and ordered for the palette.
#[derive(Debug, Clone)]
pub struct ControlRegistry {
    controls: Vec<Control>,
    groups: Vec<ControlGroup>,
    sortable: bool,
}

impl ControlRegistry {
    pub fn new(options: &ControlOptions) -> FormResult<Self> {
        let mut controls: Vec<Control> = Vec::new();
        for template in default_controls().into_iter().chain(options.elements.iter().cloned()) {
            let control = Control::from_template(template)?;
            // Custom elements replace built-ins with the same id.
            controls.retain(|c| c.id != control.id);
            controls.push(control);
        }
        controls.retain(|c| {
            !options.disable.elements.contains(&c.id) && !options.disable.groups.contains(&c.group)
        });

        let mut group_ids: Vec<String> = options
            .group_order
            .iter()
            .filter(|g| controls.iter().any(|c| &c.group == *g))
            .cloned()
            .collect();
        for c in &controls {
            if !group_ids.contains(&c.group) {
                group_ids.push(c.group.clone());
            }
        }

        let groups = group_ids
            .into_iter()
            .map(|gid| {
                let mut ids: Vec<String> = Vec::new();
                if let Some(order) = options.element_order.get(&gid) {
                    for id in order {
                        if controls.iter().any(|c| &c.id == id && c.group == gid) {
                            ids.push(id.clone());
                        }
                    }
                }
                for c in controls.iter().filter(|c| c.group == gid) {
                    if !ids.contains(&c.id) {
                        ids.push(c.id.clone());
                    }
                }
                ControlGroup {
                    label: group_label(&gid),
                    id: gid,
                    controls: ids,
                }
            })
            .collect();

        tracing::debug!(controls = controls.len(), "control registry built");
        Ok(ControlRegistry {
            controls,
            groups,
            sortable: options.sortable,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.id == id)
    }

    pub fn groups(&self) -> &[ControlGroup] {
        &self.groups
    }

    /// Group that lists `control_id`, used as the drag source container.
    pub fn group_of(&self, control_id: &str) -> Option<&ControlGroup> {
        self.groups.iter().find(|g| g.controls.iter().any(|c| c == control_id))
    }

    /// Whether the palette may be re-ordered by the user.
    pub fn sortable(&self) -> bool {
        self.sortable
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

impl Default for ControlRegistry {
    fn default() -> Self {
        ControlRegistry::new(&ControlOptions::default()).unwrap_or(ControlRegistry {
            controls: Vec::new(),
            groups: Vec::new(),
            sortable: true,
        })
    }
}

impl TemplateLookup for ControlRegistry {
    fn template(&self, control_id: &str) -> Option<Value> {
        let control = self.get(control_id)?;
        match control.role() {
            ControlRole::Field => Some(control.template.clone()),
            ControlRole::Row | ControlRole::Column => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisableOptions;
    use std::collections::BTreeMap;

    #[test]
    fn test_default_groups_in_order() {
        let registry = ControlRegistry::default();
        let ids: Vec<_> = registry.groups().iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["common", "html", "layout"]);
        assert_eq!(registry.get(LAYOUT_COLUMN).unwrap().role(), ControlRole::Column);
        assert_eq!(registry.group_of("select").unwrap().label, "Form Fields");
    }

    #[test]
    fn test_disable_lists() {
        let options = ControlOptions {
            disable: DisableOptions {
                groups: vec!["html".into()],
                elements: vec!["upload".into()],
            },
            ..Default::default()
        };
        let registry = ControlRegistry::new(&options).unwrap();
        assert!(registry.get("upload").is_none());
        assert!(registry.get("header").is_none());
        assert!(registry.groups().iter().all(|g| g.id != "html"));
    }

    #[test]
    fn test_element_order_and_custom_elements() {
        let mut element_order = BTreeMap::new();
        element_order.insert("common".to_string(), vec!["select".to_string()]);
        let options = ControlOptions {
            element_order,
            elements: vec![json!({
                "tag": "input",
                "attrs": {"type": "color"},
                "config": {"label": "Color"},
                "meta": {"id": "color", "group": "common"}
            })],
            ..Default::default()
        };
        let registry = ControlRegistry::new(&options).unwrap();
        let common = &registry.groups()[0];
        assert_eq!(common.controls[0], "select");
        assert_eq!(common.controls.last().unwrap(), "color");
        assert_eq!(registry.get("color").unwrap().label, "Color");
    }

    #[test]
    fn test_template_lookup_skips_layout() {
        let registry = ControlRegistry::default();
        let t = registry.template("checkbox").unwrap();
        assert_eq!(t["options"][0]["checked"], json!(false));
        assert!(registry.template(LAYOUT_ROW).is_none());
    }
}
