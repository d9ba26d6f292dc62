use crate::component::ComponentData;
use crate::error::{FormError, FormResult};
use crate::kind::ComponentKind;
use crate::utils;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Source of control templates for fields referenced before they exist.
///
/// The control registry implements this; the field store never reaches
/// for the registry on its own.
pub trait TemplateLookup {
    /// Field data seeded from the control registered under `control_id`.
    fn template(&self, control_id: &str) -> Option<Value>;
}

impl<F: Fn(&str) -> Option<Value>> TemplateLookup for F {
    fn template(&self, control_id: &str) -> Option<Value> {
        self(control_id)
    }
}

/// All records of one component kind, keyed by id.
#[derive(Debug, Clone)]
pub struct ComponentStore {
    kind: ComponentKind,
    records: BTreeMap<String, ComponentData>,
    /// Config merged over the kind's defaults for every new record.
    config_defaults: Value,
    active: Option<String>,
    /// Loaded records whose id came from their key only.
    keyed_only: BTreeSet<String>,
}

impl ComponentStore {
    pub fn new(kind: ComponentKind) -> Self {
        ComponentStore {
            kind,
            records: BTreeMap::new(),
            config_defaults: Value::Null,
            active: None,
            keyed_only: BTreeSet::new(),
        }
    }

    /// Store whose new records get `config` merged over the kind defaults.
    pub fn with_config_defaults(kind: ComponentKind, config: Value) -> Self {
        ComponentStore {
            config_defaults: config,
            ..ComponentStore::new(kind)
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Create or overwrite a record and mark it active.
    ///
    /// Supplied `data` is merged over the kind defaults; a missing id is
    /// generated.
    pub fn add(&mut self, id: Option<&str>, data: Option<&Value>) -> FormResult<String> {
        let id = id
            .map(str::to_string)
            .or_else(|| {
                data.and_then(|d| d.get("id"))
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(utils::generate_id);

        let mut seed = serde_json::json!({});
        if !self.config_defaults.is_null() {
            seed["config"] = self.config_defaults.clone();
        }
        if let Some(data) = data {
            utils::merge(&mut seed, data);
        }
        let record = ComponentData::with_defaults(self.kind, &id, Some(&seed))?;
        self.records.insert(id.clone(), record);
        self.keyed_only.remove(&id);
        self.active = Some(id.clone());
        tracing::debug!(kind = %self.kind, id = %id, "record added");
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&ComponentData> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ComponentData> {
        self.records.get_mut(id)
    }

    /// Resolve `"<id>.<path...>"` inside this store.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let (id, rest) = match path.split_once('.') {
            Some((id, rest)) => (id, rest),
            None => (path, ""),
        };
        let record = self.records.get(id)?;
        if rest.trim_matches('.').is_empty() {
            return record.to_value().ok();
        }
        record.get(rest)
    }

    /// Return `id` if it exists, else materialize a record from the control
    /// template registered under `id`.
    ///
    /// The materialized record gets a fresh id, which is returned.
    pub fn get_or_materialize(
        &mut self,
        id: &str,
        lookup: &dyn TemplateLookup,
    ) -> FormResult<String> {
        if self.records.contains_key(id) {
            return Ok(id.to_string());
        }
        let template = lookup
            .template(id)
            .ok_or_else(|| FormError::UnknownControl(id.to_string()))?;
        let mut template = template;
        if let Some(obj) = template.as_object_mut() {
            obj.remove("id");
        }
        self.add(None, Some(&template))
    }

    /// Drop a record from this store only. Structural cleanup lives in `Form`.
    pub fn remove(&mut self, id: &str) -> Option<ComponentData> {
        let removed = self.records.remove(id);
        self.keyed_only.remove(id);
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        removed
    }

    /// Replace the whole store with `records`, keyed by id.
    ///
    /// A record without an `id` takes its key; [`to_records`](Self::to_records)
    /// leaves it out again.
    pub fn load(&mut self, records: BTreeMap<String, ComponentData>) {
        self.records.clear();
        self.keyed_only.clear();
        self.active = None;
        for (key, mut record) in records {
            if record.id.is_empty() {
                record.id = key.clone();
                self.keyed_only.insert(key.clone());
            }
            self.records.insert(key, record);
        }
    }

    /// Parse a JSON object of records and load it.
    pub fn load_json(&mut self, json: &str) -> FormResult<()> {
        let records: BTreeMap<String, ComponentData> = serde_json::from_str(json)?;
        self.load(records);
        Ok(())
    }

    /// Empty the children of every record while keeping the records.
    pub fn clear_all(&mut self) {
        for record in self.records.values_mut() {
            if let Some(children) = record.children.as_mut() {
                children.clear();
            }
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.keyed_only.clear();
        self.active = None;
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ComponentData)> {
        self.records.iter()
    }

    /// Most recently added record.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn records(&self) -> &BTreeMap<String, ComponentData> {
        &self.records
    }

    /// Records as they serialize: ids that were only implied by their key
    /// on load stay implied.
    pub fn to_records(&self) -> BTreeMap<String, ComponentData> {
        let mut records = self.records.clone();
        for key in &self.keyed_only {
            if let Some(record) = records.get_mut(key) {
                record.id.clear();
            }
        }
        records
    }
}
