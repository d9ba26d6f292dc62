use crate::columns;
use crate::conditions::Address;
use crate::document::FormData;
use crate::error::{FormError, FormResult};
use crate::kind::ComponentKind;
use std::collections::{HashMap, HashSet};

/// Structural checks run before a document is loaded.
///
/// Ids must be unique across stores, every child must exist in the store
/// of the expected kind, and no child may have two parents.
pub fn validate_form_data(data: &FormData) -> FormResult<()> {
    validate_id_uniqueness(data)?;

    let mut owners: HashMap<&str, &str> = HashMap::new();
    for kind in ComponentKind::ALL {
        for (key, record) in data.records(kind) {
            if !record.id.is_empty() && record.id != *key {
                return Err(FormError::ValidationError(format!(
                    "{} stored under '{}' carries id '{}'",
                    kind, key, record.id
                )));
            }

            let Some(child_kind) = kind.child_kind() else {
                if !record.children().is_empty() {
                    return Err(FormError::ValidationError(format!(
                        "field '{}' cannot have children",
                        key
                    )));
                }
                continue;
            };

            for child in record.children() {
                if !data.records(child_kind).contains_key(child) {
                    return Err(match data.find(child) {
                        Some((found, _)) => FormError::InvalidChild {
                            parent: kind.to_string(),
                            child: found.to_string(),
                        },
                        None => FormError::MissingChild {
                            kind: kind.to_string(),
                            parent: key.clone(),
                            child: child.clone(),
                        },
                    });
                }
                if let Some(first) = owners.insert(child.as_str(), key.as_str()) {
                    return Err(FormError::SharedChild {
                        id: child.clone(),
                        first: first.to_string(),
                        second: key.clone(),
                    });
                }
            }

            if kind == ComponentKind::Column {
                if let Some(width) = record.config_value("width") {
                    let text = width.as_str().ok_or_else(|| FormError::InvalidWidth {
                        value: width.to_string(),
                    })?;
                    columns::parse_width(text)?;
                }
            }
        }
    }
    Ok(())
}

fn validate_id_uniqueness(data: &FormData) -> FormResult<()> {
    let mut seen = HashSet::new();
    for kind in ComponentKind::ALL {
        for key in data.records(kind).keys() {
            if !seen.insert(key.as_str()) {
                return Err(FormError::DuplicateId { id: key.clone() });
            }
        }
    }
    Ok(())
}

/// Non-stage records that no parent lists as a child.
pub fn find_orphans(data: &FormData) -> Vec<(ComponentKind, String)> {
    let referenced: HashSet<&str> = ComponentKind::ALL
        .into_iter()
        .flat_map(|k| data.records(k).values())
        .flat_map(|r| r.children().iter().map(String::as_str))
        .collect();
    ComponentKind::ALL
        .into_iter()
        .filter(|k| *k != ComponentKind::Stage)
        .flat_map(|k| {
            data.records(k)
                .keys()
                .filter(|id| !referenced.contains(id.as_str()))
                .map(move |id| (k, id.clone()))
        })
        .collect()
}

/// Condition clauses whose addresses are malformed or point at nothing.
///
/// These rules are inert at render time, so they are reported, not rejected.
pub fn condition_warnings(data: &FormData) -> Vec<String> {
    let mut warnings = Vec::new();
    for (field_id, field) in &data.fields {
        for (ci, cond) in field.conditions.iter().flatten().enumerate() {
            let sources = cond.if_.iter().filter_map(|c| c.source.as_deref());
            let targets = cond.then.iter().filter_map(|c| c.target.as_deref());
            for addr in sources.chain(targets).filter(|a| !a.is_empty()) {
                match Address::parse(addr) {
                    None => warnings.push(format!(
                        "field '{}' condition {}: '{}' is not a component address",
                        field_id, ci, addr
                    )),
                    Some(Address::Component { kind, id, .. })
                        if !data.records(kind).contains_key(&id) =>
                    {
                        warnings.push(format!(
                            "field '{}' condition {}: {} '{}' does not exist",
                            field_id, ci, kind, id
                        ))
                    }
                    Some(_) => {}
                }
            }
        }
    }
    warnings
}
