//! Identifier generation, deep merging and path access on plain JSON data.

use crate::error::{FormError, FormResult};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Generate a fresh component identifier (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Deep-merge `source` into `target`.
///
/// Objects merge key by key; any other source value, arrays included,
/// replaces whatever the target held.
pub fn merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(t), Value::Object(s)) => {
            for (key, value) in s {
                match t.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        t.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (t, s) => *t = s.clone(),
    }
}

/// Return a merged copy without touching either input.
pub fn merged(base: &Value, over: &Value) -> Value {
    let mut out = base.clone();
    merge(&mut out, over);
    out
}

/// One step of a data path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => write!(f, "{}", k),
            Segment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Split `attrs.type`, `options[0].label` or `options.0.label` into segments.
///
/// All-digit segments become indices. Empty segments (from a trailing dot
/// such as the `fields.<id>.` data path) are dropped.
pub fn parse_path(path: &str) -> FormResult<Vec<Segment>> {
    let mut segments = Vec::new();
    for raw in path.split('.') {
        if raw.is_empty() {
            continue;
        }
        let (head, rest) = match raw.find('[') {
            Some(pos) => (&raw[..pos], &raw[pos..]),
            None => (raw, ""),
        };
        if !head.is_empty() {
            segments.push(to_segment(head));
        }
        let mut rest = rest;
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(|| FormError::InvalidPath {
                path: path.to_string(),
                reason: "unterminated '['".to_string(),
            })?;
            let inner = &rest[1..close];
            let index = inner.parse::<usize>().map_err(|_| FormError::InvalidPath {
                path: path.to_string(),
                reason: format!("'{}' is not an array index", inner),
            })?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(FormError::InvalidPath {
                    path: path.to_string(),
                    reason: "unexpected characters after ']'".to_string(),
                });
            }
        }
    }
    Ok(segments)
}

fn to_segment(raw: &str) -> Segment {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(i) = raw.parse() {
            return Segment::Index(i);
        }
    }
    Segment::Key(raw.to_string())
}

/// Resolve a path inside a value.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path).ok()?;
    get_segments(value, &segments)
}

pub fn get_segments<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = value;
    for seg in segments {
        current = match (seg, current) {
            (Segment::Key(k), Value::Object(map)) => map.get(k)?,
            (Segment::Index(i), Value::Array(arr)) => arr.get(*i)?,
            // Numeric keys on objects (e.g. a map keyed "0")
            (Segment::Index(i), Value::Object(map)) => map.get(&i.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `new_value` at `path`, creating intermediate objects as needed.
///
/// Returns the previous value at that location, if any.
pub fn set_path(value: &mut Value, path: &str, new_value: Value) -> FormResult<Option<Value>> {
    let segments = parse_path(path)?;
    if segments.is_empty() {
        return Err(FormError::InvalidPath {
            path: path.to_string(),
            reason: "empty path".to_string(),
        });
    }
    let (last, parents) = segments.split_last().ok_or_else(|| FormError::InvalidPath {
        path: path.to_string(),
        reason: "empty path".to_string(),
    })?;

    let mut current = value;
    for (pos, seg) in parents.iter().enumerate() {
        let next_is_index = matches!(segments[pos + 1], Segment::Index(_));
        current = step_mut(current, seg, next_is_index, path)?;
    }

    match (last, current) {
        (Segment::Key(k), Value::Object(map)) => Ok(map.insert(k.clone(), new_value)),
        (Segment::Index(i), Value::Array(arr)) => {
            if *i < arr.len() {
                Ok(Some(std::mem::replace(&mut arr[*i], new_value)))
            } else if *i == arr.len() {
                arr.push(new_value);
                Ok(None)
            } else {
                Err(FormError::InvalidPath {
                    path: path.to_string(),
                    reason: format!("index {} is past the end (len {})", i, arr.len()),
                })
            }
        }
        (Segment::Index(i), Value::Object(map)) => Ok(map.insert(i.to_string(), new_value)),
        (seg, _) => Err(FormError::InvalidPath {
            path: path.to_string(),
            reason: format!("cannot set '{}' on a non-container value", seg),
        }),
    }
}

fn step_mut<'a>(
    current: &'a mut Value,
    seg: &Segment,
    next_is_index: bool,
    path: &str,
) -> FormResult<&'a mut Value> {
    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    let fresh = || {
        if next_is_index {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        }
    };
    match (seg, current) {
        (Segment::Key(k), Value::Object(map)) => Ok(map.entry(k.clone()).or_insert_with(fresh)),
        (Segment::Index(i), Value::Object(map)) => {
            Ok(map.entry(i.to_string()).or_insert_with(fresh))
        }
        (Segment::Index(i), Value::Array(arr)) => {
            if *i == arr.len() {
                arr.push(fresh());
            }
            arr.get_mut(*i).ok_or_else(|| FormError::InvalidPath {
                path: path.to_string(),
                reason: format!("index {} is out of bounds", i),
            })
        }
        (seg, _) => Err(FormError::InvalidPath {
            path: path.to_string(),
            reason: format!("'{}' does not address a container", seg),
        }),
    }
}

/// Remove the value at `path`.
///
/// An index as final segment splices the array; a key deletes from the map.
pub fn remove_path(value: &mut Value, path: &str) -> FormResult<Option<Value>> {
    let segments = parse_path(path)?;
    let Some((last, parents)) = segments.split_last() else {
        return Err(FormError::InvalidPath {
            path: path.to_string(),
            reason: "empty path".to_string(),
        });
    };

    let mut current = value;
    for seg in parents {
        current = match (seg, current) {
            (Segment::Key(k), Value::Object(map)) => match map.get_mut(k) {
                Some(v) => v,
                None => return Ok(None),
            },
            (Segment::Index(i), Value::Array(arr)) => match arr.get_mut(*i) {
                Some(v) => v,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
    }

    Ok(match (last, current) {
        (Segment::Index(i), Value::Array(arr)) if *i < arr.len() => Some(arr.remove(*i)),
        (Segment::Key(k), Value::Object(map)) => map.remove(k),
        (Segment::Index(i), Value::Object(map)) => map.remove(&i.to_string()),
        _ => None,
    })
}

/// First path segment as a plain string, if it is a key.
pub fn root_key(path: &str) -> Option<String> {
    match parse_path(path).ok()?.into_iter().next()? {
        Segment::Key(k) => Some(k),
        Segment::Index(_) => None,
    }
}

/// Lowercase, dash-separated version of a label (`"Option 1"` -> `"option-1"`).
pub fn slugify(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut dash = false;
    for ch in label.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

// ─── Tests ───────────────────────────────────────────────────────────
