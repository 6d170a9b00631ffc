//! Field-level comparison of resolved desired values with a remote object.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{RemoteObject, ResolvedSpec, ResolvedValue};

/// Before/after of one changed field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub before: Value,
    pub after: Value,
}

/// Changed fields keyed by API attribute name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    pub changes: BTreeMap<String, Change>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    /// `{before: {...}, after: {...}}`
    pub fn to_value(&self) -> Value {
        let mut before = Map::new();
        let mut after = Map::new();
        for (field, change) in &self.changes {
            before.insert(field.clone(), change.before.clone());
            after.insert(field.clone(), change.after.clone());
        }
        serde_json::json!({ "before": before, "after": after })
    }
}

/// Compare every desired field with the existing object.
///
/// Fields not in `desired` are never part of the diff.
pub fn diff(desired: &ResolvedSpec, existing: &RemoteObject) -> Diff {
    let mut changes = BTreeMap::new();

    for (field, value) in &desired.fields {
        match value {
            ResolvedValue::CustomFields(supplied) => {
                let current = existing.custom_fields();
                let mut before = Map::new();
                let mut after = Map::new();
                for (key, want) in supplied {
                    let have = current.get(key).unwrap_or(&Value::Null);
                    if !json_eq(have, want) {
                        before.insert(key.clone(), have.clone());
                        after.insert(key.clone(), want.clone());
                    }
                }
                if !after.is_empty() {
                    changes.insert(
                        field.clone(),
                        Change {
                            before: Value::Object(before),
                            after: Value::Object(after),
                        },
                    );
                }
            }
            _ => {
                let remote = existing.get(field);
                if differs(value, remote) {
                    changes.insert(
                        field.clone(),
                        Change {
                            before: remote.cloned().unwrap_or(Value::Null),
                            after: value.to_json(),
                        },
                    );
                }
            }
        }
    }

    Diff { changes }
}

/// Update payload carrying only changed fields.
///
/// Custom fields are sent as the existing map with the changed keys
/// overwritten, so keys the caller did not mention survive whether the
/// server merges or replaces.
pub fn update_payload(diff: &Diff, existing: &RemoteObject) -> Map<String, Value> {
    let mut payload = Map::new();
    for (field, change) in &diff.changes {
        if field == "custom_fields" {
            let mut merged = existing.custom_fields();
            if let Value::Object(after) = &change.after {
                for (k, v) in after {
                    merged.insert(k.clone(), v.clone());
                }
            }
            payload.insert(field.clone(), Value::Object(merged));
        } else {
            payload.insert(field.clone(), change.after.clone());
        }
    }
    payload
}

/// Whether a remote attribute does not match the desired value.
pub fn differs(desired: &ResolvedValue, remote: Option<&Value>) -> bool {
    match desired {
        ResolvedValue::Planned { .. } => true,
        ResolvedValue::Id(id) => remote.and_then(remote_id) != Some(*id),
        ResolvedValue::Scalar(want) => match remote {
            None => true,
            Some(have) if want.is_object() => !json_eq(have, want),
            Some(have) => !json_eq(remote_scalar(have), want),
        },
        ResolvedValue::Sequence(items) => match remote {
            Some(Value::Array(have)) => {
                have.len() != items.len()
                    || items
                        .iter()
                        .zip(have.iter())
                        .any(|(want, have)| differs(want, Some(have)))
            }
            None => !items.is_empty(),
            _ => true,
        },
        ResolvedValue::Set(items) => {
            let have: Vec<&Value> = match remote {
                Some(Value::Array(have)) => have.iter().collect(),
                None => Vec::new(),
                _ => return true,
            };
            let mut want_keys: Vec<String> = items.iter().map(desired_key).collect();
            let mut have_keys: Vec<String> = have.into_iter().map(remote_key).collect();
            want_keys.sort();
            want_keys.dedup();
            have_keys.sort();
            have_keys.dedup();
            want_keys != have_keys
        }
        ResolvedValue::CustomFields(supplied) => {
            let current = match remote {
                Some(Value::Object(map)) => map.clone(),
                _ => Map::new(),
            };
            supplied
                .iter()
                .any(|(k, v)| !json_eq(current.get(k).unwrap_or(&Value::Null), v))
        }
    }
}

/// Identifier of a reference as the server serialized it.
pub fn remote_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::Object(map) => map.get("id").and_then(Value::as_u64),
        _ => None,
    }
}

/// Choice fields come back as `{value, label}` and id-valued fields such as
/// `module` as `{id, display, ...}`; compare on the value or the id.
fn remote_scalar(value: &Value) -> &Value {
    match value {
        Value::Object(map) => map.get("value").or_else(|| map.get("id")).unwrap_or(value),
        other => other,
    }
}

fn desired_key(value: &ResolvedValue) -> String {
    match value {
        ResolvedValue::Id(id) => format!("id:{}", id),
        ResolvedValue::Scalar(v) => format!("v:{}", normalize(v)),
        other => format!("?:{}", other.to_json()),
    }
}

fn remote_key(value: &Value) -> String {
    match remote_id(value) {
        Some(id) => format!("id:{}", id),
        None => format!("v:{}", normalize(remote_scalar(value))),
    }
}

fn normalize(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// JSON equality that treats `1` and `1.0` as the same number.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| json_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| json_eq(v, other)))
        }
        _ => a == b,
    }
}
