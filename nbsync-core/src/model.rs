//! Desired, resolved and remote representations of an inventory record.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::registry::FieldKind;

/// Requested end state for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    Present,
    Absent,
    /// Create unconditionally, even if an object with the same key exists.
    New,
}

impl TargetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetState::Present => "present",
            TargetState::Absent => "absent",
            TargetState::New => "new",
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(TargetState::Present),
            "absent" => Ok(TargetState::Absent),
            "new" => Ok(TargetState::New),
            other => Err(format!(
                "invalid state '{}', expected one of: present, absent, new",
                other
            )),
        }
    }
}

/// Field name to raw value, as supplied by the caller.
///
/// `null` values are dropped on construction so that an explicit null and an
/// omitted key both mean "leave this field alone".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct DesiredSpec {
    fields: Map<String, Value>,
}

impl DesiredSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful in tests.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.fields.insert(field.to_string(), value);
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the named fields.
    pub fn project(&self, names: &[&str]) -> DesiredSpec {
        let fields = self
            .fields
            .iter()
            .filter(|(k, _)| names.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        DesiredSpec { fields }
    }

    /// Human readable label built from the given key fields.
    pub fn label(&self, keys: &[&str]) -> String {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .map(value_label)
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("name")
            .or_else(|| map.get("username"))
            .or_else(|| map.get("slug"))
            .map(value_label)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

impl From<Map<String, Value>> for DesiredSpec {
    fn from(map: Map<String, Value>) -> Self {
        let fields = map.into_iter().filter(|(_, v)| !v.is_null()).collect();
        DesiredSpec { fields }
    }
}

impl From<DesiredSpec> for Map<String, Value> {
    fn from(spec: DesiredSpec) -> Self {
        spec.fields
    }
}

/// How a reference names its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefKey {
    Name(String),
    Id(u64),
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKey::Name(name) => write!(f, "'{}'", name),
            RefKey::Id(id) => write!(f, "id {}", id),
        }
    }
}

/// A desired value, classified by the kind of field it was given for.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Scalar(Value),
    Reference(RefKey),
    Nested(DesiredSpec),
    List(Vec<RawValue>),
}

impl RawValue {
    pub fn classify(field: &str, value: &Value, kind: &FieldKind) -> Result<Self, ValidationError> {
        match kind {
            FieldKind::Text
            | FieldKind::Integer
            | FieldKind::Boolean
            | FieldKind::Mapping
            | FieldKind::CustomFields => Ok(RawValue::Scalar(value.clone())),
            FieldKind::Reference { .. } | FieldKind::ScopedReference { .. } => match value {
                Value::String(name) => Ok(RawValue::Reference(RefKey::Name(name.clone()))),
                Value::Number(n) => n
                    .as_u64()
                    .map(|id| RawValue::Reference(RefKey::Id(id)))
                    .ok_or_else(|| invalid(field, "a name, id or mapping", value)),
                Value::Object(map) => Ok(RawValue::Nested(DesiredSpec::from(map.clone()))),
                _ => Err(invalid(field, "a name, id or mapping", value)),
            },
            FieldKind::List { item, .. } => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|v| RawValue::classify(field, v, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(RawValue::List),
                _ => Err(invalid(field, "a list", value)),
            },
        }
    }
}

pub(crate) fn invalid(field: &str, expected: &'static str, value: &Value) -> ValidationError {
    ValidationError::InvalidType {
        field: field.to_string(),
        expected,
        value: value.to_string(),
    }
}

/// A desired value after reference resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Scalar(Value),
    Id(u64),
    /// An object that would have been created outside check mode.
    Planned { endpoint: String, label: String },
    /// Order and duplicates are significant.
    Sequence(Vec<ResolvedValue>),
    /// Deduplicated and sorted; order is not significant.
    Set(Vec<ResolvedValue>),
    CustomFields(Map<String, Value>),
}

impl ResolvedValue {
    pub fn to_json(&self) -> Value {
        match self {
            ResolvedValue::Scalar(v) => v.clone(),
            ResolvedValue::Id(id) => Value::from(*id),
            ResolvedValue::Planned { endpoint, label } => {
                Value::String(format!("(new {}: {})", endpoint, label))
            }
            ResolvedValue::Sequence(items) | ResolvedValue::Set(items) => {
                Value::Array(items.iter().map(ResolvedValue::to_json).collect())
            }
            ResolvedValue::CustomFields(map) => Value::Object(map.clone()),
        }
    }

    pub fn is_planned(&self) -> bool {
        match self {
            ResolvedValue::Planned { .. } => true,
            ResolvedValue::Sequence(items) | ResolvedValue::Set(items) => {
                items.iter().any(ResolvedValue::is_planned)
            }
            _ => false,
        }
    }

    /// Stable text form used for set ordering and cache keys.
    pub(crate) fn sort_key(&self) -> String {
        match self {
            ResolvedValue::Id(id) => format!("{:020}", id),
            other => other.to_json().to_string(),
        }
    }
}

/// Resolved fields keyed by API attribute name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSpec {
    pub fields: BTreeMap<String, ResolvedValue>,
}

impl ResolvedSpec {
    pub fn get(&self, api_name: &str) -> Option<&ResolvedValue> {
        self.fields.get(api_name)
    }

    pub fn insert(&mut self, api_name: &str, value: ResolvedValue) {
        self.fields.insert(api_name.to_string(), value);
    }

    pub fn to_payload(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

/// A record as serialized by the remote inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: u64,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl RemoteObject {
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        if attribute == "id" {
            return None;
        }
        self.attributes.get(attribute).filter(|v| !v.is_null())
    }

    /// Tag identifiers or names, whichever form the server returned.
    pub fn tags(&self) -> Vec<&Value> {
        match self.attributes.get("tags") {
            Some(Value::Array(tags)) => tags.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn custom_fields(&self) -> Map<String, Value> {
        match self.attributes.get("custom_fields") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::from(self.id));
        for (k, v) in &self.attributes {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }
}
