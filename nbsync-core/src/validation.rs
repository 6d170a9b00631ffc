//! Desired spec validation.
//!
//! Everything except custom field declarations is checked without touching
//! the network. Custom field keys need one read of the remote schema, which
//! still happens before reference resolution can create anything.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ValidationError};
use crate::gateway::{Filter, Gateway};
use crate::model::{DesiredSpec, TargetState, invalid};
use crate::registry::{CUSTOM_FIELDS_ENDPOINT, FieldKind, Registry, ResourceSchema};

/// Validate a top-level spec for the requested state.
pub fn validate(
    registry: &Registry,
    schema: &ResourceSchema,
    spec: &DesiredSpec,
    state: TargetState,
) -> std::result::Result<(), ValidationError> {
    if !schema.supports(state) {
        return Err(ValidationError::UnsupportedState {
            resource: schema.name.to_string(),
            state: state.to_string(),
        });
    }

    let missing: Vec<String> = schema
        .required_for(state)
        .iter()
        .filter(|f| !spec.contains(f))
        .map(|f| f.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingRequired {
            state: state.to_string(),
            fields: missing,
        });
    }

    check_fields(registry, schema, spec)
}

/// Unknown fields, value types, choices and required-together groups.
///
/// Nested specs are checked against their target schema, including the
/// presence of the target's natural key.
pub fn check_fields(
    registry: &Registry,
    schema: &ResourceSchema,
    spec: &DesiredSpec,
) -> std::result::Result<(), ValidationError> {
    for (name, value) in spec.iter() {
        let field = schema
            .field(name)
            .ok_or_else(|| ValidationError::UnknownField {
                resource: schema.name.to_string(),
                field: name.clone(),
            })?;

        check_value(registry, spec, name, &field.kind, value)?;

        if !field.choices.is_empty() {
            let text = choice_text(value);
            if !field.choices.contains(&text.as_str()) {
                return Err(ValidationError::InvalidChoice {
                    field: name.clone(),
                    value: text,
                    choices: field.choices.iter().map(|c| c.to_string()).collect(),
                });
            }
        }
    }

    for group in &schema.required_together {
        let given = group.iter().filter(|f| spec.contains(f)).count();
        if given != 0 && given != group.len() {
            return Err(ValidationError::RequiredTogether {
                fields: group.iter().map(|f| f.to_string()).collect(),
            });
        }
    }

    Ok(())
}

fn check_value(
    registry: &Registry,
    spec: &DesiredSpec,
    field: &str,
    kind: &FieldKind,
    value: &Value,
) -> std::result::Result<(), ValidationError> {
    match kind {
        FieldKind::Text => match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
            _ => Err(invalid(field, "a string", value)),
        },
        FieldKind::Integer => {
            if as_integer(value).is_some() {
                Ok(())
            } else {
                Err(invalid(field, "an integer", value))
            }
        }
        FieldKind::Boolean => match value {
            Value::Bool(_) => Ok(()),
            _ => Err(invalid(field, "a boolean", value)),
        },
        FieldKind::Mapping | FieldKind::CustomFields => match value {
            Value::Object(_) => Ok(()),
            _ => Err(invalid(field, "a mapping", value)),
        },
        FieldKind::Reference { target, .. } => match value {
            Value::Object(map) => match registry.get(target) {
                Some(target) => check_nested(registry, field, target, &DesiredSpec::from(map.clone())),
                None => Ok(()),
            },
            _ => check_reference(field, value),
        },
        FieldKind::ScopedReference { type_field } => match value {
            Value::Object(map) => {
                let target = spec
                    .get(type_field)
                    .and_then(Value::as_str)
                    .and_then(|t| registry.scope_target(t));
                match target {
                    Some(target) => {
                        check_nested(registry, field, target, &DesiredSpec::from(map.clone()))
                    }
                    None => Ok(()),
                }
            }
            _ => check_reference(field, value),
        },
        FieldKind::List { item, .. } => match value {
            Value::Array(items) => items
                .iter()
                .try_for_each(|v| check_value(registry, spec, field, item, v)),
            _ => Err(invalid(field, "a list", value)),
        },
    }
}

fn check_reference(field: &str, value: &Value) -> std::result::Result<(), ValidationError> {
    match value {
        Value::String(_) => Ok(()),
        Value::Number(n) if n.as_u64().is_some() => Ok(()),
        _ => Err(invalid(field, "a name, id or mapping", value)),
    }
}

fn check_nested(
    registry: &Registry,
    field: &str,
    target: &ResourceSchema,
    nested: &DesiredSpec,
) -> std::result::Result<(), ValidationError> {
    let missing: Vec<String> = target
        .natural_key
        .iter()
        .filter(|k| !nested.contains(k))
        .map(|k| k.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::NestedMissingKey {
            field: field.to_string(),
            resource: target.name.to_string(),
            keys: missing,
        });
    }
    check_fields(registry, target, nested)
}

/// Integer value of a JSON number or numeric string.
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn choice_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Reject custom field keys the remote schema does not declare.
///
/// Nested specs are walked too, since they may end up as the payload of a
/// created reference target. Each object type is read once.
pub async fn validate_custom_fields<G: Gateway + ?Sized>(
    gateway: &G,
    registry: &Registry,
    schema: &ResourceSchema,
    spec: &DesiredSpec,
) -> Result<()> {
    let mut supplied = BTreeMap::new();
    collect_custom_fields(registry, schema, spec, &mut supplied);

    for (object_type, keys) in supplied {
        let filter = Filter::new().with("object_type", object_type);
        let declared: BTreeSet<String> = gateway
            .list(CUSTOM_FIELDS_ENDPOINT, &filter)
            .await?
            .into_iter()
            .filter_map(|cf| cf.get("name").and_then(Value::as_str).map(str::to_string))
            .collect();
        debug!(
            object_type,
            declared = declared.len(),
            "Fetched custom field definitions"
        );

        let unknown: Vec<String> = keys.difference(&declared).cloned().collect();
        if !unknown.is_empty() {
            return Err(ValidationError::UndeclaredCustomFields {
                object_type: object_type.to_string(),
                keys: unknown,
            }
            .into());
        }
    }
    Ok(())
}

/// Custom field keys per object type, for `spec` and every nested spec in it.
fn collect_custom_fields(
    registry: &Registry,
    schema: &ResourceSchema,
    spec: &DesiredSpec,
    out: &mut BTreeMap<&'static str, BTreeSet<String>>,
) {
    for (name, value) in spec.iter() {
        let Some(field) = schema.field(name) else {
            continue;
        };
        collect_value(registry, schema, spec, &field.kind, value, out);
    }
}

fn collect_value(
    registry: &Registry,
    schema: &ResourceSchema,
    spec: &DesiredSpec,
    kind: &FieldKind,
    value: &Value,
    out: &mut BTreeMap<&'static str, BTreeSet<String>>,
) {
    match (kind, value) {
        (FieldKind::CustomFields, Value::Object(map)) if !map.is_empty() => {
            out.entry(schema.object_type)
                .or_default()
                .extend(map.keys().cloned());
        }
        (FieldKind::Reference { target, .. }, Value::Object(map)) => {
            if let Some(target) = registry.get(target) {
                collect_custom_fields(registry, target, &DesiredSpec::from(map.clone()), out);
            }
        }
        (FieldKind::ScopedReference { type_field }, Value::Object(map)) => {
            let target = spec
                .get(type_field)
                .and_then(Value::as_str)
                .and_then(|t| registry.scope_target(t));
            if let Some(target) = target {
                collect_custom_fields(registry, target, &DesiredSpec::from(map.clone()), out);
            }
        }
        (FieldKind::List { item, .. }, Value::Array(items)) => {
            for v in items {
                collect_value(registry, schema, spec, item, v, out);
            }
        }
        _ => {}
    }
}
