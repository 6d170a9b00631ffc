//! The action taken for one record.

use serde_json::{Map, Value};

use super::diff::{self, Diff};
use crate::model::{RemoteObject, ResolvedSpec, TargetState};
use crate::registry::ResourceSchema;
use crate::resolver::add_slug;

/// Outcome of comparing the desired state with what exists remotely.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    NoOp { existing: Option<RemoteObject> },
    Create { payload: Map<String, Value> },
    Update {
        existing: RemoteObject,
        diff: Diff,
        payload: Map<String, Value>,
    },
    Delete { existing: RemoteObject },
}

impl Decision {
    /// Whether applying this decision mutates remote state.
    pub fn is_change(&self) -> bool {
        !matches!(self, Decision::NoOp { .. })
    }

    pub fn action(&self) -> &'static str {
        match self {
            Decision::NoOp { .. } => "none",
            Decision::Create { .. } => "create",
            Decision::Update { .. } => "update",
            Decision::Delete { .. } => "delete",
        }
    }
}

/// Map requested state and lookup result to an action.
///
/// | state   | exists | action                     |
/// |---------|--------|----------------------------|
/// | absent  | yes    | delete                     |
/// | absent  | no     | none                       |
/// | present | no     | create                     |
/// | present | yes    | update if anything differs |
/// | new     | -      | create                     |
pub fn decide(
    schema: &ResourceSchema,
    state: TargetState,
    resolved: &ResolvedSpec,
    existing: Option<RemoteObject>,
) -> Decision {
    match (state, existing) {
        (TargetState::Absent, Some(existing)) => Decision::Delete { existing },
        (TargetState::Absent, None) => Decision::NoOp { existing: None },
        (TargetState::New, _) | (TargetState::Present, None) => Decision::Create {
            payload: create_payload(schema, resolved),
        },
        (TargetState::Present, Some(existing)) => {
            let diff = diff::diff(resolved, &existing);
            if diff.is_empty() {
                Decision::NoOp {
                    existing: Some(existing),
                }
            } else {
                let payload = diff::update_payload(&diff, &existing);
                Decision::Update {
                    existing,
                    diff,
                    payload,
                }
            }
        }
    }
}

/// Full resolved payload, with a derived slug when the schema has one.
pub fn create_payload(schema: &ResourceSchema, resolved: &ResolvedSpec) -> Map<String, Value> {
    let mut payload = resolved.to_payload();
    add_slug(schema, &mut payload);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResolvedValue;
    use crate::registry::Registry;
    use serde_json::json;

    fn resolved(fields: &[(&str, Value)]) -> ResolvedSpec {
        let mut spec = ResolvedSpec::default();
        for (k, v) in fields {
            spec.insert(k, ResolvedValue::Scalar(v.clone()));
        }
        spec
    }

    fn remote(value: Value) -> RemoteObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decision_table() {
        let registry = Registry::builtin();
        let schema = registry.get("contact").unwrap();
        let desired = resolved(&[("name", json!("Contact One")), ("title", json!("Manager"))]);
        let same = remote(json!({"id": 1, "name": "Contact One", "title": "Manager"}));
        let other = remote(json!({"id": 1, "name": "Contact One", "title": "Engineer"}));

        assert!(matches!(
            decide(schema, TargetState::Present, &desired, None),
            Decision::Create { .. }
        ));
        assert!(matches!(
            decide(schema, TargetState::Present, &desired, Some(same.clone())),
            Decision::NoOp { existing: Some(_) }
        ));
        assert!(matches!(
            decide(schema, TargetState::Present, &desired, Some(other)),
            Decision::Update { .. }
        ));
        assert!(matches!(
            decide(schema, TargetState::Absent, &desired, Some(same.clone())),
            Decision::Delete { .. }
        ));
        assert!(matches!(
            decide(schema, TargetState::Absent, &desired, None),
            Decision::NoOp { existing: None }
        ));
        assert!(matches!(
            decide(schema, TargetState::New, &desired, Some(same)),
            Decision::Create { .. }
        ));
    }

    #[test]
    fn test_update_payload_has_only_changes() {
        let registry = Registry::builtin();
        let schema = registry.get("contact").unwrap();
        let desired = resolved(&[("name", json!("Contact One")), ("title", json!("Manager"))]);
        let existing = remote(json!({"id": 1, "name": "Contact One", "title": "Engineer"}));

        match decide(schema, TargetState::Present, &desired, Some(existing)) {
            Decision::Update { payload, .. } => {
                assert_eq!(Value::Object(payload), json!({"title": "Manager"}));
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_create_derives_slug() {
        let registry = Registry::builtin();
        let schema = registry.get("device_role").unwrap();
        let desired = resolved(&[("name", json!("Core Switch"))]);
        let payload = create_payload(schema, &desired);
        assert_eq!(payload["slug"], json!("core-switch"));

        let desired = resolved(&[("name", json!("Core Switch")), ("slug", json!("core"))]);
        let payload = create_payload(schema, &desired);
        assert_eq!(payload["slug"], json!("core"));

        // contacts have no slug
        let schema = registry.get("contact").unwrap();
        let payload = create_payload(schema, &resolved(&[("name", json!("Contact One"))]));
        assert!(!payload.contains_key("slug"));
    }
}
