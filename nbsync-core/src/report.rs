//! Outward-facing result of one reconciliation.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::RemoteObject;
use crate::reconciler::Decision;
use crate::resolver::NestedCreation;

/// What the gateway returned for the applied decision.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResponse {
    Object(RemoteObject),
    Deleted,
    /// Nothing was sent: no-op or check mode.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub changed: bool,
    /// The object after the operation, the would-be object in check mode,
    /// or an empty object after a delete.
    pub object: Value,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Value>,
    /// Reference targets that check mode did not create.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned: Vec<NestedCreation>,
}

impl ReconciliationResult {
    /// `{"changed", "<resource>", "msg", "diff"}`, plus `planned_creations` when any.
    pub fn to_output(&self, resource: &str) -> Value {
        let mut out = Map::new();
        out.insert("changed".to_string(), Value::Bool(self.changed));
        out.insert(resource.to_string(), self.object.clone());
        out.insert("msg".to_string(), Value::String(self.msg.clone()));
        if let Some(diff) = &self.diff {
            out.insert("diff".to_string(), diff.clone());
        }
        if !self.planned.is_empty() {
            let planned = serde_json::to_value(&self.planned).unwrap_or(Value::Null);
            out.insert("planned_creations".to_string(), planned);
        }
        Value::Object(out)
    }
}

/// Nested creations made or planned while resolving references.
#[derive(Debug, Clone, Default)]
pub struct NestedChanges<'a> {
    pub planned: &'a [NestedCreation],
    pub created: &'a [NestedCreation],
}

impl NestedChanges<'_> {
    fn any(&self) -> bool {
        !self.planned.is_empty() || !self.created.is_empty()
    }
}

/// Assemble the result for `decision` given what the gateway returned.
pub fn build(
    resource: &str,
    label: &str,
    decision: &Decision,
    response: GatewayResponse,
    nested: NestedChanges<'_>,
) -> ReconciliationResult {
    let (object, verb, diff) = match decision {
        Decision::NoOp { existing: Some(existing) } => (existing.to_value(), "already exists", None),
        Decision::NoOp { existing: None } => (empty(), "already absent", None),
        Decision::Create { payload } => {
            let object = match response {
                GatewayResponse::Object(created) => created.to_value(),
                _ => Value::Object(payload.clone()),
            };
            let diff = serde_json::json!({ "before": {}, "after": payload });
            (object, "created", Some(diff))
        }
        Decision::Update {
            existing,
            diff,
            payload,
        } => {
            let object = match response {
                GatewayResponse::Object(updated) => updated.to_value(),
                _ => merged(existing, payload),
            };
            (object, "updated", Some(diff.to_value()))
        }
        Decision::Delete { existing } => {
            let diff = serde_json::json!({ "before": existing.to_value(), "after": {} });
            (empty(), "deleted", Some(diff))
        }
    };

    let msg = if label.is_empty() {
        format!("{} {}", resource, verb)
    } else {
        format!("{} {} {}", resource, label, verb)
    };

    ReconciliationResult {
        changed: decision.is_change() || nested.any(),
        object,
        msg,
        diff,
        planned: nested.planned.to_vec(),
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}

/// Existing attributes with the update payload applied on top.
fn merged(existing: &RemoteObject, payload: &Map<String, Value>) -> Value {
    let mut object = existing.to_value();
    if let Value::Object(map) = &mut object {
        for (k, v) in payload {
            map.insert(k.clone(), v.clone());
        }
    }
    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::diff::{Change, Diff};
    use serde_json::json;

    fn remote(value: Value) -> RemoteObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_noop_message() {
        let existing = remote(json!({"id": 1, "name": "Contact One"}));
        let decision = Decision::NoOp {
            existing: Some(existing),
        };
        let result = build(
            "contact",
            "Contact One",
            &decision,
            GatewayResponse::Skipped,
            NestedChanges::default(),
        );
        assert!(!result.changed);
        assert_eq!(result.msg, "contact Contact One already exists");
        assert_eq!(result.object["id"], json!(1));
        assert!(result.diff.is_none());
    }

    #[test]
    fn test_delete_returns_empty_object() {
        let existing = remote(json!({"id": 1, "name": "Contact One"}));
        let decision = Decision::Delete { existing };
        let result = build(
            "contact",
            "Contact One",
            &decision,
            GatewayResponse::Deleted,
            NestedChanges::default(),
        );
        assert!(result.changed);
        assert_eq!(result.object, json!({}));
        assert_eq!(result.msg, "contact Contact One deleted");
        assert_eq!(result.diff.unwrap()["after"], json!({}));
    }

    #[test]
    fn test_check_mode_update_shows_would_be_object() {
        let existing = remote(json!({"id": 1, "name": "Contact One", "title": "Engineer"}));
        let mut diff = Diff::default();
        diff.changes.insert(
            "title".to_string(),
            Change {
                before: json!("Engineer"),
                after: json!("Manager"),
            },
        );
        let payload = json!({"title": "Manager"}).as_object().unwrap().clone();
        let decision = Decision::Update {
            existing,
            diff,
            payload,
        };
        let result = build(
            "contact",
            "Contact One",
            &decision,
            GatewayResponse::Skipped,
            NestedChanges::default(),
        );
        assert!(result.changed);
        assert_eq!(result.object["title"], json!("Manager"));
        assert_eq!(result.object["id"], json!(1));
        assert_eq!(
            result.diff.unwrap(),
            json!({"before": {"title": "Engineer"}, "after": {"title": "Manager"}})
        );
    }

    #[test]
    fn test_planned_creation_marks_changed() {
        let existing = remote(json!({"id": 1, "name": "Contact One"}));
        let decision = Decision::NoOp {
            existing: Some(existing),
        };
        let planned = vec![NestedCreation {
            endpoint: "extras/tags".to_string(),
            label: "new-tag".to_string(),
        }];
        let result = build(
            "contact",
            "Contact One",
            &decision,
            GatewayResponse::Skipped,
            NestedChanges {
                planned: &planned,
                created: &[],
            },
        );
        assert!(result.changed);

        let output = result.to_output("contact");
        assert_eq!(output["planned_creations"][0]["endpoint"], json!("extras/tags"));
        assert_eq!(output["contact"]["name"], json!("Contact One"));
    }

    #[test]
    fn test_unlabelled_message() {
        let decision = Decision::Create {
            payload: json!({"comments": "hello"}).as_object().unwrap().clone(),
        };
        let created = remote(json!({"id": 9, "comments": "hello"}));
        let result = build(
            "journal_entry",
            "",
            &decision,
            GatewayResponse::Object(created),
            NestedChanges::default(),
        );
        assert_eq!(result.msg, "journal_entry created");
        assert_eq!(result.object["id"], json!(9));
        assert_eq!(result.diff.unwrap()["before"], json!({}));
    }
}
