//! In-memory gateway.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::GatewayError;
use crate::gateway::{Filter, Gateway, GatewayResult};
use crate::model::RemoteObject;

/// Number of calls made per gateway operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl CallCounts {
    /// Create, update and delete calls.
    pub fn mutations(&self) -> usize {
        self.create + self.update + self.delete
    }
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Vec<RemoteObject>>,
    next_id: u64,
    calls: CallCounts,
    /// Endpoint whose writes are rejected, with the status and message returned.
    reject: Option<(String, u16, String)>,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_reject(&self, endpoint: &str) -> GatewayResult<()> {
        match &self.reject {
            Some((rejected, status, message)) if rejected == endpoint => Err(GatewayError::Remote {
                status: *status,
                message: message.clone(),
            }),
            _ => Ok(()),
        }
    }
}

/// Gateway over a shared in-process object store.
///
/// Clones share the same store, so a test can keep a handle after moving
/// one into a reconciler.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<State>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object without counting a call. An `id` is assigned when missing.
    pub async fn seed(&self, endpoint: &str, object: Value) -> RemoteObject {
        let mut state = self.state.lock().await;
        let mut attributes = match object {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let id = match attributes.remove("id").and_then(|v| v.as_u64()) {
            Some(id) => {
                state.next_id = state.next_id.max(id);
                id
            }
            None => state.allocate_id(),
        };
        let object = RemoteObject { id, attributes };
        state
            .objects
            .entry(endpoint.to_string())
            .or_default()
            .push(object.clone());
        object
    }

    /// Snapshot of all objects at an endpoint.
    pub async fn objects(&self, endpoint: &str) -> Vec<RemoteObject> {
        let state = self.state.lock().await;
        state.objects.get(endpoint).cloned().unwrap_or_default()
    }

    pub async fn calls(&self) -> CallCounts {
        self.state.lock().await.calls
    }

    /// Make every create and update at `endpoint` fail with the given status.
    pub async fn reject_writes(&self, endpoint: &str, status: u16, message: &str) {
        let mut state = self.state.lock().await;
        state.reject = Some((endpoint.to_string(), status, message.to_string()));
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn list(&self, endpoint: &str, filter: &Filter) -> GatewayResult<Vec<RemoteObject>> {
        let mut state = self.state.lock().await;
        state.calls.list += 1;
        let found: Vec<RemoteObject> = state
            .objects
            .get(endpoint)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|obj| matches_filter(obj, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        debug!(endpoint, filter = %filter, found = found.len(), "memory list");
        Ok(found)
    }

    async fn create(
        &self,
        endpoint: &str,
        payload: &Map<String, Value>,
    ) -> GatewayResult<RemoteObject> {
        let mut state = self.state.lock().await;
        state.calls.create += 1;
        state.check_reject(endpoint)?;

        let id = state.allocate_id();
        let object = RemoteObject {
            id,
            attributes: payload.clone(),
        };
        state
            .objects
            .entry(endpoint.to_string())
            .or_default()
            .push(object.clone());
        Ok(object)
    }

    async fn update(
        &self,
        endpoint: &str,
        id: u64,
        payload: &Map<String, Value>,
    ) -> GatewayResult<RemoteObject> {
        let mut state = self.state.lock().await;
        state.calls.update += 1;
        state.check_reject(endpoint)?;

        let object = state
            .objects
            .get_mut(endpoint)
            .and_then(|objects| objects.iter_mut().find(|o| o.id == id))
            .ok_or_else(not_found)?;
        for (k, v) in payload {
            object.attributes.insert(k.clone(), v.clone());
        }
        Ok(object.clone())
    }

    async fn delete(&self, endpoint: &str, id: u64) -> GatewayResult<()> {
        let mut state = self.state.lock().await;
        state.calls.delete += 1;

        let objects = state.objects.get_mut(endpoint).ok_or_else(not_found)?;
        let before = objects.len();
        objects.retain(|o| o.id != id);
        if objects.len() == before {
            return Err(not_found());
        }
        Ok(())
    }
}

fn not_found() -> GatewayError {
    GatewayError::Remote {
        status: 404,
        message: "No object matches the given query.".to_string(),
    }
}

fn matches_filter(object: &RemoteObject, filter: &Filter) -> bool {
    filter.pairs().iter().all(|(key, want)| {
        if key == "id" {
            return object.id.to_string() == *want;
        }
        if let Some(value) = object.get(key) {
            return matches_value(value, want);
        }
        // `object_type` filters a list attribute named `object_types`.
        if let Some(value) = object.get(&format!("{}s", key)) {
            return matches_value(value, want);
        }
        // `<field>_id` filters match a reference stored as an id or `{id, ...}`.
        match key.strip_suffix("_id").and_then(|base| object.get(base)) {
            Some(Value::Object(reference)) => reference
                .get("id")
                .is_some_and(|id| matches_value(id, want)),
            Some(value) => matches_value(value, want),
            None => false,
        }
    })
}

fn matches_value(value: &Value, want: &str) -> bool {
    match value {
        Value::String(s) => s == want,
        Value::Number(n) => n.to_string() == want,
        Value::Bool(b) => b.to_string() == want,
        Value::Array(items) => items.iter().any(|v| matches_value(v, want)),
        Value::Object(map) => map
            .get("value")
            .or_else(|| map.get("slug"))
            .is_some_and(|v| matches_value(v, want)),
        Value::Null => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_filters() {
        let gateway = MemoryGateway::new();
        let rack = gateway.seed("dcim/racks", json!({"name": "Test rack"})).await;
        gateway
            .seed(
                "dcim/rack-reservations",
                json!({"rack": {"id": rack.id, "name": "Test rack"}, "description": "Patch panels"}),
            )
            .await;
        gateway
            .seed(
                "dcim/rack-reservations",
                json!({"rack": rack.id + 100, "description": "Patch panels"}),
            )
            .await;

        let filter = Filter::new()
            .with("rack_id", rack.id.to_string())
            .with("description", "Patch panels");
        let found = gateway.list("dcim/rack-reservations", &filter).await.unwrap();
        assert_eq!(found.len(), 1);

        let filter = Filter::new().with("object_type", "tenancy.contact");
        gateway
            .seed(
                "extras/custom-fields",
                json!({"name": "team", "object_types": ["tenancy.contact"]}),
            )
            .await;
        let found = gateway.list("extras/custom-fields", &filter).await.unwrap();
        assert_eq!(found.len(), 1);
        let filter = Filter::new().with("object_type", "dcim.site");
        let found = gateway.list("extras/custom-fields", &filter).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let gateway = MemoryGateway::new();
        let obj = gateway
            .seed("tenancy/contacts", json!({"name": "Contact One", "title": "Engineer"}))
            .await;

        let payload = json!({"title": "Manager"}).as_object().unwrap().clone();
        let updated = gateway
            .update("tenancy/contacts", obj.id, &payload)
            .await
            .unwrap();
        assert_eq!(updated.get("title"), Some(&json!("Manager")));
        assert_eq!(updated.get("name"), Some(&json!("Contact One")));

        gateway.delete("tenancy/contacts", obj.id).await.unwrap();
        assert!(gateway.objects("tenancy/contacts").await.is_empty());
        assert!(matches!(
            gateway.delete("tenancy/contacts", obj.id).await,
            Err(GatewayError::Remote { status: 404, .. })
        ));

        let calls = gateway.calls().await;
        assert_eq!(calls.update, 1);
        assert_eq!(calls.delete, 2);
        assert_eq!(calls.mutations(), 3);
    }

    #[tokio::test]
    async fn test_rejected_writes() {
        let gateway = MemoryGateway::new();
        gateway
            .reject_writes("tenancy/contacts", 400, "name: must be unique")
            .await;
        let payload = json!({"name": "Contact One"}).as_object().unwrap().clone();
        let err = gateway.create("tenancy/contacts", &payload).await.unwrap_err();
        assert!(matches!(err, GatewayError::Remote { status: 400, .. }));
        assert!(gateway.objects("tenancy/contacts").await.is_empty());
    }
}
