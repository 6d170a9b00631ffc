//! Shared helpers for nbsync-core integration tests.

#![allow(dead_code)]

use nbsync_core::{
    DesiredSpec, EngineOptions, MemoryGateway, ReconciliationResult, Registry, Result,
    StateReconciler, TargetState,
};
use serde_json::{Value, json};

/// Reconciler over an empty in-memory inventory, plus a handle on that inventory.
pub fn engine() -> (StateReconciler<MemoryGateway>, MemoryGateway) {
    let gateway = MemoryGateway::new();
    let engine = StateReconciler::new(gateway.clone(), Registry::builtin());
    (engine, gateway)
}

pub fn spec(value: Value) -> DesiredSpec {
    serde_json::from_value(value).expect("desired spec must be an object")
}

pub async fn run(
    engine: &StateReconciler<MemoryGateway>,
    resource: &str,
    desired: Value,
    state: TargetState,
) -> Result<ReconciliationResult> {
    engine
        .reconcile(resource, &spec(desired), state, EngineOptions::default())
        .await
}

pub async fn check(
    engine: &StateReconciler<MemoryGateway>,
    resource: &str,
    desired: Value,
    state: TargetState,
) -> Result<ReconciliationResult> {
    engine
        .reconcile(
            resource,
            &spec(desired),
            state,
            EngineOptions::default().check_mode(true),
        )
        .await
}

/// Declare a custom field for one object type.
pub async fn declare_custom_field(gateway: &MemoryGateway, name: &str, object_type: &str) {
    gateway
        .seed(
            "extras/custom-fields",
            json!({"name": name, "object_types": [object_type]}),
        )
        .await;
}
