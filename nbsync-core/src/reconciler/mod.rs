//! State reconciler.
//!
//! Compares the desired state of one record with what the remote inventory
//! holds and takes the single action needed to converge.

pub mod decision;
pub mod diff;

pub use decision::{Decision, decide};
pub use diff::{Change, Diff};

use tracing::{debug, info};

use crate::config::EngineOptions;
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::model::{DesiredSpec, RemoteObject, ResolvedSpec, TargetState};
use crate::registry::{Registry, ResourceSchema};
use crate::report::{self, GatewayResponse, NestedChanges, ReconciliationResult};
use crate::resolver::{Resolver, find_by_natural_key};
use crate::validation::{validate, validate_custom_fields};

/// Reconciles records of any registered resource type through one gateway.
pub struct StateReconciler<G> {
    gateway: G,
    registry: Registry,
}

impl<G: Gateway> StateReconciler<G> {
    pub fn new(gateway: G, registry: Registry) -> Self {
        Self { gateway, registry }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Converge one record of `resource` to `state`.
    pub async fn reconcile(
        &self,
        resource: &str,
        spec: &DesiredSpec,
        state: TargetState,
        options: EngineOptions,
    ) -> Result<ReconciliationResult> {
        let schema = self
            .registry
            .get(resource)
            .ok_or_else(|| Error::UnknownResource(resource.to_string()))?;

        validate(&self.registry, schema, spec, state)?;

        let label = spec.label(schema.natural_key);
        info!(
            resource,
            state = %state,
            check_mode = options.check_mode,
            "Reconciling {} {}",
            resource,
            label
        );

        match state {
            TargetState::Absent => self.reconcile_absent(schema, spec, &label, options).await,
            TargetState::Present | TargetState::New => {
                self.reconcile_present(schema, spec, state, &label, options)
                    .await
            }
        }
    }

    async fn reconcile_present(
        &self,
        schema: &ResourceSchema,
        spec: &DesiredSpec,
        state: TargetState,
        label: &str,
        options: EngineOptions,
    ) -> Result<ReconciliationResult> {
        validate_custom_fields(&self.gateway, &self.registry, schema, spec).await?;

        let mut resolver = Resolver::new(&self.gateway, &self.registry, options);
        let resolved = resolver.resolve_spec(schema, spec).await?;

        let existing = if state == TargetState::New {
            None
        } else {
            self.find_existing(schema, &resolved, label).await?
        };

        let decision = decide(schema, state, &resolved, existing);
        let response = self.apply(schema, &decision, options).await?;

        Ok(report::build(
            schema.name,
            label,
            &decision,
            response,
            NestedChanges {
                planned: resolver.planned(),
                created: resolver.created(),
            },
        ))
    }

    async fn reconcile_absent(
        &self,
        schema: &ResourceSchema,
        spec: &DesiredSpec,
        label: &str,
        options: EngineOptions,
    ) -> Result<ReconciliationResult> {
        let key = spec.project(schema.natural_key);
        let mut resolver = Resolver::lookup_only(&self.gateway, &self.registry, options);

        let resolved = resolver.resolve_spec(schema, &key).await?;
        let existing = self.find_existing(schema, &resolved, label).await?;

        let decision = decide(schema, TargetState::Absent, &ResolvedSpec::default(), existing);
        let response = self.apply(schema, &decision, options).await?;

        Ok(report::build(
            schema.name,
            label,
            &decision,
            response,
            NestedChanges::default(),
        ))
    }

    async fn find_existing(
        &self,
        schema: &ResourceSchema,
        resolved: &ResolvedSpec,
        label: &str,
    ) -> Result<Option<RemoteObject>> {
        if schema.natural_key.is_empty() {
            return Ok(None);
        }
        let planned_key = schema.natural_key.iter().any(|key| {
            schema
                .field(key)
                .and_then(|f| resolved.get(f.api_name))
                .is_some_and(|v| v.is_planned())
        });
        if planned_key {
            debug!(
                resource = schema.name,
                "Natural key refers to a planned object, skipping lookup"
            );
            return Ok(None);
        }
        find_by_natural_key(&self.gateway, schema, resolved, label).await
    }

    async fn apply(
        &self,
        schema: &ResourceSchema,
        decision: &Decision,
        options: EngineOptions,
    ) -> Result<GatewayResponse> {
        if options.check_mode || !decision.is_change() {
            debug!(
                resource = schema.name,
                action = decision.action(),
                check_mode = options.check_mode,
                "Not applying"
            );
            return Ok(GatewayResponse::Skipped);
        }

        let response = match decision {
            Decision::NoOp { .. } => GatewayResponse::Skipped,
            Decision::Create { payload } => {
                let created = self.gateway.create(schema.endpoint, payload).await?;
                info!(resource = schema.name, id = created.id, "Created");
                GatewayResponse::Object(created)
            }
            Decision::Update {
                existing,
                diff,
                payload,
            } => {
                let updated = self
                    .gateway
                    .update(schema.endpoint, existing.id, payload)
                    .await?;
                info!(
                    resource = schema.name,
                    id = existing.id,
                    fields = diff.len(),
                    "Updated"
                );
                GatewayResponse::Object(updated)
            }
            Decision::Delete { existing } => {
                self.gateway.delete(schema.endpoint, existing.id).await?;
                info!(resource = schema.name, id = existing.id, "Deleted");
                GatewayResponse::Deleted
            }
        };
        Ok(response)
    }
}
