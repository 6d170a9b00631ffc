//! Reference resolution.
//!
//! Turns the human-friendly values of a desired spec (names, ids, nested
//! mappings, lists of those) into the identifiers the API expects. Lookups go
//! through the [`Gateway`] and are cached for the lifetime of one resolver.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::EngineOptions;
use crate::error::{Error, Result, ValidationError};
use crate::gateway::{Filter, Gateway};
use crate::model::{DesiredSpec, RawValue, RefKey, RemoteObject, ResolvedSpec, ResolvedValue, invalid};
use crate::reconciler::diff::differs;
use crate::registry::{FieldKind, FieldSpec, ListOrder, Registry, ResourceSchema, slugify};
use crate::validation::as_integer;

/// A reference target created (or, in check mode, planned) during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NestedCreation {
    pub endpoint: String,
    pub label: String,
}

/// Resolves desired values for one invocation.
pub struct Resolver<'a, G: ?Sized> {
    gateway: &'a G,
    registry: &'a Registry,
    options: EngineOptions,
    /// Resolve for lookup only: never create, report missing nested targets as NotFound.
    lookup_only: bool,
    cache: HashMap<(String, String), ResolvedValue>,
    planned: Vec<NestedCreation>,
    created: Vec<NestedCreation>,
}

impl<'a, G: Gateway + ?Sized> Resolver<'a, G> {
    pub fn new(gateway: &'a G, registry: &'a Registry, options: EngineOptions) -> Self {
        Self {
            gateway,
            registry,
            options,
            lookup_only: false,
            cache: HashMap::new(),
            planned: Vec::new(),
            created: Vec::new(),
        }
    }

    /// Resolver that never creates anything.
    pub fn lookup_only(gateway: &'a G, registry: &'a Registry, options: EngineOptions) -> Self {
        Self {
            lookup_only: true,
            ..Self::new(gateway, registry, options)
        }
    }

    /// Creations suppressed by check mode.
    pub fn planned(&self) -> &[NestedCreation] {
        &self.planned
    }

    /// Reference targets created so far. These are not rolled back on a later failure.
    pub fn created(&self) -> &[NestedCreation] {
        &self.created
    }

    fn schema(&self, name: &str) -> Result<&'a ResourceSchema> {
        let registry: &'a Registry = self.registry;
        registry
            .get(name)
            .ok_or_else(|| Error::UnknownResource(name.to_string()))
    }

    /// Resolve every field of `spec` against `schema`, keyed by API name.
    pub async fn resolve_spec(
        &mut self,
        schema: &'a ResourceSchema,
        spec: &DesiredSpec,
    ) -> Result<ResolvedSpec> {
        let mut resolved = ResolvedSpec::default();
        for (name, value) in spec.iter() {
            let field = schema
                .field(name)
                .ok_or_else(|| ValidationError::UnknownField {
                    resource: schema.name.to_string(),
                    field: name.clone(),
                })?;
            let value = self.resolve_field(field, value, spec).await?;
            resolved.insert(field.api_name, value);
        }
        Ok(resolved)
    }

    async fn resolve_field(
        &mut self,
        field: &'a FieldSpec,
        value: &Value,
        spec: &DesiredSpec,
    ) -> Result<ResolvedValue> {
        let raw = RawValue::classify(field.name, value, &field.kind)?;
        match (&field.kind, raw) {
            (FieldKind::List { item, order }, RawValue::List(items)) => {
                let mut values = Vec::with_capacity(items.len());
                for raw in items {
                    values.push(self.resolve_leaf(field.name, item, raw, spec).await?);
                }
                Ok(match order {
                    ListOrder::Sequence => ResolvedValue::Sequence(values),
                    ListOrder::Set => {
                        values.sort_by_key(ResolvedValue::sort_key);
                        values.dedup();
                        ResolvedValue::Set(values)
                    }
                })
            }
            (kind, raw) => self.resolve_leaf(field.name, kind, raw, spec).await,
        }
    }

    async fn resolve_leaf(
        &mut self,
        field: &str,
        kind: &'a FieldKind,
        raw: RawValue,
        spec: &DesiredSpec,
    ) -> Result<ResolvedValue> {
        match (kind, raw) {
            (FieldKind::Text, RawValue::Scalar(value)) => Ok(ResolvedValue::Scalar(match value {
                Value::Number(n) => Value::String(n.to_string()),
                Value::Bool(b) => Value::String(b.to_string()),
                other => other,
            })),
            (FieldKind::Integer, RawValue::Scalar(value)) => match as_integer(&value) {
                Some(n) => Ok(ResolvedValue::Scalar(Value::from(n))),
                None => Err(invalid(field, "an integer", &value).into()),
            },
            (FieldKind::CustomFields, RawValue::Scalar(Value::Object(map))) => {
                Ok(ResolvedValue::CustomFields(map))
            }
            (FieldKind::Reference { target, creatable }, raw) => {
                let target = self.schema(target)?;
                let allow_create = *creatable && self.options.create_missing_references;
                self.resolve(field, raw, target, allow_create).await
            }
            (FieldKind::ScopedReference { type_field }, raw) => {
                let registry: &'a Registry = self.registry;
                let target = spec
                    .get(type_field)
                    .and_then(Value::as_str)
                    .and_then(|t| registry.scope_target(t))
                    .ok_or_else(|| ValidationError::RequiredTogether {
                        fields: vec![type_field.to_string(), field.to_string()],
                    })?;
                self.resolve(field, raw, target, false).await
            }
            (FieldKind::List { .. }, _) => {
                Err(invalid(field, "a flat list", &Value::Null).into())
            }
            (_, RawValue::Scalar(value)) => Ok(ResolvedValue::Scalar(value)),
            (_, _) => Err(invalid(field, "a scalar", &Value::Null).into()),
        }
    }

    /// Resolve one reference value against `target`.
    pub async fn resolve(
        &mut self,
        field: &str,
        raw: RawValue,
        target: &'a ResourceSchema,
        allow_create: bool,
    ) -> Result<ResolvedValue> {
        let cache_key = (
            target.endpoint.to_string(),
            match &raw {
                RawValue::Reference(RefKey::Name(name)) => format!("name:{}", name),
                RawValue::Reference(RefKey::Id(id)) => format!("id:{}", id),
                other => format!("{:?}", other),
            },
        );
        if let Some(hit) = self.cache.get(&cache_key) {
            return Ok(hit.clone());
        }

        let value = match raw {
            RawValue::Reference(RefKey::Name(name)) => {
                self.resolve_name(target, &name, allow_create).await?
            }
            RawValue::Reference(RefKey::Id(id)) => self.resolve_id(target, id).await?,
            RawValue::Nested(nested) => self.resolve_nested(field, target, &nested).await?,
            RawValue::Scalar(value) => {
                return Err(invalid(field, "a name, id or mapping", &value).into());
            }
            RawValue::List(_) => {
                return Err(invalid(field, "a name, id or mapping", &Value::Null).into());
            }
        };

        self.cache.insert(cache_key, value.clone());
        Ok(value)
    }

    async fn resolve_name(
        &mut self,
        target: &'a ResourceSchema,
        name: &str,
        allow_create: bool,
    ) -> Result<ResolvedValue> {
        for key in target.lookup_keys {
            let filter = Filter::new().with(*key, name);
            let candidates: Vec<RemoteObject> = self
                .gateway
                .list(target.endpoint, &filter)
                .await?
                .into_iter()
                .filter(|obj| obj.get(key).is_some_and(|v| value_text(v) == name))
                .collect();
            debug!(
                endpoint = target.endpoint,
                key = *key,
                reference = name,
                candidates = candidates.len(),
                "Looked up reference"
            );

            match candidates.as_slice() {
                [] => continue,
                [only] => return Ok(ResolvedValue::Id(only.id)),
                many => {
                    return Err(Error::AmbiguousReference {
                        endpoint: target.endpoint.to_string(),
                        key: name.to_string(),
                        count: many.len(),
                    });
                }
            }
        }

        if !allow_create || self.lookup_only {
            return Err(Error::NotFound {
                endpoint: target.endpoint.to_string(),
                key: name.to_string(),
            });
        }

        let mut payload = Map::new();
        let key = target.lookup_keys.first().copied().unwrap_or("name");
        payload.insert(key.to_string(), Value::String(name.to_string()));
        add_slug(target, &mut payload);
        self.create(target, name, payload).await
    }

    async fn resolve_id(&mut self, target: &'a ResourceSchema, id: u64) -> Result<ResolvedValue> {
        let filter = Filter::new().with("id", id.to_string());
        let found = self
            .gateway
            .list(target.endpoint, &filter)
            .await?
            .into_iter()
            .any(|obj| obj.id == id);
        if found {
            Ok(ResolvedValue::Id(id))
        } else {
            Err(Error::NotFound {
                endpoint: target.endpoint.to_string(),
                key: format!("id {}", id),
            })
        }
    }

    async fn resolve_nested(
        &mut self,
        field: &str,
        target: &'a ResourceSchema,
        nested: &DesiredSpec,
    ) -> Result<ResolvedValue> {
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
            }
            .into());
        }

        let label = nested.label(target.natural_key);
        let to_resolve = if self.lookup_only {
            nested.project(target.natural_key)
        } else {
            nested.clone()
        };
        let resolved = Box::pin(self.resolve_spec(target, &to_resolve)).await?;

        if let Some(existing) = find_by_natural_key(self.gateway, target, &resolved, &label).await? {
            return Ok(ResolvedValue::Id(existing.id));
        }

        if self.lookup_only {
            return Err(Error::NotFound {
                endpoint: target.endpoint.to_string(),
                key: label,
            });
        }

        let mut payload = resolved.to_payload();
        add_slug(target, &mut payload);
        self.create(target, &label, payload).await
    }

    async fn create(
        &mut self,
        target: &'a ResourceSchema,
        label: &str,
        payload: Map<String, Value>,
    ) -> Result<ResolvedValue> {
        let creation = NestedCreation {
            endpoint: target.endpoint.to_string(),
            label: label.to_string(),
        };

        if self.options.check_mode {
            info!(endpoint = target.endpoint, label, "Would create missing reference");
            self.planned.push(creation);
            return Ok(ResolvedValue::Planned {
                endpoint: target.endpoint.to_string(),
                label: label.to_string(),
            });
        }

        let created = self.gateway.create(target.endpoint, &payload).await?;
        info!(
            endpoint = target.endpoint,
            label,
            id = created.id,
            "Created missing reference"
        );
        self.created.push(creation);
        Ok(ResolvedValue::Id(created.id))
    }
}

/// Find the single object of `schema` whose natural key matches `resolved`.
///
/// The gateway narrows the candidates, then every candidate is re-checked
/// for exact equality. A planned key value can never match.
pub async fn find_by_natural_key<G: Gateway + ?Sized>(
    gateway: &G,
    schema: &ResourceSchema,
    resolved: &ResolvedSpec,
    label: &str,
) -> Result<Option<RemoteObject>> {
    let mut filter = Filter::new();
    let mut keys = Vec::with_capacity(schema.natural_key.len());
    for key in schema.natural_key {
        let Some(field) = schema.field(key) else {
            return Ok(None);
        };
        let Some(value) = resolved.get(field.api_name) else {
            return Ok(None);
        };
        match value {
            ResolvedValue::Id(id) => filter.push(format!("{}_id", field.api_name), id.to_string()),
            ResolvedValue::Scalar(v) => filter.push(field.api_name, value_text(v)),
            _ => return Ok(None),
        }
        keys.push((field.api_name, value));
    }
    if keys.is_empty() {
        return Ok(None);
    }

    let matches: Vec<RemoteObject> = gateway
        .list(schema.endpoint, &filter)
        .await?
        .into_iter()
        .filter(|obj| keys.iter().all(|(api, want)| !differs(want, obj.get(api))))
        .collect();
    debug!(
        endpoint = schema.endpoint,
        filter = %filter,
        matches = matches.len(),
        "Looked up existing object"
    );

    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.into_iter().next()),
        count => Err(Error::AmbiguousReference {
            endpoint: schema.endpoint.to_string(),
            key: label.to_string(),
            count,
        }),
    }
}

/// Derive `slug` from the schema's slug source when the payload lacks one.
pub(crate) fn add_slug(schema: &ResourceSchema, payload: &mut Map<String, Value>) {
    let Some(source) = schema.slug_source else {
        return;
    };
    if payload.contains_key("slug") {
        return;
    }
    if let Some(text) = payload.get(source).and_then(Value::as_str) {
        let slug = slugify(text);
        payload.insert("slug".to_string(), Value::String(slug));
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MemoryGateway;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::builtin()
    }

    #[tokio::test]
    async fn test_resolve_name_to_id() {
        let gateway = MemoryGateway::new();
        let group = gateway
            .seed("tenancy/contact-groups", json!({"name": "Ops", "slug": "ops"}))
            .await;
        let registry = registry();
        let schema = registry.get("contact").unwrap();
        let spec = DesiredSpec::new()
            .with("name", "Contact One")
            .with("contact_group", "Ops");

        let mut resolver = Resolver::new(&gateway, &registry, EngineOptions::default());
        let resolved = resolver.resolve_spec(schema, &spec).await.unwrap();

        assert_eq!(resolved.get("group"), Some(&ResolvedValue::Id(group.id)));
        assert_eq!(
            resolved.get("name"),
            Some(&ResolvedValue::Scalar(json!("Contact One")))
        );
    }

    #[tokio::test]
    async fn test_missing_reference_without_create() {
        let gateway = MemoryGateway::new();
        let registry = registry();
        let schema = registry.get("contact").unwrap();
        let spec = DesiredSpec::new().with("contact_group", "Ops");

        let mut resolver = Resolver::new(&gateway, &registry, EngineOptions::default());
        let err = resolver.resolve_spec(schema, &spec).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(gateway.calls().await.create, 0);
    }

    #[tokio::test]
    async fn test_missing_reference_created_with_slug() {
        let gateway = MemoryGateway::new();
        let registry = registry();
        let schema = registry.get("contact").unwrap();
        let spec = DesiredSpec::new().with("contact_group", "Network Ops");
        let options = EngineOptions::default().create_missing_references(true);

        let mut resolver = Resolver::new(&gateway, &registry, options);
        let resolved = resolver.resolve_spec(schema, &spec).await.unwrap();

        let groups = gateway.objects("tenancy/contact-groups").await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].get("slug"), Some(&json!("network-ops")));
        assert_eq!(resolved.get("group"), Some(&ResolvedValue::Id(groups[0].id)));
        assert_eq!(resolver.created().len(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_even_when_create_allowed() {
        let gateway = MemoryGateway::new();
        gateway.seed("extras/tags", json!({"name": "first", "slug": "first"})).await;
        gateway.seed("extras/tags", json!({"name": "first", "slug": "first-2"})).await;
        let registry = registry();
        let schema = registry.get("contact").unwrap();
        let spec = DesiredSpec::new().with("tags", json!(["first"]));
        let options = EngineOptions::default().create_missing_references(true);

        let mut resolver = Resolver::new(&gateway, &registry, options);
        let err = resolver.resolve_spec(schema, &spec).await.unwrap_err();
        assert!(matches!(err, Error::AmbiguousReference { count: 2, .. }));
        assert_eq!(gateway.calls().await.create, 0);
    }

    #[tokio::test]
    async fn test_tag_set_is_sorted_and_deduplicated() {
        let gateway = MemoryGateway::new();
        let a = gateway.seed("extras/tags", json!({"name": "a", "slug": "a"})).await;
        let b = gateway.seed("extras/tags", json!({"name": "b", "slug": "b"})).await;
        let registry = registry();
        let schema = registry.get("contact").unwrap();
        let spec = DesiredSpec::new().with("tags", json!(["b", "a", "b"]));

        let mut resolver = Resolver::new(&gateway, &registry, EngineOptions::default());
        let resolved = resolver.resolve_spec(schema, &spec).await.unwrap();
        assert_eq!(
            resolved.get("tags"),
            Some(&ResolvedValue::Set(vec![
                ResolvedValue::Id(a.id),
                ResolvedValue::Id(b.id)
            ]))
        );
    }

    #[tokio::test]
    async fn test_lookups_are_cached() {
        let gateway = MemoryGateway::new();
        gateway.seed("extras/tags", json!({"name": "a", "slug": "a"})).await;
        let registry = registry();
        let schema = registry.get("contact").unwrap();
        let spec = DesiredSpec::new().with("tags", json!(["a", "a"]));

        let mut resolver = Resolver::new(&gateway, &registry, EngineOptions::default());
        resolver.resolve_spec(schema, &spec).await.unwrap();
        assert_eq!(gateway.calls().await.list, 1);
    }

    #[tokio::test]
    async fn test_id_reference_must_exist() {
        let gateway = MemoryGateway::new();
        let rack = gateway.seed("dcim/racks", json!({"name": "Test rack"})).await;
        let registry = registry();
        let schema = registry.get("rack_reservation").unwrap();

        let mut resolver = Resolver::new(&gateway, &registry, EngineOptions::default());
        let spec = DesiredSpec::new().with("rack", rack.id);
        let resolved = resolver.resolve_spec(schema, &spec).await.unwrap();
        assert_eq!(resolved.get("rack"), Some(&ResolvedValue::Id(rack.id)));

        let spec = DesiredSpec::new().with("rack", 999);
        let err = resolver.resolve_spec(schema, &spec).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_nested_spec_found_by_natural_key() {
        let gateway = MemoryGateway::new();
        let site = gateway.seed("dcim/sites", json!({"name": "DC1", "slug": "dc1"})).await;
        let rack = gateway
            .seed("dcim/racks", json!({"name": "Test rack", "site": {"id": site.id, "name": "DC1"}}))
            .await;
        let registry = registry();
        let schema = registry.get("rack_reservation").unwrap();
        let spec = DesiredSpec::new().with("rack", json!({"name": "Test rack", "site": "DC1"}));

        let mut resolver = Resolver::new(&gateway, &registry, EngineOptions::default());
        let resolved = resolver.resolve_spec(schema, &spec).await.unwrap();
        assert_eq!(resolved.get("rack"), Some(&ResolvedValue::Id(rack.id)));
        assert_eq!(gateway.calls().await.create, 0);
    }

    #[tokio::test]
    async fn test_nested_spec_created_when_missing() {
        let gateway = MemoryGateway::new();
        let registry = registry();
        let schema = registry.get("console_port").unwrap();
        let spec = DesiredSpec::new()
            .with("device", json!({"name": "Test Device"}))
            .with("name", "Console Port");

        let mut resolver = Resolver::new(&gateway, &registry, EngineOptions::default());
        let resolved = resolver.resolve_spec(schema, &spec).await.unwrap();

        let devices = gateway.objects("dcim/devices").await;
        assert_eq!(devices.len(), 1);
        assert_eq!(resolved.get("device"), Some(&ResolvedValue::Id(devices[0].id)));
    }

    #[tokio::test]
    async fn test_nested_creation_planned_in_check_mode() {
        let gateway = MemoryGateway::new();
        let registry = registry();
        let schema = registry.get("console_port").unwrap();
        let spec = DesiredSpec::new().with("device", json!({"name": "Test Device"}));
        let options = EngineOptions::default().check_mode(true);

        let mut resolver = Resolver::new(&gateway, &registry, options);
        let resolved = resolver.resolve_spec(schema, &spec).await.unwrap();

        assert!(resolved.get("device").unwrap().is_planned());
        assert_eq!(resolver.planned().len(), 1);
        assert!(gateway.objects("dcim/devices").await.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_only_never_creates() {
        let gateway = MemoryGateway::new();
        let registry = registry();
        let schema = registry.get("console_port").unwrap();
        let spec = DesiredSpec::new().with("device", json!({"name": "Test Device"}));

        let mut resolver = Resolver::lookup_only(&gateway, &registry, EngineOptions::default());
        let err = resolver.resolve_spec(schema, &spec).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(gateway.calls().await.create, 0);
    }

    #[tokio::test]
    async fn test_scoped_reference_uses_scope_type() {
        let gateway = MemoryGateway::new();
        let site = gateway.seed("dcim/sites", json!({"name": "Site A", "slug": "site-a"})).await;
        let registry = registry();
        let schema = registry.get("cluster").unwrap();
        let spec = DesiredSpec::new()
            .with("name", "Cluster 1")
            .with("scope_type", "dcim.site")
            .with("scope", "Site A");

        let mut resolver = Resolver::new(&gateway, &registry, EngineOptions::default());
        let resolved = resolver.resolve_spec(schema, &spec).await.unwrap();
        assert_eq!(resolved.get("scope_id"), Some(&ResolvedValue::Id(site.id)));
    }

    #[tokio::test]
    async fn test_integer_coercion() {
        let gateway = MemoryGateway::new();
        let registry = registry();
        let schema = registry.get("journal_entry").unwrap();
        let spec = DesiredSpec::new().with("assigned_object_id", "5");

        let mut resolver = Resolver::new(&gateway, &registry, EngineOptions::default());
        let resolved = resolver.resolve_spec(schema, &spec).await.unwrap();
        assert_eq!(
            resolved.get("assigned_object_id"),
            Some(&ResolvedValue::Scalar(json!(5)))
        );
    }
}
