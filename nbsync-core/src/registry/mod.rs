//! Declarative resource schemas.
//!
//! Every resource type the engine can converge is described here: where it
//! lives in the API, which fields identify it, which fields it accepts and how
//! each field's value must be resolved. The engine itself has no per-resource
//! code.

mod resources;

use std::collections::BTreeMap;

use crate::model::TargetState;

/// Endpoint holding custom field definitions.
pub const CUSTOM_FIELDS_ENDPOINT: &str = "extras/custom-fields";

/// How a field's raw value is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
    /// Free-form mapping compared as a whole (e.g. data source parameters).
    Mapping,
    /// Name, id or nested spec of an object of another resource type.
    Reference {
        target: &'static str,
        /// Whether a missing target may be created from its name alone.
        creatable: bool,
    },
    /// Reference whose target resource type is given by another field.
    ScopedReference { type_field: &'static str },
    List {
        item: Box<FieldKind>,
        order: ListOrder,
    },
    CustomFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    Sequence,
    Set,
}

/// One accepted field of a resource.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Attribute name on the API side.
    pub api_name: &'static str,
    pub kind: FieldKind,
    pub choices: &'static [&'static str],
}

impl FieldSpec {
    fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            api_name: name,
            kind,
            choices: &[],
        }
    }

    pub fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn integer(name: &'static str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn mapping(name: &'static str) -> Self {
        Self::new(name, FieldKind::Mapping)
    }

    pub fn reference(name: &'static str, target: &'static str) -> Self {
        Self::new(
            name,
            FieldKind::Reference {
                target,
                creatable: false,
            },
        )
    }

    pub fn scoped(name: &'static str, type_field: &'static str) -> Self {
        Self::new(name, FieldKind::ScopedReference { type_field })
    }

    pub fn sequence(name: &'static str, item: FieldKind) -> Self {
        Self::new(
            name,
            FieldKind::List {
                item: Box::new(item),
                order: ListOrder::Sequence,
            },
        )
    }

    /// `tags`: an unordered set of tag references.
    pub fn tags() -> Self {
        Self::new(
            "tags",
            FieldKind::List {
                item: Box::new(FieldKind::Reference {
                    target: "tag",
                    creatable: true,
                }),
                order: ListOrder::Set,
            },
        )
    }

    pub fn custom_fields() -> Self {
        Self::new("custom_fields", FieldKind::CustomFields)
    }

    pub fn api(mut self, api_name: &'static str) -> Self {
        self.api_name = api_name;
        self
    }

    pub fn choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }

    /// Allow name-only creation of a missing reference target.
    pub fn creatable(mut self) -> Self {
        if let FieldKind::Reference { creatable, .. } = &mut self.kind {
            *creatable = true;
        }
        self
    }
}

/// Schema of one resource type.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub name: &'static str,
    /// API path relative to `/api/`, e.g. `tenancy/contacts`.
    pub endpoint: &'static str,
    /// Content type used to scope custom field definitions.
    pub object_type: &'static str,
    /// Fields identifying an existing object. Empty means never looked up.
    pub natural_key: &'static [&'static str],
    /// API attributes tried in order when this resource is referenced by a name.
    pub lookup_keys: &'static [&'static str],
    pub states: &'static [TargetState],
    pub fields: Vec<FieldSpec>,
    pub required: Vec<(TargetState, &'static [&'static str])>,
    pub required_together: Vec<&'static [&'static str]>,
    /// Field a missing `slug` is derived from on create.
    pub slug_source: Option<&'static str>,
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn supports(&self, state: TargetState) -> bool {
        self.states.contains(&state)
    }

    pub fn required_for(&self, state: TargetState) -> &[&'static str] {
        self.required
            .iter()
            .find(|(s, _)| *s == state)
            .map(|(_, fields)| *fields)
            .unwrap_or(&[])
    }
}

/// Lookup table from resource type name to schema.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    resources: BTreeMap<&'static str, ResourceSchema>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every resource type nbsync knows about.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for schema in resources::all() {
            registry.register(schema);
        }
        registry
    }

    pub fn register(&mut self, schema: ResourceSchema) {
        self.resources.insert(schema.name, schema);
    }

    pub fn get(&self, name: &str) -> Option<&ResourceSchema> {
        self.resources.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceSchema> {
        self.resources.values()
    }

    /// Resource type selected by a `scope_type` value such as `dcim.site`.
    pub fn scope_target(&self, scope_type: &str) -> Option<&ResourceSchema> {
        resources::SCOPE_TYPES
            .iter()
            .find(|(t, _)| *t == scope_type)
            .and_then(|(_, name)| self.get(name))
    }
}

/// Slug the way NetBox tooling derives it from a name.
pub fn slugify(value: &str) -> String {
    let kept: String = value
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || *c == '.' || c.is_whitespace())
        .collect();
    let kept = kept.trim();

    let mut slug = String::with_capacity(kept.len());
    let mut in_separator = false;
    for c in kept.chars() {
        if c == '-' || c == '.' || c.is_whitespace() {
            if !in_separator {
                slug.push('-');
                in_separator = true;
            }
        } else {
            slug.extend(c.to_lowercase());
            in_separator = false;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Contact Group One"), "contact-group-one");
        assert_eq!(slugify("AWS data source!"), "aws-data-source");
        assert_eq!(slugify("a . b -- c"), "a-b-c");
        assert_eq!(slugify("Core_Switch"), "core_switch");
        assert_eq!(slugify("  Edge Router  "), "edge-router");
    }

    #[test]
    fn test_builtin_has_core_resources() {
        let registry = Registry::builtin();
        for name in ["contact", "data_source", "journal_entry", "rack_reservation"] {
            assert!(registry.get(name).is_some(), "missing {}", name);
        }

        let reservation = registry.get("rack_reservation").unwrap();
        assert_eq!(reservation.natural_key, &["rack", "description"]);
        assert_eq!(reservation.lookup_keys, &["id"]);

        let journal = registry.get("journal_entry").unwrap();
        assert!(journal.natural_key.is_empty());
        assert!(journal.supports(TargetState::New));
        assert!(!journal.supports(TargetState::Present));
    }

    #[test]
    fn test_every_reference_target_is_registered() {
        let registry = Registry::builtin();
        for schema in registry.iter() {
            for field in &schema.fields {
                let target = match &field.kind {
                    FieldKind::Reference { target, .. } => Some(*target),
                    FieldKind::List { item, .. } => match item.as_ref() {
                        FieldKind::Reference { target, .. } => Some(*target),
                        _ => None,
                    },
                    _ => None,
                };
                if let Some(target) = target {
                    assert!(
                        registry.get(target).is_some(),
                        "{}.{} points at unknown {}",
                        schema.name,
                        field.name,
                        target
                    );
                }
            }
            for key in schema.natural_key {
                assert!(schema.field(key).is_some(), "{} key {}", schema.name, key);
            }
        }
    }

    #[test]
    fn test_scope_target() {
        let registry = Registry::builtin();
        assert_eq!(registry.scope_target("dcim.site").unwrap().name, "site");
        assert_eq!(
            registry.scope_target("dcim.sitegroup").unwrap().name,
            "site_group"
        );
        assert!(registry.scope_target("dcim.device").is_none());
    }
}
