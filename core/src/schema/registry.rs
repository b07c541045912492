#![deny(missing_docs)]

//! # Schema Registry
//!
//! Named schemas shared by every declaration of a run, with `$ref`
//! resolution and cycle detection.
//!
//! The registry is plain caller-owned state. Nothing clears it implicitly;
//! run orchestration calls [`SchemaRegistry::clear`] between independent runs.

use crate::error::{AppError, AppResult};
use crate::schema::composer::SchemaComposer;
use crate::schema::report::{join_field, join_index, ValidationResult, Violation, ViolationKind};
use crate::schema::{Schema, SchemaKind};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::borrow::Cow;
use tracing::debug;

/// A resolved schema plus the names walked through to reach it.
pub(crate) struct Resolved<'a> {
    /// The terminal, non-ref schema.
    pub schema: Cow<'a, Schema>,
    /// `visiting` extended with every name followed on the way.
    pub visiting: IndexSet<String>,
}

/// Maps schema names to definitions.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, Schema>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a schema under `name`. Re-registering a name overwrites it and
    /// returns the previous definition.
    pub fn register(&mut self, name: impl Into<String>, schema: Schema) -> Option<Schema> {
        let name = name.into();
        let previous = self.schemas.insert(name.clone(), schema);
        if previous.is_some() {
            debug!(schema = %name, "Schema re-registered, previous definition replaced");
        }
        previous
    }

    /// Parses a JSON-Schema style document and registers it.
    pub fn register_json(&mut self, name: impl Into<String>, raw: &Value) -> AppResult<()> {
        let name = name.into();
        let schema = Schema::from_json(raw)
            .map_err(|e| AppError::InvalidSchema(format!("schema '{}': {}", name, e)))?;
        self.register(name, schema);
        Ok(())
    }

    /// Looks up a schema by name.
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Empties the registry.
    pub fn clear(&mut self) {
        self.schemas.clear();
    }

    /// Follows `$ref` links until a non-ref schema is reached.
    ///
    /// A schema without a `ref` is returned unchanged. Fails with
    /// `UnknownSchemaRef` for unregistered names and with `CyclicSchemaRef`
    /// when the chain revisits a name in `visiting` or one it already followed.
    /// A `nullable` flag on any ref node along the chain carries over to the
    /// result.
    pub fn resolve<'a>(
        &'a self,
        schema: &'a Schema,
        visiting: &IndexSet<String>,
    ) -> AppResult<Cow<'a, Schema>> {
        self.resolve_tracked(schema, visiting).map(|r| r.schema)
    }

    /// Resolves a registered name to its terminal schema.
    pub fn resolve_name(&self, name: &str) -> AppResult<Cow<'_, Schema>> {
        let schema = self
            .get(name)
            .ok_or_else(|| AppError::UnknownSchemaRef(name.to_string()))?;
        let mut visiting = IndexSet::new();
        visiting.insert(name.to_string());
        self.resolve(schema, &visiting)
    }

    pub(crate) fn resolve_tracked<'a>(
        &'a self,
        schema: &'a Schema,
        visiting: &IndexSet<String>,
    ) -> AppResult<Resolved<'a>> {
        let mut walked = visiting.clone();
        let mut current = schema;
        let mut nullable = false;

        while let SchemaKind::Ref(name) = &current.kind {
            nullable |= current.nullable;
            if walked.contains(name) {
                let mut chain: Vec<String> = walked.iter().cloned().collect();
                chain.push(name.clone());
                return Err(AppError::CyclicSchemaRef(chain));
            }
            let target = self
                .schemas
                .get(name)
                .ok_or_else(|| AppError::UnknownSchemaRef(name.clone()))?;
            walked.insert(name.clone());
            current = target;
        }

        let schema = if nullable && !current.nullable {
            let mut owned = current.clone();
            owned.nullable = true;
            Cow::Owned(owned)
        } else {
            Cow::Borrowed(current)
        };

        Ok(Resolved {
            schema,
            visiting: walked,
        })
    }

    /// Checks every registered schema for authoring problems.
    ///
    /// Unresolvable or cyclic references and unmergeable `allOf` nodes are
    /// errors; `required` names without a property declaration are warnings.
    pub fn check(&self) -> ValidationResult {
        let mut out = Vec::new();
        for (name, schema) in &self.schemas {
            self.check_node(schema, name, &mut out);
        }
        ValidationResult::from_violations(out)
    }

    fn check_node(&self, schema: &Schema, path: &str, out: &mut Vec<Violation>) {
        match &schema.kind {
            SchemaKind::Ref(_) => {
                if let Err(e) = self.resolve(schema, &IndexSet::new()) {
                    out.push(schema_error(path, &e));
                }
            }
            SchemaKind::AllOf(branches) => {
                if let Err(e) = SchemaComposer::new(self).merge_partial(branches, &IndexSet::new())
                {
                    out.push(schema_error(path, &e));
                }
                for (i, branch) in branches.iter().enumerate() {
                    self.check_node(branch, &join_index(path, i), out);
                }
            }
            SchemaKind::OneOf(branches) | SchemaKind::AnyOf(branches) => {
                for (i, branch) in branches.iter().enumerate() {
                    self.check_node(branch, &join_index(path, i), out);
                }
            }
            SchemaKind::Object(obj) => {
                for name in &obj.required {
                    if !obj.properties.contains_key(name) {
                        out.push(Violation::warning(
                            path,
                            ViolationKind::UndeclaredRequired { name: name.clone() },
                        ));
                    }
                }
                for (prop, child) in &obj.properties {
                    self.check_node(child, &join_field(path, prop), out);
                }
            }
            SchemaKind::Array(Some(items)) => {
                self.check_node(items, &format!("{}[]", path), out);
            }
            SchemaKind::Array(None)
            | SchemaKind::Any
            | SchemaKind::Primitive(_)
            | SchemaKind::Enum { .. } => {}
        }
    }
}

fn schema_error(path: &str, err: &AppError) -> Violation {
    Violation::error(
        path,
        ViolationKind::SchemaError {
            message: err.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_overwrites() {
        let mut registry = SchemaRegistry::new();
        assert!(registry.register("Pet", Schema::string()).is_none());
        let previous = registry.register("Pet", Schema::integer());
        assert_eq!(previous, Some(Schema::string()));
        assert_eq!(registry.get("Pet"), Some(&Schema::integer()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_passthrough_without_ref() {
        let registry = SchemaRegistry::new();
        let schema = Schema::boolean();
        let resolved = registry.resolve(&schema, &IndexSet::new()).unwrap();
        assert_eq!(resolved.as_ref(), &schema);
    }

    #[test]
    fn test_resolve_chain_to_terminal() {
        let mut registry = SchemaRegistry::new();
        registry.register("A", Schema::reference("B"));
        registry.register("B", Schema::reference("C"));
        registry.register("C", Schema::object().required_property("id", Schema::integer()));

        let start = Schema::reference("A");
        let resolved = registry.resolve(&start, &IndexSet::new()).unwrap();
        assert_eq!(
            resolved.as_ref(),
            &Schema::object().required_property("id", Schema::integer())
        );
    }

    #[test]
    fn test_resolve_self_reference_is_cycle() {
        let mut registry = SchemaRegistry::new();
        registry.register("Loop", Schema::reference("Loop"));
        let err = registry
            .resolve(&Schema::reference("Loop"), &IndexSet::new())
            .unwrap_err();
        assert!(matches!(err, AppError::CyclicSchemaRef(ref chain) if chain == &["Loop", "Loop"]));
    }

    #[test]
    fn test_resolve_longer_cycle_names_chain() {
        let mut registry = SchemaRegistry::new();
        registry.register("A", Schema::reference("B"));
        registry.register("B", Schema::reference("A"));
        let err = registry.resolve_name("A").unwrap_err();
        assert_eq!(format!("{err}"), "Cyclic schema reference: A -> B -> A");
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = SchemaRegistry::new();
        let err = registry
            .resolve(&Schema::reference("Ghost"), &IndexSet::new())
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownSchemaRef(name) if name == "Ghost"));
    }

    #[test]
    fn test_nullable_ref_carries_over() {
        let mut registry = SchemaRegistry::new();
        registry.register("Name", Schema::string());
        let schema = Schema::reference("Name").nullable();
        let resolved = registry.resolve(&schema, &IndexSet::new()).unwrap();
        assert!(resolved.nullable);
        assert!(!registry.get("Name").unwrap().nullable);
    }

    #[test]
    fn test_clear_empties() {
        let mut registry = SchemaRegistry::new();
        registry.register("A", Schema::string());
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_check_reports_authoring_problems() {
        let mut registry = SchemaRegistry::new();
        registry
            .register_json(
                "User",
                &json!({
                    "type": "object",
                    "required": ["id", "ghost"],
                    "properties": {
                        "id": {"type": "integer"},
                        "team": {"$ref": "#/components/schemas/Team"}
                    }
                }),
            )
            .unwrap();
        registry.register(
            "Broken",
            Schema::all_of(vec![Schema::string(), Schema::integer()]),
        );

        let result = registry.check();
        assert!(!result.valid);
        let messages = result.messages();
        assert!(messages
            .iter()
            .any(|m| m == "warning: User: required property 'ghost' is not declared in properties"));
        assert!(messages
            .iter()
            .any(|m| m.starts_with("User.team:") && m.contains("Unknown schema reference 'Team'")));
        assert!(messages
            .iter()
            .any(|m| m.starts_with("Broken:") && m.contains("Incompatible allOf")));
    }
}
