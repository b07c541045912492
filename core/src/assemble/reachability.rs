//! # Reachability
//!
//! Collects every registered schema reachable from a set of root schemas by
//! walking `allOf`/`oneOf`/`anyOf`/`items`/`properties`/`$ref`, checking each
//! node for authoring errors on the way.

use crate::error::{AppError, AppResult};
use crate::schema::composer::SchemaComposer;
use crate::schema::{Schema, SchemaKind, SchemaRegistry};
use indexmap::IndexSet;
use std::collections::BTreeSet;

/// Walks schemas and records the registered names they reach.
pub(crate) struct ReachabilityWalk<'r> {
    registry: &'r SchemaRegistry,
    reached: BTreeSet<String>,
}

impl<'r> ReachabilityWalk<'r> {
    pub(crate) fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            reached: BTreeSet::new(),
        }
    }

    /// Visits one root schema.
    ///
    /// Fails on unknown or purely cyclic references and on `allOf` nodes that
    /// cannot be merged.
    pub(crate) fn visit(&mut self, schema: &Schema) -> AppResult<()> {
        match &schema.kind {
            SchemaKind::Ref(name) => {
                if self.reached.contains(name) {
                    return Ok(());
                }
                let target = self
                    .registry
                    .get(name)
                    .ok_or_else(|| AppError::UnknownSchemaRef(name.clone()))?;
                self.registry.resolve_name(name)?;
                self.reached.insert(name.clone());
                self.visit(target).map_err(|e| within_schema(name, e))
            }
            SchemaKind::AllOf(branches) => {
                SchemaComposer::new(self.registry).merge_partial(branches, &IndexSet::new())?;
                branches.iter().try_for_each(|b| self.visit(b))
            }
            _ => schema.children().into_iter().try_for_each(|c| self.visit(c)),
        }
    }

    /// Names reached so far, sorted.
    pub(crate) fn finish(self) -> BTreeSet<String> {
        self.reached
    }
}

fn within_schema(name: &str, err: AppError) -> AppError {
    match err {
        AppError::IncompatibleAllOf(msg) if !msg.starts_with("in schema") => {
            AppError::IncompatibleAllOf(format!("in schema '{}': {}", name, msg))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.register(
            "Pet",
            Schema::object()
                .required_property("id", Schema::integer())
                .property("owner", Schema::reference("Owner"))
                .property("tags", Schema::array(Schema::reference("Tag"))),
        );
        registry.register(
            "Owner",
            Schema::object().property("pets", Schema::array(Schema::reference("Pet"))),
        );
        registry.register("Tag", Schema::string());
        registry.register("Unused", Schema::boolean());
        registry
    }

    #[test]
    fn test_walks_transitively_and_tolerates_recursion() {
        let registry = registry();
        let mut walk = ReachabilityWalk::new(&registry);
        walk.visit(&Schema::array(Schema::reference("Pet"))).unwrap();
        let names: Vec<String> = walk.finish().into_iter().collect();
        assert_eq!(names, vec!["Owner", "Pet", "Tag"]);
    }

    #[test]
    fn test_composition_branches_are_walked() {
        let registry = registry();
        let mut walk = ReachabilityWalk::new(&registry);
        walk.visit(&Schema::one_of(vec![
            Schema::reference("Tag"),
            Schema::any_of(vec![Schema::reference("Unused")]),
        ]))
        .unwrap();
        assert_eq!(walk.finish().len(), 2);
    }

    #[test]
    fn test_unknown_and_cyclic_refs_fail() {
        let mut registry = registry();
        registry.register("A", Schema::reference("B"));
        registry.register("B", Schema::reference("A"));

        let mut walk = ReachabilityWalk::new(&registry);
        assert!(matches!(
            walk.visit(&Schema::reference("Ghost")),
            Err(AppError::UnknownSchemaRef(name)) if name == "Ghost"
        ));
        assert!(matches!(
            walk.visit(&Schema::reference("A")),
            Err(AppError::CyclicSchemaRef(_))
        ));
    }

    #[test]
    fn test_incompatible_all_of_names_schema() {
        let mut registry = SchemaRegistry::new();
        registry.register(
            "Broken",
            Schema::all_of(vec![Schema::string(), Schema::integer()]),
        );
        let err = ReachabilityWalk::new(&registry)
            .visit(&Schema::reference("Broken"))
            .unwrap_err();
        assert!(err.to_string().starts_with("Incompatible allOf: in schema 'Broken':"));
    }
}
