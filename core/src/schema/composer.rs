#![deny(missing_docs)]

//! # Schema Composition
//!
//! Structural merging of `allOf` branches and branch selection for
//! `oneOf` / `anyOf`.
//!
//! Merging only detects structural conflicts (two different types, an object
//! against an array, disjoint enums). It does not try to prove that the merged
//! schema is satisfiable.

use crate::error::{AppError, AppResult};
use crate::schema::registry::SchemaRegistry;
use crate::schema::report::{ValidationResult, Violation, ViolationKind};
use crate::schema::validator::{json_equal, SchemaValidator, ValidationOptions};
use crate::schema::{ObjectSchema, PrimitiveType, Schema, SchemaKind};
use indexmap::IndexSet;
use serde_json::Value;

/// Result of merging `allOf` branches.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MergedAllOf {
    /// Union of every structural branch.
    pub merged: Schema,
    /// `oneOf` / `anyOf` branches that cannot be folded in and must be checked
    /// separately.
    pub residual: Vec<Schema>,
}

/// Merges and selects between composed schemas.
#[derive(Debug, Clone, Copy)]
pub struct SchemaComposer<'r> {
    registry: &'r SchemaRegistry,
    options: ValidationOptions,
}

impl<'r> SchemaComposer<'r> {
    /// Creates a composer resolving references against `registry`.
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            options: ValidationOptions::default(),
        }
    }

    /// Sets the options used when validating branches.
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Merges `allOf` branches into one effective schema.
    ///
    /// Top-level `$ref` branches are resolved first. Properties are unioned
    /// (same-name properties merge recursively), `required` sets are unioned.
    /// Conflicting types fail with `IncompatibleAllOf`, as do `oneOf` / `anyOf`
    /// branches, which have no single structural form.
    pub fn merge_all_of(&self, schemas: &[Schema]) -> AppResult<Schema> {
        let MergedAllOf { merged, residual } = self.merge_partial(schemas, &IndexSet::new())?;
        if let Some(first) = residual.first() {
            return Err(AppError::IncompatibleAllOf(format!(
                "{} branch cannot be merged into a single schema",
                first.kind.label()
            )));
        }
        Ok(merged)
    }

    /// Validates that `value` matches exactly one branch.
    pub fn validate_one_of(&self, value: &Value, schemas: &[Schema]) -> ValidationResult {
        let none = IndexSet::new();
        ValidationResult::from_violations(self.one_of_at(value, schemas, "", &none, &none))
    }

    /// Validates that `value` matches at least one branch.
    pub fn validate_any_of(&self, value: &Value, schemas: &[Schema]) -> ValidationResult {
        let none = IndexSet::new();
        ValidationResult::from_violations(self.any_of_at(value, schemas, "", &none, &none))
    }

    pub(crate) fn one_of_at(
        &self,
        value: &Value,
        schemas: &[Schema],
        path: &str,
        visiting: &IndexSet<String>,
        declared: &IndexSet<String>,
    ) -> Vec<Violation> {
        let matched = self.matching_branches(value, schemas, path, visiting, declared);
        match matched.len() {
            1 => Vec::new(),
            0 => vec![Violation::error(
                path,
                ViolationKind::NoMatchingBranch {
                    keyword: "oneOf".into(),
                    branches: schemas.len(),
                },
            )],
            _ => vec![Violation::error(
                path,
                ViolationKind::AmbiguousOneOf { matched },
            )],
        }
    }

    pub(crate) fn any_of_at(
        &self,
        value: &Value,
        schemas: &[Schema],
        path: &str,
        visiting: &IndexSet<String>,
        declared: &IndexSet<String>,
    ) -> Vec<Violation> {
        if self.matching_branches(value, schemas, path, visiting, declared).is_empty() {
            vec![Violation::error(
                path,
                ViolationKind::NoMatchingBranch {
                    keyword: "anyOf".into(),
                    branches: schemas.len(),
                },
            )]
        } else {
            Vec::new()
        }
    }

    fn matching_branches(
        &self,
        value: &Value,
        schemas: &[Schema],
        path: &str,
        visiting: &IndexSet<String>,
        declared: &IndexSet<String>,
    ) -> Vec<usize> {
        let validator = SchemaValidator::new(self.registry).with_options(self.options);
        schemas
            .iter()
            .enumerate()
            .filter(|(_, branch)| {
                let mut found = Vec::new();
                validator.validate_at(value, branch, path, visiting, declared, &mut found);
                !found.iter().any(Violation::is_error)
            })
            .map(|(i, _)| i)
            .collect()
    }

    pub(crate) fn merge_partial(
        &self,
        schemas: &[Schema],
        visiting: &IndexSet<String>,
    ) -> AppResult<MergedAllOf> {
        let mut merged = Schema::any();
        let mut residual = Vec::new();

        for branch in schemas {
            let resolved = self.registry.resolve_tracked(branch, visiting)?;
            let branch = resolved.schema.into_owned();
            match branch.kind {
                SchemaKind::AllOf(ref inner) => {
                    let nested = self.merge_partial(inner, &resolved.visiting)?;
                    let mut nested_merged = nested.merged;
                    nested_merged.nullable |= branch.nullable;
                    merged = merge_pair(merged, nested_merged, "")?;
                    residual.extend(nested.residual);
                }
                SchemaKind::OneOf(_) | SchemaKind::AnyOf(_) => residual.push(branch),
                _ => merged = merge_pair(merged, branch, "")?,
            }
        }

        Ok(MergedAllOf { merged, residual })
    }
}

fn accepts_null(schema: &Schema) -> bool {
    schema.nullable || matches!(schema.kind, SchemaKind::Any)
}

fn conflict(at: &str, detail: String) -> AppError {
    if at.is_empty() {
        AppError::IncompatibleAllOf(detail)
    } else {
        AppError::IncompatibleAllOf(format!("at '{}': {}", at, detail))
    }
}

/// Merges two schemas that must both hold.
fn merge_pair(a: Schema, b: Schema, at: &str) -> AppResult<Schema> {
    let nullable = accepts_null(&a) && accepts_null(&b);
    let description = a.description.clone().or_else(|| b.description.clone());
    let format = a.format.clone().or_else(|| b.format.clone());
    let example = a.example.clone().or_else(|| b.example.clone());

    let kind = match (a.kind, b.kind) {
        (SchemaKind::Any, kind) | (kind, SchemaKind::Any) => kind,
        (SchemaKind::Ref(x), SchemaKind::Ref(y)) if x == y => SchemaKind::Ref(x),
        // Deferred: references below the top level stay lazy so recursive
        // schemas merge without unrolling.
        (left, right)
            if is_deferred(&left) || is_deferred(&right) =>
        {
            let mut branches = Vec::new();
            for kind in [left, right] {
                match kind {
                    SchemaKind::AllOf(inner) => branches.extend(inner),
                    other => branches.push(Schema::from_kind(other)),
                }
            }
            SchemaKind::AllOf(branches)
        }
        (SchemaKind::Primitive(p), SchemaKind::Primitive(q)) => {
            SchemaKind::Primitive(merge_primitive(p, q, at)?)
        }
        (SchemaKind::Object(left), SchemaKind::Object(right)) => {
            SchemaKind::Object(merge_objects(left, right, at)?)
        }
        (SchemaKind::Array(left), SchemaKind::Array(right)) => {
            let items = match (left, right) {
                (None, items) | (items, None) => items,
                (Some(l), Some(r)) => Some(Box::new(merge_pair(*l, *r, &format!("{}[]", at))?)),
            };
            SchemaKind::Array(items)
        }
        (
            SchemaKind::Enum {
                ty: left_ty,
                values: left,
            },
            SchemaKind::Enum {
                ty: right_ty,
                values: right,
            },
        ) => {
            let ty = match (left_ty, right_ty) {
                (Some(p), Some(q)) => Some(merge_primitive(p, q, at)?),
                (ty, None) | (None, ty) => ty,
            };
            let values: Vec<Value> = left
                .into_iter()
                .filter(|v| right.iter().any(|r| json_equal(v, r)))
                .collect();
            enum_kind(ty, values, at)?
        }
        (SchemaKind::Enum { ty, values }, SchemaKind::Primitive(p))
        | (SchemaKind::Primitive(p), SchemaKind::Enum { ty, values }) => {
            let ty = match ty {
                Some(t) => merge_primitive(t, p, at)?,
                None => p,
            };
            let values = values.into_iter().filter(|v| ty.matches(v)).collect();
            enum_kind(Some(ty), values, at)?
        }
        (left, right) => {
            return Err(conflict(
                at,
                format!("{} conflicts with {}", left.label(), right.label()),
            ))
        }
    };

    Ok(Schema {
        kind,
        nullable,
        description,
        format,
        example,
    })
}

fn is_deferred(kind: &SchemaKind) -> bool {
    matches!(
        kind,
        SchemaKind::Ref(_) | SchemaKind::AllOf(_) | SchemaKind::OneOf(_) | SchemaKind::AnyOf(_)
    )
}

fn enum_kind(ty: Option<PrimitiveType>, values: Vec<Value>, at: &str) -> AppResult<SchemaKind> {
    if values.is_empty() {
        return Err(conflict(at, "enum branches share no common value".into()));
    }
    Ok(SchemaKind::Enum { ty, values })
}

fn merge_primitive(p: PrimitiveType, q: PrimitiveType, at: &str) -> AppResult<PrimitiveType> {
    match (p, q) {
        (p, q) if p == q => Ok(p),
        (PrimitiveType::Integer, PrimitiveType::Number)
        | (PrimitiveType::Number, PrimitiveType::Integer) => Ok(PrimitiveType::Integer),
        (p, q) => Err(conflict(at, format!("type '{}' conflicts with '{}'", p, q))),
    }
}

fn merge_objects(mut left: ObjectSchema, right: ObjectSchema, at: &str) -> AppResult<ObjectSchema> {
    for (name, schema) in right.properties {
        let merged = match left.properties.shift_remove(&name) {
            Some(existing) => {
                let nested = if at.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", at, name)
                };
                merge_pair(existing, schema, &nested)?
            }
            None => schema,
        };
        left.properties.insert(name, merged);
    }
    left.required.extend(right.required);
    Ok(left)
}
