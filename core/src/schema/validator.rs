#![deny(missing_docs)]

//! # Schema Validation
//!
//! Recursive structural validation of JSON values against a [`Schema`].
//!
//! Precedence at every node: resolve `$ref`, then merge and check `allOf`,
//! then delegate `oneOf` / `anyOf` to the composer, then perform the
//! primitive / object / array / enum check. Every violation is collected;
//! nothing short-circuits.

use crate::schema::composer::SchemaComposer;
use crate::schema::registry::SchemaRegistry;
use crate::schema::report::{join_field, join_index, ValidationResult, Violation, ViolationKind};
use crate::schema::{value_type_name, ObjectSchema, Schema, SchemaKind};
use indexmap::IndexSet;
use serde_json::Value;

/// Caller-selected validation behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Reject object properties that are not declared in `properties`.
    pub no_additional_properties: bool,
}

/// Validates values against schemas from one registry.
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator<'r> {
    registry: &'r SchemaRegistry,
    options: ValidationOptions,
}

impl<'r> SchemaValidator<'r> {
    /// Creates a validator with default (open-world) options.
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            options: ValidationOptions::default(),
        }
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates `value` against `schema`, returning every violation found.
    pub fn validate(&self, value: &Value, schema: &Schema) -> ValidationResult {
        let mut out = Vec::new();
        self.validate_at(value, schema, "", &IndexSet::new(), &IndexSet::new(), &mut out);
        ValidationResult::from_violations(out)
    }

    /// `visiting` holds the names resolved at this value's level and
    /// `declared` the property names declared by enclosing `allOf` siblings;
    /// both are reset whenever validation descends into a property or an
    /// array element.
    pub(crate) fn validate_at(
        &self,
        value: &Value,
        schema: &Schema,
        path: &str,
        visiting: &IndexSet<String>,
        declared: &IndexSet<String>,
        out: &mut Vec<Violation>,
    ) {
        if value.is_null() && schema.nullable {
            return;
        }

        let resolved = match self.registry.resolve_tracked(schema, visiting) {
            Ok(resolved) => resolved,
            Err(e) => {
                out.push(schema_error(path, e.to_string()));
                return;
            }
        };
        let schema = resolved.schema.as_ref();
        let visiting = &resolved.visiting;

        if value.is_null() && schema.nullable {
            return;
        }

        let composer = SchemaComposer::new(self.registry).with_options(self.options);
        match &schema.kind {
            SchemaKind::Any => {}
            // resolve_tracked never returns a ref
            SchemaKind::Ref(_) => {}
            SchemaKind::AllOf(branches) => match composer.merge_partial(branches, visiting) {
                Ok(merged) => {
                    let mut declared = declared.clone();
                    self.collect_properties(&merged.merged, visiting, &mut declared);
                    for branch in &merged.residual {
                        self.collect_properties(branch, visiting, &mut declared);
                    }
                    self.validate_at(value, &merged.merged, path, visiting, &declared, out);
                    for branch in &merged.residual {
                        self.validate_at(value, branch, path, visiting, &declared, out);
                    }
                }
                Err(e) => out.push(schema_error(path, e.to_string())),
            },
            SchemaKind::OneOf(branches) => {
                out.extend(composer.one_of_at(value, branches, path, visiting, declared));
            }
            SchemaKind::AnyOf(branches) => {
                out.extend(composer.any_of_at(value, branches, path, visiting, declared));
            }
            SchemaKind::Primitive(ty) => {
                if !ty.matches(value) {
                    out.push(type_mismatch(path, ty.as_str(), value));
                }
            }
            SchemaKind::Enum { ty, values } => {
                if let Some(ty) = ty.filter(|t| !t.matches(value)) {
                    out.push(type_mismatch(path, ty.as_str(), value));
                } else if !values.iter().any(|v| json_equal(v, value)) {
                    out.push(Violation::error(
                        path,
                        ViolationKind::NotInEnum {
                            value: value.clone(),
                            allowed: values.clone(),
                        },
                    ));
                }
            }
            SchemaKind::Object(obj) => self.validate_object(value, obj, path, declared, out),
            SchemaKind::Array(items) => {
                let Value::Array(elements) = value else {
                    out.push(type_mismatch(path, "array", value));
                    return;
                };
                if let Some(items) = items {
                    for (i, element) in elements.iter().enumerate() {
                        let at = join_index(path, i);
                        self.validate_at(element, items, &at, &IndexSet::new(), &IndexSet::new(), out);
                    }
                }
            }
        }
    }

    /// Adds the top-level property names `schema` declares, looking through
    /// references and compositions. Unresolvable references add nothing.
    fn collect_properties(
        &self,
        schema: &Schema,
        visiting: &IndexSet<String>,
        names: &mut IndexSet<String>,
    ) {
        let Ok(resolved) = self.registry.resolve_tracked(schema, visiting) else {
            return;
        };
        match &resolved.schema.kind {
            SchemaKind::Object(obj) => names.extend(obj.properties.keys().cloned()),
            SchemaKind::AllOf(branches)
            | SchemaKind::OneOf(branches)
            | SchemaKind::AnyOf(branches) => {
                for branch in branches {
                    self.collect_properties(branch, &resolved.visiting, names);
                }
            }
            _ => {}
        }
    }

    fn validate_object(
        &self,
        value: &Value,
        obj: &ObjectSchema,
        path: &str,
        declared: &IndexSet<String>,
        out: &mut Vec<Violation>,
    ) {
        let Value::Object(map) = value else {
            out.push(type_mismatch(path, "object", value));
            return;
        };

        for name in &obj.required {
            if !map.contains_key(name) {
                out.push(Violation::error(
                    path,
                    ViolationKind::MissingRequired { name: name.clone() },
                ));
            }
        }

        for (name, field) in map {
            match obj.properties.get(name) {
                Some(schema) => {
                    let at = join_field(path, name);
                    self.validate_at(field, schema, &at, &IndexSet::new(), &IndexSet::new(), out)
                }
                None if self.options.no_additional_properties && !declared.contains(name) => {
                    out.push(Violation::error(
                        path,
                        ViolationKind::AdditionalProperty { name: name.clone() },
                    ))
                }
                None => {}
            }
        }
    }
}

fn type_mismatch(path: &str, expected: &str, value: &Value) -> Violation {
    Violation::error(
        path,
        ViolationKind::TypeMismatch {
            expected: expected.to_string(),
            found: value_type_name(value).to_string(),
        },
    )
}

fn schema_error(path: &str, message: String) -> Violation {
    Violation::error(path, ViolationKind::SchemaError { message })
}

/// JSON equality where numbers compare by value (`1` equals `1.0`).
pub(crate) fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| json_equal(v, other)))
        }
        _ => a == b,
    }
}
