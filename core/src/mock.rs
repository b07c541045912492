#![deny(missing_docs)]

//! # Mock Examples
//!
//! Synthesizes example values from schemas, for mock servers and generated
//! request fixtures.
//!
//! Precedence per node: explicit `example`, first `enum` member, then a
//! placeholder for the declared type. Recursive references stop at the first
//! revisit: optional properties are skipped, everything else becomes `null`.

use crate::declare::OperationRecord;
use crate::schema::composer::SchemaComposer;
use crate::schema::{PrimitiveType, Schema, SchemaKind, SchemaRegistry};
use indexmap::IndexSet;
use serde_json::{json, Map, Value};

/// Builds an example value for `schema`.
pub fn synthesize_example(schema: &Schema, registry: &SchemaRegistry) -> Value {
    Synthesizer { registry }.value(schema, &IndexSet::new())
}

/// Example body for the response `record` declares for `status`.
///
/// Prefers `application/json`, then the first declared media type. `None`
/// when no response matches or it has no content.
pub fn example_response(
    record: &OperationRecord,
    status: u16,
    registry: &SchemaRegistry,
) -> Option<Value> {
    let spec = record.response_for(status)?;
    let schema = spec
        .content
        .get("application/json")
        .or_else(|| spec.content.values().next())?;
    Some(synthesize_example(schema, registry))
}

struct Synthesizer<'r> {
    registry: &'r SchemaRegistry,
}

impl Synthesizer<'_> {
    fn value(&self, schema: &Schema, visiting: &IndexSet<String>) -> Value {
        if let Some(example) = &schema.example {
            return example.clone();
        }
        match &schema.kind {
            SchemaKind::Any => json!({}),
            SchemaKind::Ref(name) => {
                if visiting.contains(name) {
                    return Value::Null;
                }
                let Some(target) = self.registry.get(name) else {
                    return Value::Null;
                };
                let mut visiting = visiting.clone();
                visiting.insert(name.clone());
                self.value(target, &visiting)
            }
            SchemaKind::Primitive(ty) => placeholder(*ty, schema.format.as_deref()),
            SchemaKind::Enum { values, .. } => values.first().cloned().unwrap_or(Value::Null),
            SchemaKind::Object(obj) => {
                let mut map = Map::new();
                for (name, prop) in &obj.properties {
                    let recursive = prop.ref_name().is_some_and(|r| visiting.contains(r));
                    if recursive && !obj.required.contains(name) {
                        continue;
                    }
                    map.insert(name.clone(), self.value(prop, visiting));
                }
                Value::Object(map)
            }
            SchemaKind::Array(items) => match items {
                Some(items) if items.ref_name().is_some_and(|r| visiting.contains(r)) => json!([]),
                Some(items) => json!([self.value(items, visiting)]),
                None => json!([]),
            },
            SchemaKind::AllOf(branches) => {
                match SchemaComposer::new(self.registry).merge_partial(branches, visiting) {
                    Ok(merged) => {
                        let mut value = self.value(&merged.merged, visiting);
                        for branch in &merged.residual {
                            fold_object(&mut value, self.value(branch, visiting));
                        }
                        value
                    }
                    Err(_) => branches
                        .first()
                        .map_or(Value::Null, |b| self.value(b, visiting)),
                }
            }
            SchemaKind::OneOf(branches) | SchemaKind::AnyOf(branches) => branches
                .first()
                .map_or(Value::Null, |b| self.value(b, visiting)),
        }
    }
}

/// Adds the fields of `extra` that `base` lacks. Non-objects are left alone,
/// except an empty `{}` base, which takes `extra` wholesale.
fn fold_object(base: &mut Value, extra: Value) {
    match (base, extra) {
        (Value::Object(base), Value::Object(extra)) => {
            for (name, field) in extra {
                base.entry(name).or_insert(field);
            }
        }
        (base, extra) if base.as_object().is_some_and(Map::is_empty) => *base = extra,
        _ => {}
    }
}

fn placeholder(ty: PrimitiveType, format: Option<&str>) -> Value {
    match ty {
        PrimitiveType::String => json!(match format {
            Some("date-time") => "1970-01-01T00:00:00Z",
            Some("date") => "1970-01-01",
            Some("time") => "00:00:00",
            Some("email") => "user@example.com",
            Some("uuid") => "00000000-0000-0000-0000-000000000000",
            Some("uri") | Some("url") => "https://example.com",
            Some("ipv4") => "127.0.0.1",
            Some("ipv6") => "::1",
            Some("byte") => "ZHVtbXk=",
            _ => "string",
        }),
        PrimitiveType::Integer => json!(0),
        PrimitiveType::Number => json!(0.0),
        PrimitiveType::Boolean => json!(true),
        PrimitiveType::Null => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::{HttpMethod, ResponseSpec, StatusKey};
    use crate::schema::SchemaValidator;
    use std::collections::BTreeMap;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.register(
            "Pet",
            Schema::object()
                .required_property("id", Schema::integer().with_example(json!(42)))
                .required_property("born", Schema::string().with_format("date"))
                .property(
                    "kind",
                    Schema::enumeration([json!("cat"), json!("dog")]),
                )
                .property("parent", Schema::reference("Pet"))
                .property("children", Schema::array(Schema::reference("Pet"))),
        );
        registry
    }

    #[test]
    fn test_object_example() {
        let registry = registry();
        let value = synthesize_example(&Schema::reference("Pet"), &registry);
        assert_eq!(
            value,
            json!({"id": 42, "born": "1970-01-01", "kind": "cat", "children": []})
        );
        assert!(
            SchemaValidator::new(&registry)
                .validate(&value, &Schema::reference("Pet"))
                .valid
        );
    }

    #[test]
    fn test_composition_examples() {
        let registry = registry();
        let merged = Schema::all_of(vec![
            Schema::object().required_property("a", Schema::boolean()),
            Schema::object().required_property("b", Schema::number()),
        ]);
        assert_eq!(
            synthesize_example(&merged, &registry),
            json!({"a": true, "b": 0.0})
        );
        let choice = Schema::one_of(vec![Schema::string().with_format("uuid"), Schema::integer()]);
        assert_eq!(
            synthesize_example(&choice, &registry),
            json!("00000000-0000-0000-0000-000000000000")
        );
    }

    #[test]
    fn test_all_of_folds_first_choice_branch() {
        let registry = registry();
        let schema = Schema::from_json(&json!({
            "type": "object",
            "properties": {"kind": {"type": "string", "enum": ["card"]}},
            "oneOf": [
                {"properties": {"number": {"type": "string"}}, "required": ["number"]},
                {"properties": {"iban": {"type": "string"}}, "required": ["iban"]}
            ]
        }))
        .unwrap();
        let value = synthesize_example(&schema, &registry);
        assert_eq!(value, json!({"kind": "card", "number": "string"}));
        assert!(SchemaValidator::new(&registry).validate(&value, &schema).valid);
    }

    #[test]
    fn test_example_response() {
        let registry = registry();
        let mut responses = BTreeMap::new();
        responses.insert(
            StatusKey::Default,
            ResponseSpec::new(StatusKey::Default)
                .with_content("text/plain", Schema::string()),
        );
        let record = OperationRecord {
            path: "/pets".into(),
            method: HttpMethod::Get,
            operation_id: "getPets".into(),
            summary: None,
            description: None,
            tags: vec![],
            parameters: vec![],
            request_body: None,
            responses,
            security: None,
            deprecated: false,
            openapi_version: None,
            source: None,
            operation_id_derived: false,
        };
        assert_eq!(example_response(&record, 500, &registry), Some(json!("string")));
    }
}
