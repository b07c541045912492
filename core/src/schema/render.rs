//! # Schema Rendering
//!
//! Emits schemas as OpenAPI JSON. Rendering is where the per-target flags
//! land: the same declaration can be emitted strict for one output and
//! permissive for another.

use crate::schema::ref_utils::schema_ref_pointer;
use crate::schema::{Schema, SchemaKind};
use serde_json::{json, Map, Value};

/// How nullability is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NullableStyle {
    /// OpenAPI 3.0: `nullable: true`.
    #[default]
    Keyword,
    /// OpenAPI 3.1: `type: [T, "null"]`.
    TypeArray,
}

/// Render-time switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Nullability encoding.
    pub nullable_style: NullableStyle,
    /// Emit `additionalProperties: false` on every object schema.
    pub no_additional_properties: bool,
    /// Mark every declared property of every object schema as required.
    pub all_properties_required: bool,
}

/// Renders a schema tree into OpenAPI JSON.
pub fn render_schema(schema: &Schema, opts: &RenderOptions) -> Value {
    let mut obj = Map::new();

    match &schema.kind {
        SchemaKind::Any => {}
        SchemaKind::Ref(name) => {
            let pointer = json!({ "$ref": schema_ref_pointer(name) });
            if !schema.nullable {
                return pointer;
            }
            return match opts.nullable_style {
                NullableStyle::Keyword => json!({ "allOf": [pointer], "nullable": true }),
                NullableStyle::TypeArray => json!({ "anyOf": [pointer, { "type": "null" }] }),
            };
        }
        SchemaKind::Primitive(ty) => {
            obj.insert("type".to_string(), json!(ty.as_str()));
        }
        SchemaKind::Enum { ty, values } => {
            if let Some(ty) = ty {
                obj.insert("type".to_string(), json!(ty.as_str()));
            }
            obj.insert("enum".to_string(), Value::Array(values.clone()));
        }
        SchemaKind::Object(o) => {
            obj.insert("type".to_string(), json!("object"));
            if !o.properties.is_empty() {
                let props: Map<String, Value> = o
                    .properties
                    .iter()
                    .map(|(name, prop)| (name.clone(), render_schema(prop, opts)))
                    .collect();
                obj.insert("properties".to_string(), Value::Object(props));
            }
            let required: Vec<Value> = if opts.all_properties_required {
                o.properties
                    .keys()
                    .chain(o.required.iter().filter(|r| !o.properties.contains_key(*r)))
                    .map(|name| json!(name))
                    .collect()
            } else {
                o.required.iter().map(|name| json!(name)).collect()
            };
            if !required.is_empty() {
                obj.insert("required".to_string(), Value::Array(required));
            }
            if opts.no_additional_properties {
                obj.insert("additionalProperties".to_string(), json!(false));
            }
        }
        SchemaKind::Array(items) => {
            obj.insert("type".to_string(), json!("array"));
            let items = items
                .as_ref()
                .map(|items| render_schema(items, opts))
                .unwrap_or_else(|| json!({}));
            obj.insert("items".to_string(), items);
        }
        SchemaKind::AllOf(branches) => {
            obj.insert("allOf".to_string(), render_branches(branches, opts));
        }
        SchemaKind::OneOf(branches) => {
            obj.insert("oneOf".to_string(), render_branches(branches, opts));
        }
        SchemaKind::AnyOf(branches) => {
            obj.insert("anyOf".to_string(), render_branches(branches, opts));
        }
    }

    if let Some(format) = &schema.format {
        obj.insert("format".to_string(), json!(format));
    }
    if let Some(desc) = &schema.description {
        obj.insert("description".to_string(), json!(desc));
    }
    if let Some(example) = &schema.example {
        obj.insert("example".to_string(), example.clone());
    }

    if schema.nullable && !matches!(schema.kind, SchemaKind::Any) {
        match opts.nullable_style {
            NullableStyle::Keyword => {
                obj.insert("nullable".to_string(), json!(true));
            }
            NullableStyle::TypeArray => return nullable_type_array(obj),
        }
    }

    Value::Object(obj)
}

fn render_branches(branches: &[Schema], opts: &RenderOptions) -> Value {
    Value::Array(branches.iter().map(|b| render_schema(b, opts)).collect())
}

/// Folds `"null"` into the `type` keyword, or wraps untyped nodes in `anyOf`.
fn nullable_type_array(mut obj: Map<String, Value>) -> Value {
    match obj.get("type").cloned() {
        Some(Value::String(ty)) => {
            obj.insert("type".to_string(), json!([ty, "null"]));
            if let Some(Value::Array(values)) = obj.get_mut("enum") {
                if !values.contains(&Value::Null) {
                    values.push(Value::Null);
                }
            }
            Value::Object(obj)
        }
        _ => json!({ "anyOf": [Value::Object(obj), { "type": "null" }] }),
    }
}
