#![deny(missing_docs)]

//! # Schema Model
//!
//! The JSON-Schema subset used by declarations, validation and rendering.
//!
//! - **registry**: named schemas and `$ref` resolution with cycle detection.
//! - **composer**: `allOf` merging and `oneOf` / `anyOf` branch selection.
//! - **validator**: recursive structural validation of JSON values.
//! - **render**: version-aware emission back into OpenAPI JSON.
//! - **report**: violations and validation results.
//!
//! Schemas are a tagged variant ([`SchemaKind`]) so every merge and validation
//! site matches exhaustively on the kind of node it is looking at.

pub mod composer;
pub mod ref_utils;
pub mod registry;
pub mod render;
pub mod report;
pub mod validator;

pub use composer::SchemaComposer;
pub use registry::SchemaRegistry;
pub use render::{NullableStyle, RenderOptions};
pub use report::{Severity, ValidationResult, Violation, ViolationKind};
pub use validator::{SchemaValidator, ValidationOptions};

use crate::error::{AppError, AppResult};
use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};
use std::fmt;

/// Scalar JSON types a schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// `type: string`
    String,
    /// `type: integer`
    Integer,
    /// `type: number`
    Number,
    /// `type: boolean`
    Boolean,
    /// `type: null`
    Null,
}

impl PrimitiveType {
    /// The keyword used for this type in a schema document.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Number => "number",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Null => "null",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(PrimitiveType::String),
            "integer" => Some(PrimitiveType::Integer),
            "number" => Some(PrimitiveType::Number),
            "boolean" => Some(PrimitiveType::Boolean),
            "null" => Some(PrimitiveType::Null),
            _ => None,
        }
    }

    /// Returns true if `value` is an instance of this type.
    ///
    /// Integers are numbers without a fractional part, so `2.0` is an integer.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (PrimitiveType::String, Value::String(_)) => true,
            (PrimitiveType::Boolean, Value::Bool(_)) => true,
            (PrimitiveType::Null, Value::Null) => true,
            (PrimitiveType::Number, Value::Number(_)) => true,
            (PrimitiveType::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the JSON type of an actual value, used in violation messages.
///
/// Follows [`PrimitiveType::matches`]: `3.0` is reported as an integer.
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) if PrimitiveType::Integer.matches(value) => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Properties and required names of an object schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    /// Declared properties, in declaration order.
    pub properties: IndexMap<String, Schema>,
    /// Names that must be present.
    pub required: IndexSet<String>,
}

/// The shape of a schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// No constraint (`{}` or `true`).
    Any,
    /// Reference to a registered schema by name.
    Ref(String),
    /// A scalar type.
    Primitive(PrimitiveType),
    /// An object with properties.
    Object(ObjectSchema),
    /// An array, optionally constraining its items.
    Array(Option<Box<Schema>>),
    /// A closed set of values, optionally typed.
    Enum {
        /// Declared `type`, if any.
        ty: Option<PrimitiveType>,
        /// Allowed values.
        values: Vec<Value>,
    },
    /// Every branch must hold.
    AllOf(Vec<Schema>),
    /// Exactly one branch must hold.
    OneOf(Vec<Schema>),
    /// At least one branch must hold.
    AnyOf(Vec<Schema>),
}

impl SchemaKind {
    /// Short label of the node kind, used in error messages.
    pub fn label(&self) -> String {
        match self {
            SchemaKind::Any => "any".into(),
            SchemaKind::Ref(name) => format!("$ref {}", name),
            SchemaKind::Primitive(ty) => ty.to_string(),
            SchemaKind::Object(_) => "object".into(),
            SchemaKind::Array(_) => "array".into(),
            SchemaKind::Enum { ty: Some(ty), .. } => format!("{} enum", ty),
            SchemaKind::Enum { ty: None, .. } => "enum".into(),
            SchemaKind::AllOf(_) => "allOf".into(),
            SchemaKind::OneOf(_) => "oneOf".into(),
            SchemaKind::AnyOf(_) => "anyOf".into(),
        }
    }
}

/// A schema node: its kind plus annotations shared by every kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// The structural kind of the node.
    pub kind: SchemaKind,
    /// Accepts `null` in addition to the declared kind.
    pub nullable: bool,
    /// Human readable description.
    pub description: Option<String>,
    /// Format hint (`date-time`, `uuid`, ...). Not enforced.
    pub format: Option<String>,
    /// Example value emitted into documents and used by mocks.
    pub example: Option<Value>,
}

impl Default for Schema {
    fn default() -> Self {
        Schema::from_kind(SchemaKind::Any)
    }
}

impl From<SchemaKind> for Schema {
    fn from(kind: SchemaKind) -> Self {
        Schema::from_kind(kind)
    }
}

impl Schema {
    /// Wraps a kind with no annotations.
    pub fn from_kind(kind: SchemaKind) -> Self {
        Self {
            kind,
            nullable: false,
            description: None,
            format: None,
            example: None,
        }
    }

    /// Unconstrained schema.
    pub fn any() -> Self {
        Self::from_kind(SchemaKind::Any)
    }

    /// `type: string`
    pub fn string() -> Self {
        Self::from_kind(SchemaKind::Primitive(PrimitiveType::String))
    }

    /// `type: integer`
    pub fn integer() -> Self {
        Self::from_kind(SchemaKind::Primitive(PrimitiveType::Integer))
    }

    /// `type: number`
    pub fn number() -> Self {
        Self::from_kind(SchemaKind::Primitive(PrimitiveType::Number))
    }

    /// `type: boolean`
    pub fn boolean() -> Self {
        Self::from_kind(SchemaKind::Primitive(PrimitiveType::Boolean))
    }

    /// `type: object` with no properties yet.
    pub fn object() -> Self {
        Self::from_kind(SchemaKind::Object(ObjectSchema::default()))
    }

    /// `type: array` with the given items.
    pub fn array(items: Schema) -> Self {
        Self::from_kind(SchemaKind::Array(Some(Box::new(items))))
    }

    /// `$ref` to a registered schema.
    pub fn reference(name: impl Into<String>) -> Self {
        Self::from_kind(SchemaKind::Ref(name.into()))
    }

    /// Untyped enum.
    pub fn enumeration(values: impl IntoIterator<Item = Value>) -> Self {
        Self::from_kind(SchemaKind::Enum {
            ty: None,
            values: values.into_iter().collect(),
        })
    }

    /// `allOf` composition.
    pub fn all_of(branches: Vec<Schema>) -> Self {
        Self::from_kind(SchemaKind::AllOf(branches))
    }

    /// `oneOf` composition.
    pub fn one_of(branches: Vec<Schema>) -> Self {
        Self::from_kind(SchemaKind::OneOf(branches))
    }

    /// `anyOf` composition.
    pub fn any_of(branches: Vec<Schema>) -> Self {
        Self::from_kind(SchemaKind::AnyOf(branches))
    }

    /// Adds an optional property. An unconstrained schema becomes an object
    /// schema; other non-object kinds are left unchanged.
    pub fn property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        if matches!(self.kind, SchemaKind::Any) {
            self.kind = SchemaKind::Object(ObjectSchema::default());
        }
        if let SchemaKind::Object(obj) = &mut self.kind {
            obj.properties.insert(name.into(), schema);
        }
        self
    }

    /// Adds a property and marks it required.
    pub fn required_property(self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        self.property(name.clone(), schema).require(name)
    }

    /// Marks a property name as required.
    pub fn require(mut self, name: impl Into<String>) -> Self {
        if matches!(self.kind, SchemaKind::Any) {
            self.kind = SchemaKind::Object(ObjectSchema::default());
        }
        if let SchemaKind::Object(obj) = &mut self.kind {
            obj.required.insert(name.into());
        }
        self
    }

    /// Accepts `null` too.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the format hint.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Sets the example value.
    pub fn with_example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    /// The referenced name when this node is a `$ref`.
    pub fn ref_name(&self) -> Option<&str> {
        match &self.kind {
            SchemaKind::Ref(name) => Some(name),
            _ => None,
        }
    }

    /// Direct sub-schemas of this node (properties, items, branches).
    pub fn children(&self) -> Vec<&Schema> {
        match &self.kind {
            SchemaKind::Any | SchemaKind::Ref(_) | SchemaKind::Primitive(_) => Vec::new(),
            SchemaKind::Enum { .. } => Vec::new(),
            SchemaKind::Object(obj) => obj.properties.values().collect(),
            SchemaKind::Array(items) => items.iter().map(|s| s.as_ref()).collect(),
            SchemaKind::AllOf(branches)
            | SchemaKind::OneOf(branches)
            | SchemaKind::AnyOf(branches) => branches.iter().collect(),
        }
    }

    /// Parses a JSON-Schema style document into a schema.
    ///
    /// Supported keywords: `type` (string, or array with `"null"`), `properties`,
    /// `required`, `items`, `enum`, `const`, `nullable`, `allOf`, `oneOf`, `anyOf`,
    /// `$ref`, plus the `description`, `format` and `example` annotations.
    /// A node mixing composition and structural keywords becomes
    /// `allOf[structural, composition...]`.
    pub fn from_json(value: &Value) -> AppResult<Schema> {
        match value {
            Value::Bool(true) => Ok(Schema::any()),
            Value::Bool(false) => Err(AppError::InvalidSchema(
                "boolean schema `false` is not supported".into(),
            )),
            Value::Object(map) => parse_schema_object(map),
            other => Err(AppError::InvalidSchema(format!(
                "expected a schema object, found {}",
                value_type_name(other)
            ))),
        }
    }

    /// Renders the schema in declaration form (OpenAPI 3.0 nullability, no flags).
    pub fn to_json(&self) -> Value {
        render::render_schema(self, &RenderOptions::default())
    }
}

const COMPOSITION_KEYS: [&str; 3] = ["allOf", "oneOf", "anyOf"];
const STRUCTURAL_KEYS: [&str; 6] = ["type", "properties", "required", "items", "enum", "const"];

fn parse_schema_object(map: &Map<String, Value>) -> AppResult<Schema> {
    let mut nullable = match map.get("nullable") {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(AppError::InvalidSchema(format!(
                "`nullable` must be a boolean, found {}",
                value_type_name(other)
            )))
        }
    };

    let kind = if let Some(reference) = map.get("$ref") {
        let Value::String(reference) = reference else {
            return Err(AppError::InvalidSchema("`$ref` must be a string".into()));
        };
        let clashing: Vec<&str> = COMPOSITION_KEYS
            .iter()
            .chain(STRUCTURAL_KEYS.iter())
            .copied()
            .filter(|k| map.contains_key(*k))
            .collect();
        if !clashing.is_empty() {
            return Err(AppError::InvalidSchema(format!(
                "`$ref` '{}' cannot be combined with {}",
                reference,
                clashing.join(", ")
            )));
        }
        let name = ref_utils::schema_ref_name(reference).ok_or_else(|| {
            AppError::InvalidSchema(format!("unsupported `$ref` target '{}'", reference))
        })?;
        SchemaKind::Ref(name)
    } else {
        let (structural, type_nullable) = parse_structural(map)?;
        nullable |= type_nullable;
        let mut branches = Vec::new();
        let mut compositions = Vec::new();
        for key in COMPOSITION_KEYS {
            let Some(raw) = map.get(key) else {
                continue;
            };
            let list = parse_branch_list(key, raw)?;
            match key {
                "allOf" => branches.extend(list),
                "oneOf" => compositions.push(Schema::one_of(list)),
                _ => compositions.push(Schema::any_of(list)),
            }
        }

        let has_all_of = map.contains_key("allOf");
        match (structural, has_all_of, compositions.len()) {
            (kind, false, 0) => kind,
            (SchemaKind::Any, false, 1) => compositions.remove(0).kind,
            (kind, _, _) => {
                let mut all = Vec::new();
                if !matches!(kind, SchemaKind::Any) {
                    all.push(Schema::from_kind(kind));
                }
                all.extend(branches);
                all.extend(compositions);
                SchemaKind::AllOf(all)
            }
        }
    };

    Ok(Schema {
        kind,
        nullable,
        description: map
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        format: map.get("format").and_then(Value::as_str).map(str::to_string),
        example: map.get("example").cloned(),
    })
}

fn parse_branch_list(key: &str, raw: &Value) -> AppResult<Vec<Schema>> {
    let Value::Array(items) = raw else {
        return Err(AppError::InvalidSchema(format!("`{}` must be an array", key)));
    };
    if items.is_empty() {
        return Err(AppError::InvalidSchema(format!("`{}` must not be empty", key)));
    }
    items.iter().map(Schema::from_json).collect()
}

/// Returns the structural kind plus whether `type` listed `"null"`.
fn parse_structural(map: &Map<String, Value>) -> AppResult<(SchemaKind, bool)> {
    let (declared, type_nullable) = parse_type_keyword(map.get("type"))?;

    let enum_values = match (map.get("enum"), map.get("const")) {
        (Some(Value::Array(values)), _) => Some(values.clone()),
        (Some(_), _) => return Err(AppError::InvalidSchema("`enum` must be an array".into())),
        (None, Some(constant)) => Some(vec![constant.clone()]),
        (None, None) => None,
    };

    if let Some(values) = enum_values {
        let ty = match declared.as_deref() {
            None => None,
            Some(name) => Some(PrimitiveType::parse(name).ok_or_else(|| {
                AppError::InvalidSchema(format!("enum of type '{}' is not supported", name))
            })?),
        };
        return Ok((SchemaKind::Enum { ty, values }, type_nullable));
    }

    let is_object = declared.as_deref() == Some("object")
        || map.contains_key("properties")
        || map.contains_key("required");
    let is_array = declared.as_deref() == Some("array") || map.contains_key("items");

    if is_object && is_array {
        return Err(AppError::InvalidSchema(
            "schema mixes object and array keywords".into(),
        ));
    }

    if is_object {
        if let Some(name) = declared.as_deref().filter(|n| *n != "object") {
            return Err(AppError::InvalidSchema(format!(
                "`properties` declared on a schema of type '{}'",
                name
            )));
        }
        return Ok((SchemaKind::Object(parse_object(map)?), type_nullable));
    }

    if is_array {
        let items = match map.get("items") {
            None => None,
            Some(raw) => Some(Box::new(Schema::from_json(raw)?)),
        };
        return Ok((SchemaKind::Array(items), type_nullable));
    }

    let kind = match declared.as_deref() {
        None => SchemaKind::Any,
        Some(name) => SchemaKind::Primitive(PrimitiveType::parse(name).ok_or_else(|| {
            AppError::InvalidSchema(format!("unknown type '{}'", name))
        })?),
    };
    Ok((kind, type_nullable))
}

fn parse_type_keyword(raw: Option<&Value>) -> AppResult<(Option<String>, bool)> {
    match raw {
        None => Ok((None, false)),
        Some(Value::String(name)) => Ok((Some(name.clone()), false)),
        Some(Value::Array(names)) => {
            let mut nullable = false;
            let mut rest = Vec::new();
            for name in names {
                match name.as_str() {
                    Some("null") => nullable = true,
                    Some(other) => rest.push(other.to_string()),
                    None => {
                        return Err(AppError::InvalidSchema(
                            "`type` array entries must be strings".into(),
                        ))
                    }
                }
            }
            match rest.len() {
                0 => Ok((Some("null".into()), false)),
                1 => Ok((rest.pop(), nullable)),
                _ => Err(AppError::InvalidSchema(format!(
                    "multiple types [{}] are not supported; use anyOf",
                    rest.join(", ")
                ))),
            }
        }
        Some(other) => Err(AppError::InvalidSchema(format!(
            "`type` must be a string or array, found {}",
            value_type_name(other)
        ))),
    }
}

fn parse_object(map: &Map<String, Value>) -> AppResult<ObjectSchema> {
    let mut obj = ObjectSchema::default();
    match map.get("properties") {
        None => {}
        Some(Value::Object(props)) => {
            for (name, raw) in props {
                let schema = Schema::from_json(raw).map_err(|e| {
                    AppError::InvalidSchema(format!("property '{}': {}", name, e))
                })?;
                obj.properties.insert(name.clone(), schema);
            }
        }
        Some(_) => {
            return Err(AppError::InvalidSchema(
                "`properties` must be an object".into(),
            ))
        }
    }
    match map.get("required") {
        None => {}
        Some(Value::Array(names)) => {
            for name in names {
                let name = name.as_str().ok_or_else(|| {
                    AppError::InvalidSchema("`required` entries must be strings".into())
                })?;
                obj.required.insert(name.to_string());
            }
        }
        Some(_) => {
            return Err(AppError::InvalidSchema("`required` must be an array".into()))
        }
    }
    Ok(obj)
}

impl serde::Serialize for Schema {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Schema {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Schema::from_json(&raw).map_err(serde::de::Error::custom)
    }
}
