#![deny(missing_docs)]

//! # Generated Document
//!
//! One assembled output. Documents are plain values: clone before mutating,
//! so separate generation runs never share state.

use crate::config::{OpenApiVersion, OutputFormat};
use crate::declare::HttpMethod;
use crate::error::AppResult;
use serde_json::Value;

/// An assembled OpenAPI document for one output target.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDocument {
    pub(crate) target: String,
    pub(crate) format: OutputFormat,
    pub(crate) openapi_version: OpenApiVersion,
    pub(crate) tree: Value,
}

impl GeneratedDocument {
    /// Output path relative to the OpenAPI root.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Serialization format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// OpenAPI version the document was rendered for.
    pub fn openapi_version(&self) -> OpenApiVersion {
        self.openapi_version
    }

    /// The rendered operation object at `path` / `method`.
    pub fn operation(&self, path: &str, method: HttpMethod) -> Option<&Value> {
        self.tree
            .get("paths")
            .and_then(|paths| paths.get(path))
            .and_then(|item| item.get(method.as_key()))
    }

    /// Path templates in document order.
    pub fn paths(&self) -> Vec<&str> {
        self.tree
            .get("paths")
            .and_then(Value::as_object)
            .map(|paths| paths.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// A schema from `components.schemas`.
    pub fn component_schema(&self, name: &str) -> Option<&Value> {
        self.tree.pointer("/components/schemas").and_then(|s| s.get(name))
    }

    /// The full JSON tree.
    pub fn to_json(&self) -> &Value {
        &self.tree
    }

    /// Consumes the document, returning the tree.
    pub fn into_json(self) -> Value {
        self.tree
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json_string(&self) -> AppResult<String> {
        let mut out = serde_json::to_string_pretty(&self.tree)?;
        out.push('\n');
        Ok(out)
    }

    /// YAML rendering of the same tree.
    pub fn to_yaml_string(&self) -> AppResult<String> {
        Ok(serde_yaml::to_string(&self.tree)?)
    }

    /// Serialized in the target's configured format.
    pub fn render(&self) -> AppResult<String> {
        match self.format {
            OutputFormat::Json => self.to_json_string(),
            OutputFormat::Yaml => self.to_yaml_string(),
        }
    }
}
