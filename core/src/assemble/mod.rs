#![deny(missing_docs)]

//! # Spec Assembly
//!
//! Renders committed operations into one OpenAPI document per output target.
//!
//! - **document**: the immutable [`GeneratedDocument`] value.
//! - **operation**: Operation Object rendering.
//! - **reachability**: the `components.schemas` walk.
//!
//! Output is deterministic: paths sort lexicographically, methods follow
//! Path Item order, component schemas sort by name.

pub mod document;
mod operation;
mod reachability;

pub use document::GeneratedDocument;

use crate::config::{EngineConfig, TargetConfig};
use crate::declare::{OperationMetadataStore, OperationRecord};
use crate::error::{AppError, AppResult};
use crate::schema::render::render_schema;
use crate::schema::SchemaRegistry;
use operation::{build_operation, operation_schemas};
use reachability::ReachabilityWalk;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// A target that could not be generated.
#[derive(Debug)]
pub struct TargetFailure {
    /// Output path of the target.
    pub target: String,
    /// Why it failed.
    pub error: AppError,
}

/// Result of one generation pass.
#[derive(Debug, Default)]
pub struct Assembly {
    /// Successfully assembled documents, in target order.
    pub documents: Vec<GeneratedDocument>,
    /// Targets aborted by configuration conflicts.
    pub failures: Vec<TargetFailure>,
}

impl Assembly {
    /// The document generated for `target`.
    pub fn document(&self, target: &str) -> Option<&GeneratedDocument> {
        self.documents.iter().find(|d| d.target() == target)
    }

    /// True when every target was generated.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builds documents from a store and a registry.
#[derive(Debug, Clone, Copy)]
pub struct SpecAssembler<'a> {
    config: &'a EngineConfig,
    registry: &'a SchemaRegistry,
}

impl<'a> SpecAssembler<'a> {
    /// Creates an assembler over the given configuration and schemas.
    pub fn new(config: &'a EngineConfig, registry: &'a SchemaRegistry) -> Self {
        Self { config, registry }
    }

    /// Assembles every configured target.
    ///
    /// Version conflicts abort only the affected target and are reported in
    /// [`Assembly::failures`]. Schema authoring errors abort the whole pass.
    pub fn assemble(&self, store: &OperationMetadataStore) -> AppResult<Assembly> {
        let mut assembly = Assembly::default();
        for (name, target) in self.config.targets() {
            match self.assemble_target(&name, &target, store) {
                Ok(doc) => {
                    info!(output = %name, paths = doc.paths().len(), "Document assembled");
                    assembly.documents.push(doc);
                }
                Err(error @ AppError::ConflictingTargetVersion { .. }) => {
                    warn!(output = %name, %error, "Target skipped");
                    assembly.failures.push(TargetFailure {
                        target: name,
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(assembly)
    }

    /// Assembles a single target.
    pub fn assemble_target(
        &self,
        name: &str,
        target: &TargetConfig,
        store: &OperationMetadataStore,
    ) -> AppResult<GeneratedDocument> {
        let version = self.config.version_of(target);
        let opts = self.config.render_options(target);
        let selected: Vec<&OperationRecord> = store.iter().filter(|r| target.selects(r)).collect();

        for record in &selected {
            if let Some(required) = record.openapi_version {
                if !required.is_compatible_with(&version) {
                    return Err(AppError::ConflictingTargetVersion {
                        target: name.to_string(),
                        path: record.path.clone(),
                        method: record.method.to_string(),
                        required: required.to_string(),
                        target_version: version.to_string(),
                    });
                }
            }
        }

        let mut walk = ReachabilityWalk::new(self.registry);
        let mut paths: BTreeMap<&str, Map<String, Value>> = BTreeMap::new();
        let mut tags: Vec<&str> = Vec::new();
        for record in &selected {
            for schema in operation_schemas(record) {
                walk.visit(schema)
                    .map_err(|e| e.in_operation(&record.path, record.method))?;
            }
            for tag in &record.tags {
                if !tags.contains(&tag.as_str()) {
                    tags.push(tag);
                }
            }
            paths
                .entry(record.path.as_str())
                .or_default()
                .insert(record.method.as_key().to_string(), build_operation(record, &opts));
        }

        let mut doc = Map::new();
        doc.insert("openapi".to_string(), json!(version.to_string()));
        doc.insert("info".to_string(), serde_json::to_value(&target.info)?);
        if !target.servers.is_empty() {
            doc.insert("servers".to_string(), serde_json::to_value(&target.servers)?);
        }
        if !tags.is_empty() {
            let entries = tags.iter().map(|t| json!({ "name": t })).collect();
            doc.insert("tags".to_string(), Value::Array(entries));
        }
        let paths: Map<String, Value> = paths
            .into_iter()
            .map(|(path, item)| (path.to_string(), Value::Object(item)))
            .collect();
        doc.insert("paths".to_string(), Value::Object(paths));

        let schemas: Map<String, Value> = walk
            .finish()
            .into_iter()
            .filter_map(|name| {
                let rendered = render_schema(self.registry.get(&name)?, &opts);
                Some((name, rendered))
            })
            .collect();
        if !schemas.is_empty() {
            doc.insert("components".to_string(), json!({ "schemas": schemas }));
        }

        Ok(GeneratedDocument {
            target: name.to_string(),
            format: self.config.format_of(name, target),
            openapi_version: version,
            tree: Value::Object(doc),
        })
    }
}

/// Assembles every target of `config` from `store` and `registry`.
pub fn assemble(
    store: &OperationMetadataStore,
    registry: &SchemaRegistry,
    config: &EngineConfig,
) -> AppResult<Assembly> {
    SpecAssembler::new(config, registry).assemble(store)
}
