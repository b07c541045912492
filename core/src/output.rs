//! # Output Files
//!
//! Writes assembled documents under the OpenAPI root, one file per target.

use crate::assemble::GeneratedDocument;
use crate::error::AppResult;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes every document to `root/<target>`, creating parent directories.
///
/// Returns the written paths in document order.
pub fn write_documents(root: &Path, documents: &[GeneratedDocument]) -> AppResult<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(documents.len());
    for doc in documents {
        let path = root.join(doc.target());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = doc.render()?;
        fs::write(&path, contents.as_bytes())?;
        info!(path = %path.display(), bytes = contents.len(), "OpenAPI document written");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OpenApiVersion, OutputFormat};
    use serde_json::json;

    #[test]
    fn test_writes_nested_targets() {
        let dir = tempfile::tempdir().unwrap();
        let docs = vec![
            GeneratedDocument {
                target: "v1/openapi.json".into(),
                format: OutputFormat::Json,
                openapi_version: OpenApiVersion::V3_0,
                tree: json!({"openapi": "3.0.3", "paths": {}}),
            },
            GeneratedDocument {
                target: "v2/openapi.yaml".into(),
                format: OutputFormat::Yaml,
                openapi_version: OpenApiVersion::V3_1,
                tree: json!({"openapi": "3.1.0", "paths": {}}),
            },
        ];

        let written = write_documents(dir.path(), &docs).unwrap();
        assert_eq!(written.len(), 2);

        let json_text = fs::read_to_string(dir.path().join("v1/openapi.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json_text).unwrap();
        assert_eq!(parsed["openapi"], "3.0.3");

        let yaml_text = fs::read_to_string(dir.path().join("v2/openapi.yaml")).unwrap();
        let parsed: serde_json::Value = serde_yaml::from_str(&yaml_text).unwrap();
        assert_eq!(parsed["openapi"], "3.1.0");
    }
}
