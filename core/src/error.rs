//! # Error Handling
//!
//! Provides the unified `AppError` enum used across the workspace.
//!
//! Only structural problems are errors: declaration misuse, schema authoring
//! mistakes and configuration conflicts. Value-level validation problems are
//! reported as [`crate::schema::Violation`]s and never surface here.

use derive_more::{Display, From};

/// The Global Error Enum.
///
/// We use `derive_more` for boilerplate.
/// Note: only the wrapped library errors get `From` conversions; domain
/// variants are always built explicitly.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// A frame was opened inside a frame that cannot contain it.
    #[display("Invalid nesting: cannot open {kind} inside {top}")]
    InvalidNesting {
        /// Kind of the frame being opened.
        kind: String,
        /// Kind of the current top frame (or `top level`).
        top: String,
    },

    /// A declaration call was made without the frame it belongs to.
    #[display("Missing context: {call} requires an active {expected} (found {found})")]
    MissingContext {
        /// Name of the declaration call.
        call: String,
        /// Frame kind(s) the call needs.
        expected: String,
        /// Frame kind actually on top (or `nothing`).
        found: String,
    },

    /// The context stack is empty.
    #[display("No active declaration context")]
    NoActiveContext,

    /// A frame handle did not match the top of the stack when closing.
    #[display("Frame mismatch: expected to close {expected}, but top is {found}")]
    FrameMismatch {
        /// The frame the caller tried to close.
        expected: String,
        /// The frame actually on top.
        found: String,
    },

    /// `$ref` points at a schema that was never registered.
    #[display("Unknown schema reference '{_0}'")]
    UnknownSchemaRef(String),

    /// `$ref` chain revisits a name already being resolved.
    #[display("Cyclic schema reference: {}", _0.join(" -> "))]
    CyclicSchemaRef(Vec<String>),

    /// `allOf` branches that cannot be merged structurally.
    #[display("Incompatible allOf: {_0}")]
    IncompatibleAllOf(String),

    /// A schema document that does not map onto the supported subset.
    #[display("Invalid schema: {_0}")]
    InvalidSchema(String),

    /// Generation failed while rendering a specific operation.
    #[display("{method} {path}: {source}")]
    Operation {
        /// Path template of the operation.
        path: String,
        /// HTTP method of the operation.
        method: String,
        /// Underlying error.
        source: Box<AppError>,
    },

    /// An operation pins an OpenAPI version that a selecting target does not use.
    #[display(
        "Target '{target}' (OpenAPI {target_version}) selects {method} {path}, which requires OpenAPI {required}"
    )]
    ConflictingTargetVersion {
        /// Target output path.
        target: String,
        /// Path template of the operation.
        path: String,
        /// HTTP method of the operation.
        method: String,
        /// Version pinned by the operation.
        required: String,
        /// Version configured for the target.
        target_version: String,
    },

    /// No committed operation for the given path and method.
    #[display("Unknown operation {method} {path}")]
    UnknownOperation {
        /// Path template.
        path: String,
        /// HTTP method.
        method: String,
    },

    /// Invalid configuration values.
    #[display("Configuration Error: {_0}")]
    Config(String),

    /// Wrapper for standard IO errors.
    #[from]
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// Wrapper for JSON (de)serialization errors.
    #[from]
    #[display("JSON Error: {_0}")]
    Json(serde_json::Error),

    /// Wrapper for YAML (de)serialization errors.
    #[from]
    #[display("YAML Error: {_0}")]
    Yaml(serde_yaml::Error),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {}

impl AppError {
    /// Attaches the operation being processed to an error.
    pub fn in_operation(self, path: &str, method: impl ToString) -> Self {
        AppError::Operation {
            path: path.to_string(),
            method: method.to_string(),
            source: Box::new(self),
        }
    }
}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_conversion() {
        let io_err = Error::new(ErrorKind::Other, "test");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_cycle_display_lists_chain() {
        let err = AppError::CyclicSchemaRef(vec!["A".into(), "B".into(), "A".into()]);
        assert_eq!(format!("{}", err), "Cyclic schema reference: A -> B -> A");
    }

    #[test]
    fn test_operation_context_names_path_and_method() {
        let err = AppError::UnknownSchemaRef("Pet".into()).in_operation("/pets", "GET");
        assert_eq!(
            format!("{}", err),
            "GET /pets: Unknown schema reference 'Pet'"
        );
    }
}
