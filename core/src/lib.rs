#![deny(missing_docs)]

//! # Declspec Core
//!
//! Declarative OpenAPI engine: operations are declared alongside test code,
//! assembled into OpenAPI 3.0/3.1 documents, and live responses are checked
//! against what was declared.

/// Shared error types.
pub mod error;

/// Schema model, registry, composition and validation.
pub mod schema;

/// Declaration stack and operation store.
pub mod declare;

/// Engine and output target configuration.
pub mod config;

/// Document assembly.
pub mod assemble;

/// Response validation.
pub mod response;

/// Example value synthesis.
pub mod mock;

/// Writing documents to disk.
pub mod output;

/// Caller-owned engine state.
pub mod session;

pub use assemble::{assemble, Assembly, GeneratedDocument, SpecAssembler, TargetFailure};
pub use config::{EngineConfig, OpenApiVersion, OutputFormat, Selector, TargetConfig};
pub use declare::{
    CommitPolicy, DeclarationContext, HttpMethod, OperationMetadataStore, OperationRecord,
    Parameter, RequestBodySpec, ResponseSpec, StatusKey,
};
pub use error::{AppError, AppResult};
pub use mock::{example_response, synthesize_example};
pub use output::write_documents;
pub use response::{validate_response, CapturedResponse, ExtendedMetadata, ResponseValidator};
pub use schema::{
    Schema, SchemaComposer, SchemaRegistry, SchemaValidator, ValidationResult, Violation,
};
pub use session::SpecSession;
