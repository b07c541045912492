#![deny(missing_docs)]

//! # Response Validation
//!
//! Checks a captured HTTP response against the contract declared for its
//! operation and wraps the outcome in [`ExtendedMetadata`].
//!
//! Elapsed time is carried along for reporting and never affects validity.

use crate::declare::{OperationRecord, ResponseSpec};
use crate::schema::report::{ValidationResult, Violation, ViolationKind};
use crate::schema::{Schema, SchemaRegistry, SchemaValidator, ValidationOptions};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Media type assumed when a response carries no `Content-Type`.
const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// A completed HTTP exchange as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapturedResponse {
    /// Status code.
    pub status: u16,
    /// Header name → value, names as received.
    pub headers: IndexMap<String, String>,
    /// Raw body text.
    pub body: String,
}

impl CapturedResponse {
    /// An empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// A JSON response.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status)
            .with_header("Content-Type", DEFAULT_MEDIA_TYPE)
            .with_body(body.to_string())
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The operation metadata plus the outcome of one validated exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedMetadata {
    /// The declared operation.
    #[serde(flatten)]
    pub operation: OperationRecord,
    /// Status code actually returned.
    pub actual_status_code: u16,
    /// Time the exchange took, serialized in milliseconds.
    #[serde(serialize_with = "as_millis")]
    pub response_time: Duration,
    /// True when no error-class violation was found.
    pub validated: bool,
    /// Every violation, warnings included.
    pub validation_errors: Vec<Violation>,
}

impl ExtendedMetadata {
    /// Violation messages.
    pub fn messages(&self) -> Vec<String> {
        self.validation_errors.iter().map(ToString::to_string).collect()
    }

    /// Only the warning-class violations.
    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.validation_errors.iter().filter(|v| !v.is_error())
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

/// Validates captured responses with schemas from one registry.
#[derive(Debug, Clone, Copy)]
pub struct ResponseValidator<'r> {
    registry: &'r SchemaRegistry,
    options: ValidationOptions,
}

impl<'r> ResponseValidator<'r> {
    /// Open-world validator.
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            options: ValidationOptions::default(),
        }
    }

    /// Replaces the body validation options.
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Checks `response` against `record`.
    pub fn validate(
        &self,
        record: &OperationRecord,
        response: &CapturedResponse,
        elapsed: Duration,
    ) -> ExtendedMetadata {
        let violations = self.check(record, response);
        let result = ValidationResult::from_violations(violations);
        debug!(
            method = %record.method,
            path = %record.path,
            status = response.status,
            valid = result.valid,
            violations = result.errors.len(),
            "Response validated"
        );
        ExtendedMetadata {
            operation: record.clone(),
            actual_status_code: response.status,
            response_time: elapsed,
            validated: result.valid,
            validation_errors: result.errors,
        }
    }

    fn check(&self, record: &OperationRecord, response: &CapturedResponse) -> Vec<Violation> {
        if record.responses.is_empty() {
            return Vec::new();
        }
        let Some(spec) = record.response_for(response.status) else {
            warn!(
                method = %record.method,
                path = %record.path,
                status = response.status,
                "Undeclared status code"
            );
            return vec![Violation::warning(
                "",
                ViolationKind::UnexpectedStatusCode {
                    status: response.status,
                },
            )];
        };

        let mut out = missing_headers(spec, response);
        if spec.content.is_empty() {
            return out;
        }

        let media_type = response
            .header("content-type")
            .map(normalize_media_type)
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());
        let Some(schema) = select_media_schema(&spec.content, &media_type) else {
            out.push(Violation::error(
                "",
                ViolationKind::UnsupportedMediaType { media_type },
            ));
            return out;
        };

        let body = serde_json::from_str::<Value>(&response.body)
            .unwrap_or_else(|_| Value::String(response.body.clone()));
        let result = SchemaValidator::new(self.registry)
            .with_options(self.options)
            .validate(&body, schema);
        out.extend(result.errors);
        out
    }
}

/// Validates one exchange with default options.
pub fn validate_response(
    registry: &SchemaRegistry,
    record: &OperationRecord,
    response: &CapturedResponse,
    elapsed: Duration,
) -> ExtendedMetadata {
    ResponseValidator::new(registry).validate(record, response, elapsed)
}

fn missing_headers(spec: &ResponseSpec, response: &CapturedResponse) -> Vec<Violation> {
    spec.headers
        .iter()
        .filter(|(name, header)| header.required && response.header(name).is_none())
        .map(|(name, _)| {
            Violation::error(
                "headers",
                ViolationKind::MissingRequired { name: name.clone() },
            )
        })
        .collect()
}

pub(crate) fn normalize_media_type(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or(media_type)
        .trim()
        .to_ascii_lowercase()
}

/// Exact media type, then `type/*`, then `*/*`.
pub(crate) fn select_media_schema<'s>(
    content: &'s IndexMap<String, Schema>,
    media_type: &str,
) -> Option<&'s Schema> {
    let find = |wanted: &str| {
        content
            .iter()
            .find(|(declared, _)| normalize_media_type(declared) == wanted)
            .map(|(_, schema)| schema)
    };
    let wildcard = media_type
        .split_once('/')
        .map(|(major, _)| format!("{}/*", major));
    find(media_type)
        .or_else(|| wildcard.as_deref().and_then(find))
        .or_else(|| find("*/*"))
}
