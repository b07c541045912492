//! # Validation Reports
//!
//! Violations are data, not errors: validation always runs to completion and
//! hands back every problem it found.

use derive_more::Display;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// How serious a violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Breaks the contract.
    Error,
    /// Reported, but does not make the result invalid.
    Warning,
}

/// What went wrong at a given location.
#[derive(Debug, Clone, PartialEq, Display, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ViolationKind {
    /// The value has the wrong JSON type.
    #[display("expected {expected}, found {found}")]
    TypeMismatch {
        /// Declared type.
        expected: String,
        /// Actual JSON type.
        found: String,
    },
    /// A required property is absent.
    #[display("missing required property '{name}'")]
    MissingRequired {
        /// Property name.
        name: String,
    },
    /// A property not declared in `properties` while additional properties are forbidden.
    #[display("additional property '{name}' is not allowed")]
    AdditionalProperty {
        /// Property name.
        name: String,
    },
    /// The value is not one of the enum members.
    #[display("value {value} is not one of {}", Value::Array(allowed.clone()))]
    NotInEnum {
        /// The offending value.
        value: Value,
        /// Allowed values.
        allowed: Vec<Value>,
    },
    /// No `oneOf` / `anyOf` branch accepted the value.
    #[display("value matches none of the {branches} {keyword} branches")]
    NoMatchingBranch {
        /// `oneOf` or `anyOf`.
        keyword: String,
        /// Number of branches tried.
        branches: usize,
    },
    /// More than one `oneOf` branch accepted the value.
    #[display("value matches {} oneOf branches (indices {:?}), exactly one expected", matched.len(), matched)]
    AmbiguousOneOf {
        /// Indices of matching branches.
        matched: Vec<usize>,
    },
    /// The schema itself could not be resolved or merged while validating.
    #[display("schema error: {message}")]
    SchemaError {
        /// Description of the authoring problem.
        message: String,
    },
    /// The response status has no declared response.
    #[display("unexpected status code {status}")]
    UnexpectedStatusCode {
        /// Actual status.
        status: u16,
    },
    /// The response content type has no declared media type.
    #[display("unsupported media type '{media_type}'")]
    UnsupportedMediaType {
        /// Actual (normalized) media type.
        media_type: String,
    },
    /// A `required` name with no matching property declaration.
    #[display("required property '{name}' is not declared in properties")]
    UndeclaredRequired {
        /// Property name.
        name: String,
    },
}

/// One problem found during validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Location of the value: `field`, `field[0]`, `field.nested`; empty for the root.
    pub path: String,
    /// Mismatch kind.
    #[serde(flatten)]
    pub kind: ViolationKind,
    /// Severity.
    pub severity: Severity,
}

impl Violation {
    /// An error-class violation.
    pub fn error(path: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            path: path.into(),
            kind,
            severity: Severity::Error,
        }
    }

    /// A warning-class violation.
    pub fn warning(path: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            path: path.into(),
            kind,
            severity: Severity::Warning,
        }
    }

    /// True for error-class violations.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.severity == Severity::Warning {
            f.write_str("warning: ")?;
        }
        if self.path.is_empty() {
            write!(f, "(root): {}", self.kind)
        } else {
            write!(f, "{}: {}", self.path, self.kind)
        }
    }
}

/// Outcome of validating a value or a set of declarations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// False when at least one error-class violation was found.
    pub valid: bool,
    /// Every violation, warnings included.
    pub errors: Vec<Violation>,
}

impl ValidationResult {
    /// Builds a result; validity is derived from the violations.
    pub fn from_violations(errors: Vec<Violation>) -> Self {
        Self {
            valid: !errors.iter().any(Violation::is_error),
            errors,
        }
    }

    /// A valid result with no violations.
    pub fn ok() -> Self {
        Self::from_violations(Vec::new())
    }

    /// The violations rendered as strings.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Appends a property name to a violation path.
pub(crate) fn join_field(base: &str, field: &str) -> String {
    if base.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", base, field)
    }
}

/// Appends an array index to a violation path.
pub(crate) fn join_index(base: &str, index: usize) -> String {
    format!("{}[{}]", base, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_invalidate() {
        let result = ValidationResult::from_violations(vec![Violation::warning(
            "",
            ViolationKind::UnexpectedStatusCode { status: 404 },
        )]);
        assert!(result.valid);
        assert_eq!(
            result.messages(),
            vec!["warning: (root): unexpected status code 404"]
        );
    }

    #[test]
    fn test_paths_compose() {
        let path = join_index(&join_field(&join_field("", "user"), "tags"), 2);
        assert_eq!(path, "user.tags[2]");
        let v = Violation::error(
            path,
            ViolationKind::MissingRequired {
                name: "name".into(),
            },
        );
        assert_eq!(
            v.to_string(),
            "user.tags[2]: missing required property 'name'"
        );
    }
}
