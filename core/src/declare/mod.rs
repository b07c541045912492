#![deny(missing_docs)]

//! # Declarations
//!
//! - **models**: operation records and their parts (this file).
//! - **context**: the nested declaration stack (group → path → method → response).
//! - **store**: finalized operation records keyed by `(path, method)`.
//! - **naming**: path template and operation id helpers.

pub mod context;
pub mod naming;
pub mod store;

pub use context::{DeclarationContext, Frame, FrameHandle, FrameKind, GroupFrame, MethodFrame, PathFrame};
pub use store::{CommitOutcome, CommitPolicy, OperationKey, OperationMetadataStore};

use crate::config::OpenApiVersion;
use crate::error::AppError;
use crate::schema::Schema;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// HTTP methods, ordered the way OpenAPI lists them in a Path Item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    /// GET
    Get,
    /// PUT
    Put,
    /// POST
    Post,
    /// DELETE
    Delete,
    /// OPTIONS
    Options,
    /// HEAD
    Head,
    /// PATCH
    Patch,
    /// TRACE
    Trace,
}

impl HttpMethod {
    /// Lowercase key used in a Path Item.
    pub fn as_key(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
            HttpMethod::Trace => "trace",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key().to_ascii_uppercase())
    }
}

impl FromStr for HttpMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "put" => Ok(HttpMethod::Put),
            "post" => Ok(HttpMethod::Post),
            "delete" => Ok(HttpMethod::Delete),
            "options" => Ok(HttpMethod::Options),
            "head" => Ok(HttpMethod::Head),
            "patch" => Ok(HttpMethod::Patch),
            "trace" => Ok(HttpMethod::Trace),
            other => Err(AppError::Config(format!("unknown HTTP method '{}'", other))),
        }
    }
}

/// Key of a declared response.
///
/// Ordering puts concrete codes first, then ranges, then `default`, which is
/// also the lookup precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusKey {
    /// A concrete status code.
    Code(u16),
    /// A status class such as `2XX` (holds the leading digit).
    Range(u8),
    /// The `default` response.
    Default,
}

impl StatusKey {
    /// True if a response with `status` is described by this key.
    pub fn covers(&self, status: u16) -> bool {
        match self {
            StatusKey::Code(code) => *code == status,
            StatusKey::Range(class) => status / 100 == u16::from(*class),
            StatusKey::Default => true,
        }
    }
}

impl From<u16> for StatusKey {
    fn from(code: u16) -> Self {
        StatusKey::Code(code)
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKey::Code(code) => write!(f, "{}", code),
            StatusKey::Range(class) => write!(f, "{}XX", class),
            StatusKey::Default => f.write_str("default"),
        }
    }
}

impl FromStr for StatusKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("default") {
            return Ok(StatusKey::Default);
        }
        let bytes = s.as_bytes();
        if bytes.len() == 3 && (b'1'..=b'5').contains(&bytes[0]) {
            if s[1..].eq_ignore_ascii_case("xx") {
                return Ok(StatusKey::Range(bytes[0] - b'0'));
            }
            if let Ok(code) = s.parse::<u16>() {
                return Ok(StatusKey::Code(code));
            }
        }
        Err(AppError::Config(format!("invalid response status key '{}'", s)))
    }
}

impl Serialize for StatusKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    /// `/users/{id}`
    Path,
    /// `?page=1`
    Query,
    /// Request header.
    Header,
    /// Cookie.
    Cookie,
}

impl ParamLocation {
    /// Value of the `in` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
        }
    }
}

/// A declared operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Location.
    #[serde(rename = "in")]
    pub location: ParamLocation,
    /// Whether the parameter must be sent. Always true for path parameters.
    pub required: bool,
    /// Value schema.
    pub schema: Schema,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Parameter {
    fn new(name: impl Into<String>, location: ParamLocation, schema: Schema) -> Self {
        Self {
            name: name.into(),
            location,
            required: location == ParamLocation::Path,
            schema,
            description: None,
        }
    }

    /// A path parameter (always required).
    pub fn path(name: impl Into<String>, schema: Schema) -> Self {
        Self::new(name, ParamLocation::Path, schema)
    }

    /// An optional query parameter.
    pub fn query(name: impl Into<String>, schema: Schema) -> Self {
        Self::new(name, ParamLocation::Query, schema)
    }

    /// An optional header parameter.
    pub fn header(name: impl Into<String>, schema: Schema) -> Self {
        Self::new(name, ParamLocation::Header, schema)
    }

    /// An optional cookie parameter.
    pub fn cookie(name: impl Into<String>, schema: Schema) -> Self {
        Self::new(name, ParamLocation::Cookie, schema)
    }

    /// Marks the parameter required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn same_slot(&self, other: &Parameter) -> bool {
        self.name == other.name && self.location == other.location
    }
}

/// A declared request body.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RequestBodySpec {
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether a body must be sent.
    pub required: bool,
    /// Media type → schema.
    pub content: IndexMap<String, Schema>,
}

impl RequestBodySpec {
    /// A required `application/json` body.
    pub fn json(schema: Schema) -> Self {
        let mut content = IndexMap::new();
        content.insert("application/json".to_string(), schema);
        Self {
            description: None,
            required: true,
            content,
        }
    }

    /// Adds another media type.
    pub fn with_content(mut self, media_type: impl Into<String>, schema: Schema) -> Self {
        self.content.insert(media_type.into(), schema);
        self
    }
}

/// A declared response header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderSpec {
    /// Whether the header must be present.
    pub required: bool,
    /// Value schema.
    pub schema: Schema,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl HeaderSpec {
    /// An optional header with the given schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            required: false,
            schema,
            description: None,
        }
    }

    /// Marks the header required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A declared response for one status key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSpec {
    /// Status key.
    pub status: StatusKey,
    /// Description (OpenAPI requires one; rendering falls back to the reason phrase).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Media type → schema. Empty for bodiless responses.
    pub content: IndexMap<String, Schema>,
    /// Header name → header declaration.
    pub headers: IndexMap<String, HeaderSpec>,
}

impl ResponseSpec {
    /// An empty response for `status`.
    pub fn new(status: StatusKey) -> Self {
        Self {
            status,
            description: None,
            content: IndexMap::new(),
            headers: IndexMap::new(),
        }
    }

    /// Adds a media type.
    pub fn with_content(mut self, media_type: impl Into<String>, schema: Schema) -> Self {
        self.content.insert(media_type.into(), schema);
        self
    }

    /// Adds an `application/json` media type.
    pub fn with_json(self, schema: Schema) -> Self {
        self.with_content("application/json", schema)
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Scheme name → required scopes.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// The finalized description of one method at one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    /// Full path template, group prefixes included.
    pub path: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Operation id (declared or derived).
    pub operation_id: String,
    /// Short summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tags, group tags first.
    pub tags: Vec<String>,
    /// Parameters, path-level first.
    pub parameters: Vec<Parameter>,
    /// Request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodySpec>,
    /// Declared responses in lookup order.
    pub responses: BTreeMap<StatusKey, ResponseSpec>,
    /// Security requirements; `None` inherits the document default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,
    /// Deprecated flag.
    pub deprecated: bool,
    /// OpenAPI version this operation must be rendered with, if pinned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openapi_version: Option<OpenApiVersion>,
    /// The test file that declared the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// True when `operation_id` was derived from the method and path.
    #[serde(skip)]
    pub operation_id_derived: bool,
}

impl OperationRecord {
    /// The store key of this record.
    pub fn key(&self) -> OperationKey {
        OperationKey::new(self.path.clone(), self.method)
    }

    /// Picks the declared response for an actual status: exact code, then
    /// status class, then `default`.
    pub fn response_for(&self, status: u16) -> Option<&ResponseSpec> {
        self.responses
            .iter()
            .find(|(key, _)| key.covers(status))
            .map(|(_, spec)| spec)
    }

    /// Folds a later declaration of the same operation into this one.
    ///
    /// Responses and parameters from `later` replace entries with the same
    /// key; tags are unioned; optional scalars take the later value when set.
    /// A derived operation id never replaces a declared one.
    pub fn merge_from(&mut self, later: OperationRecord) {
        self.responses.extend(later.responses);
        for param in later.parameters {
            match self.parameters.iter_mut().find(|p| p.same_slot(&param)) {
                Some(existing) => *existing = param,
                None => self.parameters.push(param),
            }
        }
        for tag in later.tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        if !later.operation_id_derived || self.operation_id_derived {
            self.operation_id = later.operation_id;
            self.operation_id_derived = later.operation_id_derived;
        }
        self.summary = later.summary.or(self.summary.take());
        self.description = later.description.or(self.description.take());
        self.request_body = later.request_body.or(self.request_body.take());
        self.security = later.security.or(self.security.take());
        self.openapi_version = later.openapi_version.or(self.openapi_version.take());
        self.source = later.source.or(self.source.take());
        self.deprecated |= later.deprecated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_key_parsing() {
        assert_eq!("200".parse::<StatusKey>().unwrap(), StatusKey::Code(200));
        assert_eq!("4xx".parse::<StatusKey>().unwrap(), StatusKey::Range(4));
        assert_eq!("default".parse::<StatusKey>().unwrap(), StatusKey::Default);
        assert!("abc".parse::<StatusKey>().is_err());
        assert!("600".parse::<StatusKey>().is_err());
        assert_eq!(StatusKey::Range(2).to_string(), "2XX");
    }

    #[test]
    fn test_response_lookup_precedence() {
        let mut record = sample_record();
        record
            .responses
            .insert(StatusKey::Range(4), ResponseSpec::new(StatusKey::Range(4)));
        record
            .responses
            .insert(StatusKey::Default, ResponseSpec::new(StatusKey::Default));

        assert_eq!(record.response_for(200).unwrap().status, StatusKey::Code(200));
        assert_eq!(record.response_for(404).unwrap().status, StatusKey::Range(4));
        assert_eq!(record.response_for(500).unwrap().status, StatusKey::Default);
    }

    #[test]
    fn test_merge_from_unions_responses_and_params() {
        let mut first = sample_record();
        let mut later = sample_record();
        later.responses.clear();
        later
            .responses
            .insert(StatusKey::Code(404), ResponseSpec::new(StatusKey::Code(404)));
        later.parameters = vec![
            Parameter::query("page", Schema::integer()).required(),
            Parameter::query("size", Schema::integer()),
        ];
        later.tags = vec!["pets".into(), "admin".into()];
        later.summary = None;

        first.merge_from(later);
        assert_eq!(
            first.responses.keys().copied().collect::<Vec<_>>(),
            vec![StatusKey::Code(200), StatusKey::Code(404)]
        );
        assert_eq!(first.parameters.len(), 2);
        assert!(first.parameters[0].required);
        assert_eq!(first.tags, vec!["pets", "admin"]);
        assert_eq!(first.summary.as_deref(), Some("List pets"));
    }

    fn sample_record() -> OperationRecord {
        let mut responses = BTreeMap::new();
        responses.insert(
            StatusKey::Code(200),
            ResponseSpec::new(StatusKey::Code(200)).with_json(Schema::string()),
        );
        OperationRecord {
            path: "/pets".into(),
            method: HttpMethod::Get,
            operation_id: "getPets".into(),
            summary: Some("List pets".into()),
            description: None,
            tags: vec!["pets".into()],
            parameters: vec![Parameter::query("page", Schema::integer())],
            request_body: None,
            responses,
            security: None,
            deprecated: false,
            openapi_version: None,
            source: None,
            operation_id_derived: false,
        }
    }
}
