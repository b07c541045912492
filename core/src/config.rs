#![deny(missing_docs)]

//! # Engine Configuration
//!
//! Output targets and global schema-strictness flags.
//!
//! ```yaml
//! openapiRoot: docs
//! defaultOpenAPIVersion: "3.0.3"
//! noAdditionalProperties: false
//! openapiSpecs:
//!   public/openapi.yaml:
//!     info: { title: Public API, version: "1.0.0" }
//!     select: { tags: [public] }
//!   internal/openapi.json:
//!     info: { title: Internal API, version: "1.0.0" }
//!     openapiVersion: "3.1.0"
//!     allPropertiesRequired: true
//! ```

use crate::declare::{CommitPolicy, OperationRecord};
use crate::error::{AppError, AppResult};
use crate::schema::{NullableStyle, RenderOptions};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use url::Url;
use utoipa::openapi::{Info, Server};

/// An OpenAPI 3.x version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpenApiVersion {
    /// Always 3.
    pub major: u8,
    /// 0 or 1.
    pub minor: u8,
    /// Patch level.
    pub patch: u8,
}

impl OpenApiVersion {
    /// OpenAPI 3.0.3.
    pub const V3_0: OpenApiVersion = OpenApiVersion {
        major: 3,
        minor: 0,
        patch: 3,
    };

    /// OpenAPI 3.1.0.
    pub const V3_1: OpenApiVersion = OpenApiVersion {
        major: 3,
        minor: 1,
        patch: 0,
    };

    /// How nullability is spelled in this version.
    pub fn nullable_style(&self) -> NullableStyle {
        if self.minor >= 1 {
            NullableStyle::TypeArray
        } else {
            NullableStyle::Keyword
        }
    }

    /// Versions are compatible when they share `major.minor`.
    pub fn is_compatible_with(&self, other: &OpenApiVersion) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl Default for OpenApiVersion {
    fn default() -> Self {
        OpenApiVersion::V3_0
    }
}

impl fmt::Display for OpenApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for OpenApiVersion {
    type Err = AppError;

    /// Accepts `3.0`, `3.0.3`, `3.1`, `3.1.0`; a missing patch defaults to the
    /// latest patch of that minor line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::Config(format!("unsupported OpenAPI version '{}'", s));
        let mut parts = s.trim().split('.');
        let major: u8 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minor: u8 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let patch: Option<u8> = match parts.next() {
            Some(p) => Some(p.parse().map_err(|_| invalid())?),
            None => None,
        };
        if parts.next().is_some() || major != 3 || minor > 1 {
            return Err(invalid());
        }
        let latest = if minor == 0 {
            OpenApiVersion::V3_0
        } else {
            OpenApiVersion::V3_1
        };
        Ok(OpenApiVersion {
            major,
            minor,
            patch: patch.unwrap_or(latest.patch),
        })
    }
}

impl Serialize for OpenApiVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OpenApiVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Serialization format of an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// YAML.
    Yaml,
}

impl OutputFormat {
    /// `.yaml` / `.yml` → YAML, anything else → JSON.
    pub fn from_path(path: &str) -> Self {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                OutputFormat::Yaml
            }
            _ => OutputFormat::Json,
        }
    }
}

/// Declarative operation selection. Every criterion that is set must hold;
/// an empty selector selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    /// Selects every operation; the other criteria are ignored.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all: bool,
    /// Operation carries at least one of these tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Operation path starts with this prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    /// Operation was declared in one of these files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl Selector {
    /// True if `record` satisfies every criterion.
    pub fn matches(&self, record: &OperationRecord) -> bool {
        if self.all {
            return true;
        }
        let tags_ok = self.tags.is_empty() || record.tags.iter().any(|t| self.tags.contains(t));
        let prefix_ok = self
            .path_prefix
            .as_deref()
            .map_or(true, |prefix| record.path.starts_with(prefix));
        let source_ok = self.sources.is_empty()
            || record
                .source
                .as_ref()
                .is_some_and(|s| self.sources.contains(s));
        tags_ok && prefix_ok && source_ok
    }
}

/// A programmatic operation filter.
#[derive(Clone)]
pub struct OperationFilter(Arc<dyn Fn(&OperationRecord) -> bool + Send + Sync>);

impl OperationFilter {
    /// Wraps a predicate.
    pub fn new(predicate: impl Fn(&OperationRecord) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Applies the predicate.
    pub fn matches(&self, record: &OperationRecord) -> bool {
        (self.0)(record)
    }
}

impl fmt::Debug for OperationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OperationFilter(..)")
    }
}

/// One output document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    /// Document `info`.
    #[serde(default = "default_info")]
    pub info: Info,
    /// Document `servers`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    /// Overrides `defaultOpenAPIVersion`.
    #[serde(default, rename = "openapiVersion", skip_serializing_if = "Option::is_none")]
    pub openapi_version: Option<OpenApiVersion>,
    /// Overrides the format inferred from the file extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    /// Which operations belong to this document.
    #[serde(default)]
    pub select: Selector,
    /// Overrides the global `noAdditionalProperties`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_additional_properties: Option<bool>,
    /// Overrides the global `allPropertiesRequired`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_properties_required: Option<bool>,
    /// Extra programmatic filter, applied after `select`.
    #[serde(skip)]
    pub filter: Option<OperationFilter>,
}

fn default_info() -> Info {
    Info::new("API", "1.0.0")
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            info: default_info(),
            servers: Vec::new(),
            openapi_version: None,
            format: None,
            select: Selector::default(),
            no_additional_properties: None,
            all_properties_required: None,
            filter: None,
        }
    }
}

impl TargetConfig {
    /// A target with the given title and API version.
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Info::new(title.into(), version.into()),
            ..Self::default()
        }
    }

    /// Sets the OpenAPI version.
    pub fn with_openapi_version(mut self, version: OpenApiVersion) -> Self {
        self.openapi_version = Some(version);
        self
    }

    /// Sets the declarative selector.
    pub fn with_selector(mut self, select: Selector) -> Self {
        self.select = select;
        self
    }

    /// Sets a programmatic filter.
    pub fn with_filter(
        mut self,
        predicate: impl Fn(&OperationRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(OperationFilter::new(predicate));
        self
    }

    /// True if the operation belongs to this target.
    pub fn selects(&self, record: &OperationRecord) -> bool {
        self.select.matches(record) && self.filter.as_ref().map_or(true, |f| f.matches(record))
    }
}

/// Global engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Directory output paths are relative to.
    #[serde(default = "default_root")]
    pub openapi_root: PathBuf,
    /// Output relative path → target.
    #[serde(default)]
    pub openapi_specs: IndexMap<String, TargetConfig>,
    /// Emit `additionalProperties: false` on every object schema.
    #[serde(default)]
    pub no_additional_properties: bool,
    /// Require every declared property of every object schema.
    #[serde(default)]
    pub all_properties_required: bool,
    /// Version used by targets that do not set one.
    #[serde(default, rename = "defaultOpenAPIVersion")]
    pub default_openapi_version: OpenApiVersion,
    /// What re-declaring an operation does.
    #[serde(default)]
    pub commit_policy: CommitPolicy,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

/// Output path used when no target is configured.
pub const DEFAULT_TARGET: &str = "openapi.json";

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            openapi_root: default_root(),
            openapi_specs: IndexMap::new(),
            no_additional_properties: false,
            all_properties_required: false,
            default_openapi_version: OpenApiVersion::default(),
            commit_policy: CommitPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parses and checks a YAML document (JSON is valid YAML too).
    pub fn from_yaml_str(raw: &str) -> AppResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and checks a JSON document.
    pub fn from_json_str(raw: &str) -> AppResult<Self> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file; `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }

    /// Adds (or replaces) a target.
    pub fn with_target(mut self, output: impl Into<String>, target: TargetConfig) -> Self {
        self.openapi_specs.insert(output.into(), target);
        self
    }

    /// Checks output paths and server URLs.
    pub fn validate(&self) -> AppResult<()> {
        for (output, target) in &self.openapi_specs {
            if output.trim().is_empty() {
                return Err(AppError::Config("empty output path in openapiSpecs".into()));
            }
            if Path::new(output).is_absolute() {
                return Err(AppError::Config(format!(
                    "output path '{}' must be relative to openapiRoot",
                    output
                )));
            }
            for server in &target.servers {
                if !server.url.starts_with('/') && Url::parse(&server.url).is_err() {
                    return Err(AppError::Config(format!(
                        "target '{}': invalid server url '{}'",
                        output, server.url
                    )));
                }
            }
        }
        Ok(())
    }

    /// Configured targets, or a single default target when none is set.
    pub fn targets(&self) -> Vec<(String, TargetConfig)> {
        if self.openapi_specs.is_empty() {
            return vec![(DEFAULT_TARGET.to_string(), TargetConfig::default())];
        }
        self.openapi_specs
            .iter()
            .map(|(name, target)| (name.clone(), target.clone()))
            .collect()
    }

    /// Effective OpenAPI version of a target.
    pub fn version_of(&self, target: &TargetConfig) -> OpenApiVersion {
        target
            .openapi_version
            .unwrap_or(self.default_openapi_version)
    }

    /// Effective output format of a target.
    pub fn format_of(&self, output: &str, target: &TargetConfig) -> OutputFormat {
        target
            .format
            .unwrap_or_else(|| OutputFormat::from_path(output))
    }

    /// Render switches for a target: version-driven nullability plus the
    /// global flags, each overridable per target.
    pub fn render_options(&self, target: &TargetConfig) -> RenderOptions {
        RenderOptions {
            nullable_style: self.version_of(target).nullable_style(),
            no_additional_properties: target
                .no_additional_properties
                .unwrap_or(self.no_additional_properties),
            all_properties_required: target
                .all_properties_required
                .unwrap_or(self.all_properties_required),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
openapiRoot: docs
defaultOpenAPIVersion: "3.0"
noAdditionalProperties: true
commitPolicy: overwrite
openapiSpecs:
  public/openapi.yaml:
    info:
      title: Public API
      version: "1.0.0"
    servers:
      - url: https://api.example.com
    select:
      tags: [public]
  internal/openapi.json:
    info:
      title: Internal API
      version: "2.0.0"
    openapiVersion: "3.1.0"
    noAdditionalProperties: false
    allPropertiesRequired: true
"#;

    #[test]
    fn test_parse_yaml_config() {
        let config = EngineConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.openapi_root, PathBuf::from("docs"));
        assert_eq!(config.default_openapi_version, OpenApiVersion::V3_0);
        assert_eq!(config.commit_policy, CommitPolicy::Overwrite);

        let targets = config.targets();
        assert_eq!(targets.len(), 2);
        let (public_name, public) = &targets[0];
        assert_eq!(public_name, "public/openapi.yaml");
        assert_eq!(public.info.title, "Public API");
        assert_eq!(config.format_of(public_name, public), OutputFormat::Yaml);
        assert_eq!(
            config.render_options(public),
            RenderOptions {
                nullable_style: NullableStyle::Keyword,
                no_additional_properties: true,
                all_properties_required: false,
            }
        );

        let (internal_name, internal) = &targets[1];
        assert_eq!(config.format_of(internal_name, internal), OutputFormat::Json);
        assert_eq!(config.version_of(internal), OpenApiVersion::V3_1);
        assert_eq!(
            config.render_options(internal),
            RenderOptions {
                nullable_style: NullableStyle::TypeArray,
                no_additional_properties: false,
                all_properties_required: true,
            }
        );
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!("3.1".parse::<OpenApiVersion>().unwrap(), OpenApiVersion::V3_1);
        assert_eq!(
            "3.0.1".parse::<OpenApiVersion>().unwrap().to_string(),
            "3.0.1"
        );
        assert!("2.0".parse::<OpenApiVersion>().is_err());
        assert!("3.2.0".parse::<OpenApiVersion>().is_err());
        assert!("3.x".parse::<OpenApiVersion>().is_err());
        assert!(OpenApiVersion::V3_0.is_compatible_with(&"3.0.0".parse().unwrap()));
    }

    #[test]
    fn test_defaults_to_single_target() {
        let config = EngineConfig::default();
        let targets = config.targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0, DEFAULT_TARGET);
    }

    #[test]
    fn test_rejects_bad_server_url() {
        let raw = r#"
openapiSpecs:
  api.json:
    servers:
      - url: "not a url"
"#;
        let err = EngineConfig::from_yaml_str(raw).unwrap_err();
        assert!(err.to_string().contains("invalid server url"));
    }

    #[test]
    fn test_relative_server_url_allowed() {
        let raw = r#"{"openapiSpecs": {"api.json": {"servers": [{"url": "/v1"}]}}}"#;
        assert!(EngineConfig::from_json_str(raw).is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("declspec.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.openapi_specs.len(), 2);
    }

    #[test]
    fn test_target_new_sets_info() {
        let title = String::from("Pets");
        let target = TargetConfig::new(title, "2.1.0");
        assert_eq!(target.info.title, "Pets");
        assert_eq!(target.info.version, "2.1.0");
    }

    #[test]
    fn test_selector_criteria() {
        let record = OperationRecord {
            path: "/admin/users".into(),
            method: crate::declare::HttpMethod::Get,
            operation_id: "getAdminUsers".into(),
            summary: None,
            description: None,
            tags: vec!["admin".into()],
            parameters: vec![],
            request_body: None,
            responses: Default::default(),
            security: None,
            deprecated: false,
            openapi_version: None,
            source: Some("tests/admin.rs".into()),
            operation_id_derived: false,
        };
        let raw = r#"{"tags": ["public"], "pathPrefix": "/admin"}"#;
        let selector: Selector = serde_json::from_str(raw).unwrap();
        assert!(!selector.matches(&record));
        assert!(Selector { all: true, ..selector }.matches(&record));

        let selector = Selector {
            path_prefix: Some("/admin".into()),
            sources: vec!["tests/admin.rs".into()],
            ..Selector::default()
        };
        assert!(selector.matches(&record));
        let target = TargetConfig::new("Admin", "1").with_filter(|r| r.deprecated);
        assert!(!target.selects(&record));
    }
}
