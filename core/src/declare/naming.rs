#![deny(missing_docs)]

//! # Naming Utilities
//!
//! Path template helpers and `operationId` derivation.

use crate::declare::HttpMethod;
use heck::ToLowerCamelCase;
use regex::Regex;
use std::sync::OnceLock;

fn template_param_re() -> &'static Regex {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{([^{}/]+)\}").expect("Invalid regex constant"))
}

/// Names of the `{param}` placeholders in a path template, in order.
pub fn template_params(template: &str) -> Vec<String> {
    template_param_re()
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Joins a group prefix and a path template with exactly one `/` between
/// segments. The result always starts with `/` and never ends with one
/// (except for the bare root).
pub fn join_paths(prefix: &str, template: &str) -> String {
    let segments: Vec<&str> = prefix
        .split('/')
        .chain(template.split('/'))
        .filter(|s| !s.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

/// Derives an operation id from the HTTP method and URL path when none was
/// declared.
///
/// e.g. `GET /users/{id}` -> `getUsersId`
pub fn derive_operation_id(method: HttpMethod, path: &str) -> String {
    let clean_path = path.replace(['{', '}'], "").replace(['/', '-', '.'], "_");
    format!("{}_{}", method.as_key(), clean_path.trim_start_matches('_')).to_lower_camel_case()
}
