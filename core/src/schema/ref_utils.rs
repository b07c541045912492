#![deny(missing_docs)]

//! # Reference Utilities
//!
//! Conversions between schema names and `$ref` pointers.
//!
//! Only document-local references are understood; nothing is ever fetched.

use percent_encoding::{utf8_percent_encode, percent_decode_str, AsciiSet, CONTROLS};

const COMPONENT_PREFIXES: [&str; 2] = ["#/components/schemas/", "#/definitions/"];

/// Characters escaped when a schema name is written into a URI fragment.
const FRAGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');

/// Extracts the schema name from a `$ref`.
///
/// Accepts `#/components/schemas/{name}`, Swagger-style `#/definitions/{name}`
/// and bare names. Returns `None` for anything pointing outside the local
/// component map (other documents, nested pointers).
pub fn schema_ref_name(ref_str: &str) -> Option<String> {
    if !ref_str.contains('#') && !ref_str.contains('/') {
        return (!ref_str.is_empty()).then(|| ref_str.to_string());
    }

    let segment = COMPONENT_PREFIXES
        .iter()
        .find_map(|prefix| ref_str.strip_prefix(prefix))?;
    if segment.is_empty() || segment.contains('/') {
        return None;
    }

    let name = decode_pointer_segment(segment);
    (!name.is_empty()).then_some(name)
}

/// Builds the `#/components/schemas/{name}` pointer for a schema name.
pub fn schema_ref_pointer(name: &str) -> String {
    format!("{}{}", COMPONENT_PREFIXES[0], encode_pointer_segment(name))
}

/// Decodes a JSON Pointer segment (handles `~1`, `~0` and percent-encoding).
pub(crate) fn decode_pointer_segment(segment: &str) -> String {
    let decoded = segment.replace("~1", "/").replace("~0", "~");
    percent_decode_str(&decoded)
        .decode_utf8_lossy()
        .into_owned()
}

fn encode_pointer_segment(name: &str) -> String {
    let escaped = name.replace('~', "~0").replace('/', "~1");
    utf8_percent_encode(&escaped, FRAGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_pointer_name() {
        assert_eq!(
            schema_ref_name("#/components/schemas/User").as_deref(),
            Some("User")
        );
    }

    #[test]
    fn test_definitions_pointer_name() {
        assert_eq!(schema_ref_name("#/definitions/User").as_deref(), Some("User"));
    }

    #[test]
    fn test_bare_name_accepted() {
        assert_eq!(schema_ref_name("User").as_deref(), Some("User"));
    }

    #[test]
    fn test_external_ref_rejected() {
        assert!(schema_ref_name("other.yaml#/components/schemas/User").is_none());
        assert!(schema_ref_name("#/components/responses/NotFound").is_none());
    }

    #[test]
    fn test_decode_pointer_segment_percent_encoding() {
        let decoded = decode_pointer_segment("User%20Profile~1details");
        assert_eq!(decoded, "User Profile/details");
    }

    #[test]
    fn test_pointer_roundtrip_escapes_slash() {
        let pointer = schema_ref_pointer("a/b c");
        assert_eq!(pointer, "#/components/schemas/a~1b%20c");
        assert_eq!(schema_ref_name(&pointer).as_deref(), Some("a/b c"));
    }
}
