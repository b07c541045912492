//! # Operation Rendering
//!
//! Turns an [`OperationRecord`] into an OpenAPI Operation Object.

use crate::declare::{
    HeaderSpec, OperationRecord, Parameter, RequestBodySpec, ResponseSpec, SecurityRequirement,
    StatusKey,
};
use crate::schema::render::render_schema;
use crate::schema::{RenderOptions, Schema};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

/// Every schema the operation mentions directly.
pub(crate) fn operation_schemas(record: &OperationRecord) -> Vec<&Schema> {
    let mut out: Vec<&Schema> = record.parameters.iter().map(|p| &p.schema).collect();
    if let Some(body) = &record.request_body {
        out.extend(body.content.values());
    }
    for response in record.responses.values() {
        out.extend(response.content.values());
        out.extend(response.headers.values().map(|h| &h.schema));
    }
    out
}

pub(crate) fn build_operation(record: &OperationRecord, opts: &RenderOptions) -> Value {
    let mut op = Map::new();
    if !record.tags.is_empty() {
        op.insert("tags".to_string(), json!(record.tags));
    }
    if let Some(summary) = &record.summary {
        op.insert("summary".to_string(), json!(summary));
    }
    if let Some(desc) = &record.description {
        op.insert("description".to_string(), json!(desc));
    }
    op.insert("operationId".to_string(), json!(record.operation_id));

    if !record.parameters.is_empty() {
        let params = record
            .parameters
            .iter()
            .map(|p| build_parameter(p, opts))
            .collect::<Vec<_>>();
        op.insert("parameters".to_string(), Value::Array(params));
    }

    if let Some(body) = &record.request_body {
        op.insert("requestBody".to_string(), build_request_body(body, opts));
    }

    let mut responses = Map::new();
    for (status, response) in &record.responses {
        responses.insert(status.to_string(), build_response(response, opts));
    }
    op.insert("responses".to_string(), Value::Object(responses));

    if record.deprecated {
        op.insert("deprecated".to_string(), json!(true));
    }
    if let Some(security) = &record.security {
        op.insert("security".to_string(), build_security(security));
    }

    Value::Object(op)
}

fn build_parameter(param: &Parameter, opts: &RenderOptions) -> Value {
    let mut obj = Map::new();
    obj.insert("name".to_string(), json!(param.name));
    obj.insert("in".to_string(), json!(param.location.as_str()));
    if let Some(desc) = &param.description {
        obj.insert("description".to_string(), json!(desc));
    }
    obj.insert("required".to_string(), json!(param.required));
    obj.insert("schema".to_string(), render_schema(&param.schema, opts));
    Value::Object(obj)
}

fn build_request_body(body: &RequestBodySpec, opts: &RenderOptions) -> Value {
    let mut obj = Map::new();
    if let Some(desc) = &body.description {
        obj.insert("description".to_string(), json!(desc));
    }
    obj.insert("content".to_string(), build_content(&body.content, opts));
    if body.required {
        obj.insert("required".to_string(), json!(true));
    }
    Value::Object(obj)
}

fn build_response(response: &ResponseSpec, opts: &RenderOptions) -> Value {
    let mut resp = Map::new();
    let description = response
        .description
        .clone()
        .unwrap_or_else(|| default_description(response.status).to_string());
    resp.insert("description".to_string(), json!(description));

    if !response.headers.is_empty() {
        let headers: Map<String, Value> = response
            .headers
            .iter()
            .map(|(name, header)| (name.clone(), build_header(header, opts)))
            .collect();
        resp.insert("headers".to_string(), Value::Object(headers));
    }
    if !response.content.is_empty() {
        resp.insert("content".to_string(), build_content(&response.content, opts));
    }
    Value::Object(resp)
}

fn build_header(header: &HeaderSpec, opts: &RenderOptions) -> Value {
    let mut h = Map::new();
    if let Some(desc) = &header.description {
        h.insert("description".to_string(), json!(desc));
    }
    if header.required {
        h.insert("required".to_string(), json!(true));
    }
    h.insert("schema".to_string(), render_schema(&header.schema, opts));
    Value::Object(h)
}

fn build_content(content: &IndexMap<String, Schema>, opts: &RenderOptions) -> Value {
    let media: Map<String, Value> = content
        .iter()
        .map(|(media_type, schema)| {
            (
                media_type.clone(),
                json!({ "schema": render_schema(schema, opts) }),
            )
        })
        .collect();
    Value::Object(media)
}

fn build_security(requirements: &[SecurityRequirement]) -> Value {
    Value::Array(
        requirements
            .iter()
            .map(|req| {
                let obj: Map<String, Value> = req
                    .iter()
                    .map(|(scheme, scopes)| (scheme.clone(), json!(scopes)))
                    .collect();
                Value::Object(obj)
            })
            .collect(),
    )
}

fn default_description(status: StatusKey) -> &'static str {
    match status {
        StatusKey::Code(200..=299) | StatusKey::Range(2) => "OK",
        StatusKey::Code(300..=399) | StatusKey::Range(3) => "Redirect",
        StatusKey::Code(400..=499) | StatusKey::Range(4) => "Client error",
        StatusKey::Code(500..=599) | StatusKey::Range(5) => "Server error",
        StatusKey::Code(_) | StatusKey::Range(_) => "Informational",
        StatusKey::Default => "Default response",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::HttpMethod;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[test]
    fn test_build_operation_shape() {
        let mut responses = BTreeMap::new();
        responses.insert(
            StatusKey::Code(404),
            ResponseSpec::new(StatusKey::Code(404)),
        );
        responses.insert(
            StatusKey::Code(200),
            ResponseSpec::new(StatusKey::Code(200))
                .with_json(Schema::reference("Pet"))
                .with_description("The pet"),
        );
        let mut scheme = SecurityRequirement::new();
        scheme.insert("oauth".to_string(), vec!["read".to_string()]);
        let record = OperationRecord {
            path: "/pets/{id}".into(),
            method: HttpMethod::Get,
            operation_id: "getPetsId".into(),
            summary: Some("Get pet".into()),
            description: None,
            tags: vec!["pets".into()],
            parameters: vec![Parameter::path("id", Schema::integer())],
            request_body: None,
            responses,
            security: Some(vec![scheme]),
            deprecated: true,
            openapi_version: None,
            source: None,
            operation_id_derived: false,
        };

        assert_eq!(
            build_operation(&record, &RenderOptions::default()),
            json!({
                "tags": ["pets"],
                "summary": "Get pet",
                "operationId": "getPetsId",
                "parameters": [
                    {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}
                ],
                "responses": {
                    "200": {
                        "description": "The pet",
                        "content": {
                            "application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}
                        }
                    },
                    "404": {"description": "Client error"}
                },
                "deprecated": true,
                "security": [{"oauth": ["read"]}]
            })
        );
        assert_eq!(operation_schemas(&record).len(), 2);
    }
}
