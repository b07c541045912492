#![deny(missing_docs)]

//! # Declaration Context
//!
//! A strictly nested stack of declaration frames:
//!
//! ```text
//! group* → path → method → response
//! ```
//!
//! Only the active chain exists. Each frame accumulates the metadata of its
//! level; closing a frame folds it into its parent, and closing a method frame
//! commits a finalized [`OperationRecord`] to the store.
//!
//! The stack is a `Vec`; a [`FrameHandle`] is the frame's depth, so the current
//! path through the declaration tree is just the vector itself.

use crate::config::OpenApiVersion;
use crate::declare::naming::{derive_operation_id, join_paths, template_params};
use crate::declare::store::OperationMetadataStore;
use crate::declare::{
    HeaderSpec, HttpMethod, OperationRecord, ParamLocation, Parameter, RequestBodySpec,
    ResponseSpec, SecurityRequirement, StatusKey,
};
use crate::error::{AppError, AppResult};
use crate::schema::Schema;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// The four frame levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// A group of paths (describe block).
    Group,
    /// A path template.
    Path,
    /// An HTTP method on the enclosing path.
    Method,
    /// One response of the enclosing method.
    Response,
}

impl FrameKind {
    fn may_nest_under(self, parent: Option<FrameKind>) -> bool {
        matches!(
            (self, parent),
            (FrameKind::Group, None | Some(FrameKind::Group))
                | (FrameKind::Path, None | Some(FrameKind::Group))
                | (FrameKind::Method, Some(FrameKind::Path))
                | (FrameKind::Response, Some(FrameKind::Method))
        )
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrameKind::Group => "group",
            FrameKind::Path => "path",
            FrameKind::Method => "method",
            FrameKind::Response => "response",
        })
    }
}

/// Metadata shared by every operation declared inside a group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupFrame {
    /// Display name.
    pub name: String,
    /// Prepended to every nested path template.
    pub path_prefix: String,
    /// Tags inherited by nested methods.
    pub tags: Vec<String>,
    /// Security inherited by nested methods that declare none.
    pub security: Option<Vec<SecurityRequirement>>,
    /// Declaring test file inherited by nested methods.
    pub source: Option<String>,
}

/// A path template and its path-level parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathFrame {
    /// Template relative to the enclosing groups.
    pub template: String,
    /// Parameters shared by every method on this path.
    pub parameters: Vec<Parameter>,
}

/// Operation metadata accumulated while a method is open.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodFrame {
    /// HTTP method.
    pub method: HttpMethod,
    /// Declared operation id.
    pub operation_id: Option<String>,
    /// Summary.
    pub summary: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Tags declared on the method itself.
    pub tags: Vec<String>,
    /// Method-level parameters.
    pub parameters: Vec<Parameter>,
    /// Request body.
    pub request_body: Option<RequestBodySpec>,
    /// Responses closed so far.
    pub responses: BTreeMap<StatusKey, ResponseSpec>,
    /// Security requirements.
    pub security: Option<Vec<SecurityRequirement>>,
    /// Deprecated flag.
    pub deprecated: bool,
    /// Pinned OpenAPI version.
    pub openapi_version: Option<OpenApiVersion>,
    /// Declaring test file.
    pub source: Option<String>,
}

impl MethodFrame {
    /// An empty method frame.
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            operation_id: None,
            summary: None,
            description: None,
            tags: Vec::new(),
            parameters: Vec::new(),
            request_body: None,
            responses: BTreeMap::new(),
            security: None,
            deprecated: false,
            openapi_version: None,
            source: None,
        }
    }
}

/// One level of the declaration stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// See [`GroupFrame`].
    Group(GroupFrame),
    /// See [`PathFrame`].
    Path(PathFrame),
    /// See [`MethodFrame`].
    Method(MethodFrame),
    /// A response being declared.
    Response(ResponseSpec),
}

impl Frame {
    /// A group with a name and a path prefix (may be empty).
    pub fn group(name: impl Into<String>, path_prefix: impl Into<String>) -> Self {
        Frame::Group(GroupFrame {
            name: name.into(),
            path_prefix: path_prefix.into(),
            ..GroupFrame::default()
        })
    }

    /// A path template.
    pub fn path(template: impl Into<String>) -> Self {
        Frame::Path(PathFrame {
            template: template.into(),
            parameters: Vec::new(),
        })
    }

    /// An HTTP method.
    pub fn method(method: HttpMethod) -> Self {
        Frame::Method(MethodFrame::new(method))
    }

    /// A response for the given status key.
    pub fn response(status: impl Into<StatusKey>) -> Self {
        Frame::Response(ResponseSpec::new(status.into()))
    }

    /// The frame's level.
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Group(_) => FrameKind::Group,
            Frame::Path(_) => FrameKind::Path,
            Frame::Method(_) => FrameKind::Method,
            Frame::Response(_) => FrameKind::Response,
        }
    }
}

/// Identifies an open frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle {
    depth: usize,
    kind: FrameKind,
}

impl FrameHandle {
    /// Level of the frame.
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Position in the stack (0 = outermost).
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} frame at depth {}", self.kind, self.depth)
    }
}

/// The active declaration chain.
#[derive(Debug, Clone, Default)]
pub struct DeclarationContext {
    frames: Vec<Frame>,
}

impl DeclarationContext {
    /// An empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// True when no frame is open.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drops every open frame without committing anything.
    pub fn reset(&mut self) {
        if !self.frames.is_empty() {
            debug!(depth = self.frames.len(), "Discarding open declaration frames");
        }
        self.frames.clear();
    }

    /// Pushes a frame after checking the nesting rules.
    pub fn enter(&mut self, frame: Frame) -> AppResult<FrameHandle> {
        let kind = frame.kind();
        let top = self.frames.last().map(Frame::kind);
        if !kind.may_nest_under(top) {
            return Err(AppError::InvalidNesting {
                kind: kind.to_string(),
                top: top.map_or_else(|| "top level".to_string(), |k| k.to_string()),
            });
        }
        let handle = FrameHandle {
            depth: self.frames.len(),
            kind,
        };
        self.frames.push(frame);
        Ok(handle)
    }

    /// Opens a group.
    pub fn enter_group(
        &mut self,
        name: impl Into<String>,
        path_prefix: impl Into<String>,
    ) -> AppResult<FrameHandle> {
        self.enter(Frame::group(name, path_prefix))
    }

    /// Opens a path.
    pub fn enter_path(&mut self, template: impl Into<String>) -> AppResult<FrameHandle> {
        self.enter(Frame::path(template))
    }

    /// Opens a method.
    pub fn enter_method(&mut self, method: HttpMethod) -> AppResult<FrameHandle> {
        self.enter(Frame::method(method))
    }

    /// Opens a response.
    pub fn enter_response(&mut self, status: impl Into<StatusKey>) -> AppResult<FrameHandle> {
        self.enter(Frame::response(status))
    }

    /// The top frame.
    pub fn current(&self) -> AppResult<&Frame> {
        self.frames.last().ok_or(AppError::NoActiveContext)
    }

    /// Closes the top frame: responses fold into their method, methods are
    /// committed to `store`, paths and groups are discarded.
    pub fn exit(&mut self, store: &mut OperationMetadataStore) -> AppResult<FrameKind> {
        let frame = self.frames.pop().ok_or(AppError::NoActiveContext)?;
        let kind = frame.kind();
        match frame {
            Frame::Response(response) => {
                if let Some(Frame::Method(method)) = self.frames.last_mut() {
                    if method.responses.contains_key(&response.status) {
                        debug!(status = %response.status, "Response re-declared, previous replaced");
                    }
                    method.responses.insert(response.status, response);
                }
            }
            Frame::Method(method) => {
                let record = self.finalize(method);
                store.commit(record);
            }
            Frame::Path(_) | Frame::Group(_) => {}
        }
        Ok(kind)
    }

    /// Closes the frame identified by `handle`, which must be on top.
    pub fn exit_frame(
        &mut self,
        handle: FrameHandle,
        store: &mut OperationMetadataStore,
    ) -> AppResult<()> {
        let top = self.frames.len().checked_sub(1).ok_or(AppError::NoActiveContext)?;
        if top != handle.depth || self.frames[top].kind() != handle.kind {
            return Err(AppError::FrameMismatch {
                expected: handle.to_string(),
                found: format!("{} frame at depth {}", self.frames[top].kind(), top),
            });
        }
        self.exit(store).map(|_| ())
    }

    /// Closes every frame above `handle` and then `handle` itself.
    ///
    /// Used on abnormal exits; returns the number of frames closed.
    pub fn unwind_to(&mut self, handle: FrameHandle, store: &mut OperationMetadataStore) -> usize {
        let mut closed = 0;
        while self.frames.len() > handle.depth {
            if self.exit(store).is_err() {
                break;
            }
            closed += 1;
        }
        closed
    }

    // ---- Declaration calls ----

    /// Sets the operation id of the open method.
    pub fn set_operation_id(&mut self, id: impl Into<String>) -> AppResult<()> {
        self.method_mut("operation_id")?.operation_id = Some(id.into());
        Ok(())
    }

    /// Sets the summary of the open method.
    pub fn set_summary(&mut self, summary: impl Into<String>) -> AppResult<()> {
        self.method_mut("summary")?.summary = Some(summary.into());
        Ok(())
    }

    /// Sets the description of the open method or response.
    pub fn set_description(&mut self, description: impl Into<String>) -> AppResult<()> {
        let description = Some(description.into());
        match self.frames.last_mut() {
            Some(Frame::Method(m)) => m.description = description,
            Some(Frame::Response(r)) => r.description = description,
            other => return Err(missing("description", "method or response", other)),
        }
        Ok(())
    }

    /// Adds tags to the open method or group. Duplicates are ignored.
    pub fn add_tags<I, S>(&mut self, tags: I) -> AppResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let target = match self.frames.last_mut() {
            Some(Frame::Method(m)) => &mut m.tags,
            Some(Frame::Group(g)) => &mut g.tags,
            other => return Err(missing("tags", "method or group", other)),
        };
        for tag in tags {
            let tag = tag.into();
            if !target.contains(&tag) {
                target.push(tag);
            }
        }
        Ok(())
    }

    /// Adds a parameter to the open method or path.
    pub fn add_parameter(&mut self, parameter: Parameter) -> AppResult<()> {
        match self.frames.last_mut() {
            Some(Frame::Method(m)) => m.parameters.push(parameter),
            Some(Frame::Path(p)) => p.parameters.push(parameter),
            other => return Err(missing("parameter", "method or path", other)),
        }
        Ok(())
    }

    /// Sets the request body of the open method.
    pub fn set_request_body(&mut self, body: RequestBodySpec) -> AppResult<()> {
        self.method_mut("request_body")?.request_body = Some(body);
        Ok(())
    }

    /// Sets security requirements on the open method or group.
    pub fn set_security(&mut self, requirements: Vec<SecurityRequirement>) -> AppResult<()> {
        match self.frames.last_mut() {
            Some(Frame::Method(m)) => m.security = Some(requirements),
            Some(Frame::Group(g)) => g.security = Some(requirements),
            other => return Err(missing("security", "method or group", other)),
        }
        Ok(())
    }

    /// Marks the open method deprecated.
    pub fn set_deprecated(&mut self) -> AppResult<()> {
        self.method_mut("deprecated")?.deprecated = true;
        Ok(())
    }

    /// Pins the OpenAPI version the open method must be rendered with.
    pub fn require_openapi_version(&mut self, version: OpenApiVersion) -> AppResult<()> {
        self.method_mut("openapi_version")?.openapi_version = Some(version);
        Ok(())
    }

    /// Records the declaring test file on the open method or group.
    pub fn set_source(&mut self, file: impl Into<String>) -> AppResult<()> {
        let file = Some(file.into());
        match self.frames.last_mut() {
            Some(Frame::Method(m)) => m.source = file,
            Some(Frame::Group(g)) => g.source = file,
            other => return Err(missing("source", "method or group", other)),
        }
        Ok(())
    }

    /// Adds a media type to the open response.
    pub fn add_content(&mut self, media_type: impl Into<String>, schema: Schema) -> AppResult<()> {
        self.response_mut("content")?
            .content
            .insert(media_type.into(), schema);
        Ok(())
    }

    /// Adds a header to the open response.
    pub fn add_header(&mut self, name: impl Into<String>, header: HeaderSpec) -> AppResult<()> {
        self.response_mut("header")?
            .headers
            .insert(name.into(), header);
        Ok(())
    }

    fn method_mut(&mut self, call: &str) -> AppResult<&mut MethodFrame> {
        match self.frames.last_mut() {
            Some(Frame::Method(m)) => Ok(m),
            other => Err(missing(call, "method", other)),
        }
    }

    fn response_mut(&mut self, call: &str) -> AppResult<&mut ResponseSpec> {
        match self.frames.last_mut() {
            Some(Frame::Response(r)) => Ok(r),
            other => Err(missing(call, "response", other)),
        }
    }

    /// Builds the record for a method that was just popped; the remaining
    /// frames are its path and enclosing groups.
    fn finalize(&self, method: MethodFrame) -> OperationRecord {
        let mut prefix = String::new();
        let mut template = "";
        let mut tags: Vec<String> = Vec::new();
        let mut security = None;
        let mut source = None;
        let mut parameters: Vec<Parameter> = Vec::new();

        for frame in &self.frames {
            match frame {
                Frame::Group(g) => {
                    prefix = join_paths(&prefix, &g.path_prefix);
                    for tag in &g.tags {
                        if !tags.contains(tag) {
                            tags.push(tag.clone());
                        }
                    }
                    if g.security.is_some() {
                        security = g.security.clone();
                    }
                    if g.source.is_some() {
                        source = g.source.clone();
                    }
                }
                Frame::Path(p) => {
                    template = &p.template;
                    parameters.extend(p.parameters.iter().cloned());
                }
                Frame::Method(_) | Frame::Response(_) => {}
            }
        }

        let path = join_paths(&prefix, template);
        for param in method.parameters {
            match parameters
                .iter_mut()
                .find(|p| p.name == param.name && p.location == param.location)
            {
                Some(existing) => *existing = param,
                None => parameters.push(param),
            }
        }
        for name in template_params(&path) {
            let declared = parameters
                .iter()
                .any(|p| p.name == name && p.location == ParamLocation::Path);
            if !declared {
                parameters.push(Parameter::path(name, Schema::string()));
            }
        }
        for tag in method.tags {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let operation_id_derived = method.operation_id.is_none();
        OperationRecord {
            operation_id: method
                .operation_id
                .unwrap_or_else(|| derive_operation_id(method.method, &path)),
            operation_id_derived,
            path,
            method: method.method,
            summary: method.summary,
            description: method.description,
            tags,
            parameters,
            request_body: method.request_body,
            responses: method.responses,
            security: method.security.or(security),
            deprecated: method.deprecated,
            openapi_version: method.openapi_version,
            source: method.source.or(source),
        }
    }
}

fn missing(call: &str, expected: &str, found: Option<&mut Frame>) -> AppError {
    AppError::MissingContext {
        call: call.to_string(),
        expected: expected.to_string(),
        found: found.map_or_else(|| "nothing".to_string(), |f| f.kind().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_rules() {
        let mut ctx = DeclarationContext::new();
        let err = ctx.enter_method(HttpMethod::Get).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidNesting { ref kind, ref top } if kind == "method" && top == "top level"
        ));

        ctx.enter_group("Users", "/users").unwrap();
        ctx.enter_group("Admin", "/admin").unwrap();
        let err = ctx.enter_response(200u16).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid nesting: cannot open response inside group"
        );
        ctx.enter_path("/{id}").unwrap();
        assert!(ctx.enter_path("/again").is_err());
        ctx.enter_method(HttpMethod::Get).unwrap();
        assert!(ctx.enter_method(HttpMethod::Post).is_err());
        ctx.enter_response(200u16).unwrap();
        assert!(ctx.enter_response(201u16).is_err());
        assert_eq!(ctx.depth(), 5);
    }

    #[test]
    fn test_exit_on_empty_stack_is_named_error() {
        let mut ctx = DeclarationContext::new();
        let mut store = OperationMetadataStore::default();
        assert!(matches!(ctx.exit(&mut store), Err(AppError::NoActiveContext)));
        assert!(matches!(ctx.current(), Err(AppError::NoActiveContext)));
    }

    #[test]
    fn test_method_exit_commits_record() {
        let mut ctx = DeclarationContext::new();
        let mut store = OperationMetadataStore::default();

        ctx.enter_group("Users", "/api").unwrap();
        ctx.add_tags(["users"]).unwrap();
        ctx.enter_path("/users/{id}").unwrap();
        ctx.enter_method(HttpMethod::Get).unwrap();
        ctx.set_summary("Fetch a user").unwrap();
        ctx.add_parameter(Parameter::query("expand", Schema::boolean()))
            .unwrap();
        ctx.enter_response(200u16).unwrap();
        ctx.add_content("application/json", Schema::reference("User"))
            .unwrap();
        assert_eq!(ctx.exit(&mut store).unwrap(), FrameKind::Response);
        assert!(store.is_empty());
        assert_eq!(ctx.exit(&mut store).unwrap(), FrameKind::Method);

        let record = store.get("/api/users/{id}", HttpMethod::Get).unwrap();
        assert_eq!(record.operation_id, "getApiUsersId");
        assert_eq!(record.summary.as_deref(), Some("Fetch a user"));
        assert_eq!(record.tags, vec!["users"]);
        assert_eq!(record.parameters.len(), 2);
        assert_eq!(record.parameters[1].name, "id");
        assert_eq!(record.parameters[1].location, ParamLocation::Path);
        assert!(record.parameters[1].required);
        assert!(record.responses.contains_key(&StatusKey::Code(200)));

        ctx.exit(&mut store).unwrap();
        ctx.exit(&mut store).unwrap();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_declaration_calls_need_matching_frame() {
        let mut ctx = DeclarationContext::new();
        let err = ctx.set_summary("orphan").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing context: summary requires an active method (found nothing)"
        );

        ctx.enter_path("/pets").unwrap();
        assert!(matches!(
            ctx.add_content("application/json", Schema::string()),
            Err(AppError::MissingContext { .. })
        ));
        assert!(ctx.add_parameter(Parameter::query("q", Schema::string())).is_ok());
    }

    #[test]
    fn test_method_settings_override_group() {
        let mut ctx = DeclarationContext::new();
        let mut store = OperationMetadataStore::default();
        let mut scheme = SecurityRequirement::new();
        scheme.insert("bearer".to_string(), vec![]);

        ctx.enter_group("Pets", "").unwrap();
        ctx.set_security(vec![scheme.clone()]).unwrap();
        ctx.set_source("tests/pets.rs").unwrap();
        ctx.enter_path("/pets").unwrap();
        ctx.enter_method(HttpMethod::Get).unwrap();
        ctx.set_operation_id("listPets").unwrap();
        ctx.exit(&mut store).unwrap();
        ctx.enter_method(HttpMethod::Post).unwrap();
        ctx.set_security(vec![]).unwrap();
        ctx.exit(&mut store).unwrap();

        let get = store.get("/pets", HttpMethod::Get).unwrap();
        assert_eq!(get.operation_id, "listPets");
        assert_eq!(get.security, Some(vec![scheme]));
        assert_eq!(get.source.as_deref(), Some("tests/pets.rs"));
        let post = store.get("/pets", HttpMethod::Post).unwrap();
        assert_eq!(post.security, Some(vec![]));
    }

    #[test]
    fn test_redeclaration_keeps_declared_operation_id() {
        let mut ctx = DeclarationContext::new();
        let mut store = OperationMetadataStore::default();

        ctx.enter_path("/pets").unwrap();
        ctx.enter_method(HttpMethod::Get).unwrap();
        ctx.set_operation_id("listPets").unwrap();
        ctx.enter_response(200u16).unwrap();
        ctx.exit(&mut store).unwrap();
        ctx.exit(&mut store).unwrap();

        ctx.enter_method(HttpMethod::Get).unwrap();
        ctx.enter_response(404u16).unwrap();
        ctx.exit(&mut store).unwrap();
        ctx.exit(&mut store).unwrap();

        let get = store.get("/pets", HttpMethod::Get).unwrap();
        assert_eq!(get.operation_id, "listPets");
        assert!(!get.operation_id_derived);
        assert_eq!(get.responses.len(), 2);

        ctx.enter_method(HttpMethod::Get).unwrap();
        ctx.set_operation_id("fetchPets").unwrap();
        ctx.exit(&mut store).unwrap();
        assert_eq!(store.get("/pets", HttpMethod::Get).unwrap().operation_id, "fetchPets");
    }

    #[test]
    fn test_exit_frame_checks_handle() {
        let mut ctx = DeclarationContext::new();
        let mut store = OperationMetadataStore::default();
        let path = ctx.enter_path("/pets").unwrap();
        let method = ctx.enter_method(HttpMethod::Get).unwrap();

        let err = ctx.exit_frame(path, &mut store).unwrap_err();
        assert!(matches!(err, AppError::FrameMismatch { .. }));
        assert_eq!(ctx.depth(), 2);

        ctx.exit_frame(method, &mut store).unwrap();
        ctx.exit_frame(path, &mut store).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unwind_closes_and_commits() {
        let mut ctx = DeclarationContext::new();
        let mut store = OperationMetadataStore::default();
        let group = ctx.enter_group("G", "/g").unwrap();
        ctx.enter_path("/x").unwrap();
        ctx.enter_method(HttpMethod::Delete).unwrap();
        ctx.enter_response(StatusKey::Default).unwrap();

        assert_eq!(ctx.unwind_to(group, &mut store), 4);
        assert!(ctx.is_empty());
        let record = store.get("/g/x", HttpMethod::Delete).unwrap();
        assert!(record.responses.contains_key(&StatusKey::Default));
    }
}
