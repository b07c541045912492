#![deny(missing_docs)]

//! # Spec Session
//!
//! The caller-owned state of one test run: configuration, schema registry,
//! operation store and declaration stack, with closure-scoped declarations.
//!
//! ```
//! use declspec_core::{HttpMethod, Schema, SpecSession};
//!
//! let mut session = SpecSession::default();
//! session.register_schema("Pet", Schema::object().required_property("id", Schema::integer()));
//! session
//!     .path("/pets", |s| {
//!         s.method(HttpMethod::Get, |s| {
//!             s.summary("List pets")?;
//!             s.response(200u16, |s| s.json_content(Schema::array(Schema::reference("Pet"))))
//!         })
//!     })
//!     .unwrap();
//!
//! let assembly = session.assemble().unwrap();
//! assert_eq!(assembly.documents[0].paths(), vec!["/pets"]);
//! ```
//!
//! Nothing here is reset implicitly; call [`SpecSession::reset`] between
//! independent runs.

use crate::assemble::{Assembly, SpecAssembler};
use crate::config::{EngineConfig, OpenApiVersion};
use crate::declare::{
    CommitOutcome, DeclarationContext, Frame, FrameHandle, FrameKind, HeaderSpec, HttpMethod,
    OperationMetadataStore, OperationRecord, Parameter, RequestBodySpec, SecurityRequirement,
    StatusKey,
};
use crate::error::{AppError, AppResult};
use crate::output::write_documents;
use crate::response::{CapturedResponse, ExtendedMetadata, ResponseValidator};
use crate::schema::{Schema, SchemaRegistry, ValidationOptions, ValidationResult};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

/// Process state for declaring, assembling and validating.
#[derive(Debug, Default)]
pub struct SpecSession {
    config: EngineConfig,
    registry: SchemaRegistry,
    store: OperationMetadataStore,
    context: DeclarationContext,
}

/// Closes its frame if the declaration body unwinds.
struct ScopeGuard<'s> {
    session: &'s mut SpecSession,
    handle: FrameHandle,
    armed: bool,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(frame = %self.handle, "Closing declaration frame during unwind");
            let SpecSession { context, store, .. } = &mut *self.session;
            context.unwind_to(self.handle, store);
        }
    }
}

impl SpecSession {
    /// A session with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        let store = OperationMetadataStore::new(config.commit_policy);
        Self {
            config,
            registry: SchemaRegistry::new(),
            store,
            context: DeclarationContext::new(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Mutable schema registry.
    pub fn registry_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.registry
    }

    /// Committed operations.
    pub fn store(&self) -> &OperationMetadataStore {
        &self.store
    }

    /// Declaration stack.
    pub fn context(&self) -> &DeclarationContext {
        &self.context
    }

    /// Clears schemas, operations and open frames.
    pub fn reset(&mut self) {
        info!(
            schemas = self.registry.len(),
            operations = self.store.len(),
            "Resetting session"
        );
        self.registry.clear();
        self.store.clear();
        self.context.reset();
    }

    /// Registers a named schema (last write wins).
    pub fn register_schema(&mut self, name: impl Into<String>, schema: Schema) -> Option<Schema> {
        self.registry.register(name, schema)
    }

    /// Registers a named schema from its JSON form.
    pub fn register_schema_json(&mut self, name: impl Into<String>, raw: &Value) -> AppResult<()> {
        self.registry.register_json(name, raw)
    }

    /// Commits a finished record directly, bypassing the stack.
    pub fn commit_operation(&mut self, record: OperationRecord) -> CommitOutcome {
        self.store.commit(record)
    }

    /// Authoring check over every registered schema.
    pub fn check_schemas(&self) -> ValidationResult {
        self.registry.check()
    }

    // ---- Stack ----

    /// Opens a frame. Prefer the closure-scoped helpers.
    pub fn enter(&mut self, frame: Frame) -> AppResult<FrameHandle> {
        self.context.enter(frame)
    }

    /// Closes the top frame.
    pub fn exit(&mut self) -> AppResult<FrameKind> {
        self.context.exit(&mut self.store)
    }

    /// Runs `body` inside `frame`. The frame is closed on every exit path:
    /// normal return, error return and panic.
    pub fn scope<T>(
        &mut self,
        frame: Frame,
        body: impl FnOnce(&mut SpecSession) -> AppResult<T>,
    ) -> AppResult<T> {
        let handle = self.context.enter(frame)?;
        let mut guard = ScopeGuard {
            session: self,
            handle,
            armed: true,
        };
        let result = body(&mut *guard.session);
        guard.armed = false;

        let session = &mut *guard.session;
        let closed = match session.context.exit_frame(handle, &mut session.store) {
            Err(err @ AppError::FrameMismatch { .. }) => {
                session.context.unwind_to(handle, &mut session.store);
                Err(err)
            }
            other => other,
        };
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Declares a group of paths.
    pub fn group<T>(
        &mut self,
        name: impl Into<String>,
        path_prefix: impl Into<String>,
        body: impl FnOnce(&mut SpecSession) -> AppResult<T>,
    ) -> AppResult<T> {
        self.scope(Frame::group(name, path_prefix), body)
    }

    /// Declares a path.
    pub fn path<T>(
        &mut self,
        template: impl Into<String>,
        body: impl FnOnce(&mut SpecSession) -> AppResult<T>,
    ) -> AppResult<T> {
        self.scope(Frame::path(template), body)
    }

    /// Declares a method on the enclosing path.
    pub fn method<T>(
        &mut self,
        method: HttpMethod,
        body: impl FnOnce(&mut SpecSession) -> AppResult<T>,
    ) -> AppResult<T> {
        self.scope(Frame::method(method), body)
    }

    /// Declares a response of the enclosing method.
    pub fn response<T>(
        &mut self,
        status: impl Into<StatusKey>,
        body: impl FnOnce(&mut SpecSession) -> AppResult<T>,
    ) -> AppResult<T> {
        self.scope(Frame::response(status), body)
    }

    // ---- Declaration calls ----

    /// See [`DeclarationContext::set_operation_id`].
    pub fn operation_id(&mut self, id: impl Into<String>) -> AppResult<()> {
        self.context.set_operation_id(id)
    }

    /// See [`DeclarationContext::set_summary`].
    pub fn summary(&mut self, summary: impl Into<String>) -> AppResult<()> {
        self.context.set_summary(summary)
    }

    /// See [`DeclarationContext::set_description`].
    pub fn description(&mut self, description: impl Into<String>) -> AppResult<()> {
        self.context.set_description(description)
    }

    /// See [`DeclarationContext::add_tags`].
    pub fn tags<I, S>(&mut self, tags: I) -> AppResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context.add_tags(tags)
    }

    /// See [`DeclarationContext::add_parameter`].
    pub fn parameter(&mut self, parameter: Parameter) -> AppResult<()> {
        self.context.add_parameter(parameter)
    }

    /// See [`DeclarationContext::set_request_body`].
    pub fn request_body(&mut self, body: RequestBodySpec) -> AppResult<()> {
        self.context.set_request_body(body)
    }

    /// See [`DeclarationContext::set_security`].
    pub fn security(&mut self, requirements: Vec<SecurityRequirement>) -> AppResult<()> {
        self.context.set_security(requirements)
    }

    /// See [`DeclarationContext::set_deprecated`].
    pub fn deprecated(&mut self) -> AppResult<()> {
        self.context.set_deprecated()
    }

    /// See [`DeclarationContext::require_openapi_version`].
    pub fn require_openapi_version(&mut self, version: OpenApiVersion) -> AppResult<()> {
        self.context.require_openapi_version(version)
    }

    /// See [`DeclarationContext::set_source`].
    pub fn source(&mut self, file: impl Into<String>) -> AppResult<()> {
        self.context.set_source(file)
    }

    /// See [`DeclarationContext::add_content`].
    pub fn content(&mut self, media_type: impl Into<String>, schema: Schema) -> AppResult<()> {
        self.context.add_content(media_type, schema)
    }

    /// Adds an `application/json` media type to the open response.
    pub fn json_content(&mut self, schema: Schema) -> AppResult<()> {
        self.context.add_content("application/json", schema)
    }

    /// See [`DeclarationContext::add_header`].
    pub fn header(&mut self, name: impl Into<String>, header: HeaderSpec) -> AppResult<()> {
        self.context.add_header(name, header)
    }

    // ---- Generation and validation ----

    /// Assembles every configured target.
    pub fn assemble(&self) -> AppResult<Assembly> {
        SpecAssembler::new(&self.config, &self.registry).assemble(&self.store)
    }

    /// Assembles and writes every target under `openapiRoot`.
    ///
    /// Targets that failed assembly are not written; they are reported in the
    /// returned [`Assembly`].
    pub fn write_outputs(&self) -> AppResult<Assembly> {
        let assembly = self.assemble()?;
        write_documents(&self.config.openapi_root, &assembly.documents)?;
        Ok(assembly)
    }

    /// Validates a captured response against the committed operation.
    pub fn validate_response(
        &self,
        method: HttpMethod,
        path: &str,
        response: &CapturedResponse,
        elapsed: Duration,
    ) -> AppResult<ExtendedMetadata> {
        let record = self
            .store
            .get(path, method)
            .ok_or_else(|| AppError::UnknownOperation {
                path: path.to_string(),
                method: method.to_string(),
            })?;
        let options = ValidationOptions {
            no_additional_properties: self.config.no_additional_properties,
        };
        Ok(ResponseValidator::new(&self.registry)
            .with_options(options)
            .validate(record, response, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::CommitPolicy;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn declare_get(session: &mut SpecSession, status: u16) -> AppResult<()> {
        session.path("/pets", |s| {
            s.method(HttpMethod::Get, |s| {
                s.response(status, |s| s.json_content(Schema::string()))
            })
        })
    }

    #[test]
    fn test_scoped_declaration_commits() {
        let mut session = SpecSession::default();
        declare_get(&mut session, 200).unwrap();
        assert!(session.context().is_empty());
        let record = session.store().get("/pets", HttpMethod::Get).unwrap();
        assert!(record.responses.contains_key(&StatusKey::Code(200)));
    }

    #[test]
    fn test_frame_closed_on_error_return() {
        let mut session = SpecSession::default();
        let err = session
            .path("/pets", |s| {
                s.method(HttpMethod::Get, |s| {
                    s.summary("kept")?;
                    s.json_content(Schema::string())
                })
            })
            .unwrap_err();
        assert!(matches!(err, AppError::MissingContext { .. }));
        assert!(session.context().is_empty());
        let record = session.store().get("/pets", HttpMethod::Get).unwrap();
        assert_eq!(record.summary.as_deref(), Some("kept"));
    }

    #[test]
    fn test_frame_closed_on_panic() {
        let mut session = SpecSession::default();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            session
                .path("/boom", |s| {
                    s.method(HttpMethod::Post, |_| -> AppResult<()> { panic!("declaration failed") })
                })
                .ok();
        }));
        assert!(outcome.is_err());
        assert!(session.context().is_empty());
        assert!(session.store().get("/boom", HttpMethod::Post).is_some());
    }

    #[test]
    fn test_invalid_nesting_through_scopes() {
        let mut session = SpecSession::default();
        let err = session
            .method(HttpMethod::Get, |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidNesting { .. }));
        assert!(session.context().is_empty());
    }

    #[test]
    fn test_unbalanced_manual_exit_is_reported() {
        let mut session = SpecSession::default();
        assert!(matches!(session.exit(), Err(AppError::NoActiveContext)));

        let err = session
            .path("/x", |s| {
                s.enter(Frame::method(HttpMethod::Get))?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, AppError::FrameMismatch { .. }));
        assert!(session.context().is_empty());
        assert!(session.store().get("/x", HttpMethod::Get).is_some());
    }

    #[test]
    fn test_commit_policy_from_config() {
        let config = EngineConfig {
            commit_policy: CommitPolicy::Overwrite,
            ..EngineConfig::default()
        };
        let mut session = SpecSession::new(config);
        declare_get(&mut session, 200).unwrap();
        declare_get(&mut session, 201).unwrap();
        let record = session.store().get("/pets", HttpMethod::Get).unwrap();
        assert_eq!(
            record.responses.keys().copied().collect::<Vec<_>>(),
            vec![StatusKey::Code(201)]
        );

        let mut merging = SpecSession::default();
        declare_get(&mut merging, 200).unwrap();
        declare_get(&mut merging, 201).unwrap();
        assert_eq!(
            merging
                .store()
                .get("/pets", HttpMethod::Get)
                .unwrap()
                .responses
                .len(),
            2
        );
    }

    #[test]
    fn test_validate_unknown_operation() {
        let session = SpecSession::default();
        let err = session
            .validate_response(
                HttpMethod::Get,
                "/nope",
                &CapturedResponse::new(200),
                Duration::ZERO,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown operation GET /nope");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = SpecSession::default();
        session.register_schema("Pet", Schema::string());
        declare_get(&mut session, 200).unwrap();
        session.enter(Frame::group("open", "")).unwrap();
        session.reset();
        assert!(session.registry().is_empty());
        assert!(session.store().is_empty());
        assert!(session.context().is_empty());
    }
}
