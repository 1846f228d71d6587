//! Project and session state, and the manager that edits and persists it.
//!
//! A project is one persisted [`ProjectState`] blob. It holds the saved
//! sessions, the session currently being edited, project-wide variables and
//! the token settings. [`SessionManager`] is the only writer: every mutating
//! call validates its input, updates the in-memory state and saves the whole
//! blob through a [`SessionStore`].

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::openapi::{Dialect, ResponseCondition, ResponseSample, SpecAssembler, SpecMeta};
use crate::request::{Body, HeaderParam, QueryParam, RequestTemplate, UrlData};
use crate::runner::{RunContext, SuiteSummary, TestCase, TestRunner};
use crate::store::{validate_project_id, SessionStore};
use crate::transport::Transport;
use crate::variables::{AuthContext, VariableNamespace, Variables};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    /// `0.9.7.1`, `2.0.0` or `3.0.0`; see [`Dialect::from_version`].
    #[serde(default = "default_spec_version")]
    pub spec_version: String,
    /// Suffix tried first when resolving variables.
    #[serde(default)]
    pub environment: String,
    /// Initial token toggle for new sessions.
    #[serde(default)]
    pub include_token: bool,
}

fn default_spec_version() -> String {
    Dialect::OPENAPI3_VERSION.to_string()
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            spec_version: default_spec_version(),
            environment: String::new(),
            include_token: false,
        }
    }
}

impl ProjectSettings {
    pub fn dialect(&self) -> Dialect {
        Dialect::from_version(&self.spec_version)
    }
}

/// UI bookkeeping. Unknown keys are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_session_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sessions {
    #[serde(default)]
    pub active_session: Option<ExtendedSession>,
    #[serde(default)]
    pub saved_sessions: Vec<ExtendedSession>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectVariables {
    /// Shared variables of the session being edited.
    #[serde(default)]
    pub shared: Variables,
    /// Visible to every session of the project.
    #[serde(default)]
    pub global: Variables,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfig {
    #[serde(default = "default_token_name")]
    pub token_name: String,
    #[serde(default = "default_header_name")]
    pub header_name: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_token_name() -> String {
    AuthContext::default().token_name
}

fn default_header_name() -> String {
    AuthContext::default().header_name
}

fn default_scheme() -> String {
    AuthContext::default().scheme
}

impl Default for TokenConfig {
    fn default() -> Self {
        let auth = AuthContext::default();
        Self {
            token_name: auth.token_name,
            header_name: auth.header_name,
            scheme: auth.scheme,
        }
    }
}

impl From<&TokenConfig> for AuthContext {
    fn from(config: &TokenConfig) -> Self {
        let defaults = TokenConfig::default();
        let or_default = |value: &str, fallback: String| {
            if value.trim().is_empty() {
                fallback
            } else {
                value.trim().to_string()
            }
        };
        AuthContext {
            token_name: or_default(&config.token_name, defaults.token_name),
            header_name: or_default(&config.header_name, defaults.header_name),
            scheme: config.scheme.trim().to_string(),
        }
    }
}

/// The persisted blob for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    #[serde(default)]
    pub metadata: ProjectMetadata,
    #[serde(default)]
    pub settings: ProjectSettings,
    #[serde(default)]
    pub app_state: AppState,
    #[serde(default)]
    pub sessions: Sessions,
    #[serde(default)]
    pub variables: ProjectVariables,
    #[serde(default)]
    pub token_config: TokenConfig,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl ProjectState {
    pub fn saved(&self, session_id: &str) -> Option<&ExtendedSession> {
        self.sessions.saved_sessions.iter().find(|s| s.id == session_id)
    }

    /// Saved session with this name, compared trimmed and case-insensitively.
    pub fn saved_by_name(&self, name: &str) -> Option<&ExtendedSession> {
        let name = name.trim();
        self.sessions
            .saved_sessions
            .iter()
            .find(|s| s.name.trim().eq_ignore_ascii_case(name))
    }

    /// Look a session up by id, falling back to its name.
    pub fn find_session(&self, id_or_name: &str) -> Option<&ExtendedSession> {
        self.saved(id_or_name).or_else(|| self.saved_by_name(id_or_name))
    }
}

/// Method, query, headers and body of a session's request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    #[serde(with = "crate::request::method_name")]
    pub method: Method,
    #[serde(default)]
    pub query_params: Vec<QueryParam>,
    #[serde(default)]
    pub headers: Vec<HeaderParam>,
    #[serde(default)]
    pub body: Body,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            method: Method::GET,
            query_params: Vec::new(),
            headers: Vec::new(),
            body: Body::None,
        }
    }
}

/// One saved request with its documentation inputs and tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedSession {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url_data: UrlData,
    #[serde(default)]
    pub request_config: RequestConfig,
    /// Last generated document.
    #[serde(default)]
    pub yaml_output: String,
    #[serde(default)]
    pub segment_variables: Variables,
    #[serde(default)]
    pub shared_variables: Variables,
    #[serde(default)]
    pub response_conditions: Vec<ResponseCondition>,
    #[serde(default)]
    pub include_token: bool,
    #[serde(default)]
    pub tests: Vec<TestCase>,
    /// Pasted JSON used as the response sample when generating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_response: Option<String>,
}

impl ExtendedSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Session for `method url`, with its dynamic segments registered as
    /// empty segment variables.
    pub fn from_request(name: impl Into<String>, method: Method, url: &str) -> Self {
        let mut session = Self::new(name);
        session.set_template(RequestTemplate::from_url(method, url));
        session
    }

    pub fn template(&self) -> RequestTemplate {
        RequestTemplate {
            method: self.request_config.method.clone(),
            url: self.url_data.clone(),
            query_params: self.request_config.query_params.clone(),
            headers: self.request_config.headers.clone(),
            body: self.request_config.body.clone(),
        }
    }

    pub fn set_template(&mut self, template: RequestTemplate) {
        for name in template.url.dynamic_names() {
            self.segment_variables.entry(name.to_string()).or_default();
        }
        self.url_data = template.url;
        self.request_config = RequestConfig {
            method: template.method,
            query_params: template.query_params,
            headers: template.headers,
            body: template.body,
        };
    }

    pub fn meta(&self) -> SpecMeta {
        SpecMeta::new(&self.name, &self.category, &self.description)
    }

    pub fn test(&self, test_id: &str) -> Option<&TestCase> {
        self.tests.iter().find(|t| t.id == test_id)
    }

    /// The pasted custom response, if it is valid JSON.
    pub fn custom_sample(&self) -> Option<ResponseSample> {
        let text = self.custom_response.as_deref()?.trim();
        if text.is_empty() {
            return None;
        }
        match ResponseSample::pasted(text) {
            Ok(sample) => Some(sample),
            Err(err) => {
                warn!(session = %self.id, error = %err, "ignoring unparseable custom response");
                None
            }
        }
    }
}

/// Which layer a variable setter writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableScope {
    Global,
    Shared,
    Segment,
}

/// Edits one project and saves it after every change.
pub struct SessionManager<S> {
    store: S,
    project_id: String,
    state: ProjectState,
    environment_override: Option<String>,
}

impl<S: SessionStore> SessionManager<S> {
    /// Load `project_id` from `store`, starting empty if it has never been saved.
    pub fn open(store: S, project_id: impl Into<String>) -> Result<Self, SessionError> {
        let project_id = project_id.into();
        validate_project_id(&project_id)?;
        let state = store.load(&project_id)?.unwrap_or_default();
        debug!(project = %project_id, sessions = state.sessions.saved_sessions.len(), "project opened");
        Ok(Self {
            store,
            project_id,
            state,
            environment_override: None,
        })
    }

    /// Resolve variables for `environment` instead of the saved setting,
    /// without persisting the change.
    pub fn with_environment(mut self, environment: Option<String>) -> Self {
        self.environment_override = environment;
        self
    }

    /// Environment used for resolution.
    pub fn environment(&self) -> &str {
        self.environment_override
            .as_deref()
            .unwrap_or(&self.state.settings.environment)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply `edit` to the whole project and persist it.
    pub fn update_state<R>(&mut self, edit: impl FnOnce(&mut ProjectState) -> R) -> Result<R, SessionError> {
        let result = edit(&mut self.state);
        self.persist()?;
        Ok(result)
    }

    fn persist(&self) -> Result<(), SessionError> {
        self.store.save(&self.project_id, &self.state)?;
        Ok(())
    }

    pub fn list_sessions(&self) -> &[ExtendedSession] {
        &self.state.sessions.saved_sessions
    }

    pub fn active_session(&self) -> Option<&ExtendedSession> {
        self.state.sessions.active_session.as_ref()
    }

    /// Resolve a saved session by id or name.
    pub fn session(&self, id_or_name: &str) -> Result<&ExtendedSession, SessionError> {
        self.state
            .find_session(id_or_name)
            .ok_or_else(|| SessionError::SessionNotFound(id_or_name.to_string()))
    }

    /// Start editing a blank, unsaved session.
    pub fn new_session(&mut self) -> Result<&ExtendedSession, SessionError> {
        let mut session = ExtendedSession::new("");
        session.include_token = self.state.settings.include_token;
        self.state.variables.shared.clear();
        self.state.sessions.active_session = Some(session);
        self.persist()?;
        Ok(&*self.state.sessions.active_session.get_or_insert_with(Default::default))
    }

    /// Insert or replace a saved session and make it the active one.
    ///
    /// Names must be non-blank and unique among saved sessions.
    pub fn save_session(&mut self, mut session: ExtendedSession) -> Result<String, SessionError> {
        let name = session.name.trim().to_string();
        if name.is_empty() {
            return Err(SessionError::EmptyField("session name"));
        }
        if let Some(existing) = self.state.saved_by_name(&name) {
            if existing.id != session.id {
                return Err(SessionError::DuplicateName(name));
            }
        }
        if session.id.trim().is_empty() {
            session.id = Uuid::new_v4().to_string();
        }
        session.name = name;

        let category = session.category.trim().to_string();
        if !category.is_empty() && !self.state.categories.contains(&category) {
            self.state.categories.push(category);
        }

        let id = session.id.clone();
        let saved = &mut self.state.sessions.saved_sessions;
        match saved.iter_mut().find(|s| s.id == id) {
            Some(slot) => *slot = session.clone(),
            None => saved.push(session.clone()),
        }
        self.state.variables.shared = session.shared_variables.clone();
        self.state.sessions.active_session = Some(session);
        self.state.app_state.last_session_id = Some(id.clone());
        self.persist()?;
        info!(project = %self.project_id, session = %id, "session saved");
        Ok(id)
    }

    /// Copy a saved session into the active slot.
    pub fn load_session(&mut self, id_or_name: &str) -> Result<&ExtendedSession, SessionError> {
        let session = self.session(id_or_name)?.clone();
        self.state.variables.shared = session.shared_variables.clone();
        self.state.app_state.last_session_id = Some(session.id.clone());
        self.state.sessions.active_session = Some(session);
        self.persist()?;
        Ok(&*self.state.sessions.active_session.get_or_insert_with(Default::default))
    }

    pub fn delete_session(&mut self, id_or_name: &str) -> Result<ExtendedSession, SessionError> {
        let id = self.session(id_or_name)?.id.clone();
        let saved = &mut self.state.sessions.saved_sessions;
        let index = saved
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| SessionError::SessionNotFound(id.clone()))?;
        let removed = saved.remove(index);

        if self.active_session().is_some_and(|s| s.id == id) {
            self.state.sessions.active_session = None;
            self.state.variables.shared.clear();
        }
        if self.state.app_state.last_session_id.as_deref() == Some(id.as_str()) {
            self.state.app_state.last_session_id = None;
        }
        self.persist()?;
        info!(project = %self.project_id, session = %id, "session deleted");
        Ok(removed)
    }

    /// Edit a saved session in place, keeping the active copy in step.
    fn edit_session<R>(
        &mut self,
        id_or_name: &str,
        edit: impl FnOnce(&mut ExtendedSession) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        let id = self.session(id_or_name)?.id.clone();
        let session = self
            .state
            .sessions
            .saved_sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SessionError::SessionNotFound(id.clone()))?;
        let result = edit(session)?;
        let updated = session.clone();

        if self.active_session().is_some_and(|s| s.id == id) {
            self.state.variables.shared = updated.shared_variables.clone();
            self.state.sessions.active_session = Some(updated);
        }
        self.persist()?;
        Ok(result)
    }

    pub fn add_test(&mut self, session: &str, mut test: TestCase) -> Result<String, SessionError> {
        if test.id.trim().is_empty() {
            test.id = Uuid::new_v4().to_string();
        }
        let id = test.id.clone();
        self.edit_session(session, |s| {
            s.tests.push(test);
            Ok(())
        })?;
        Ok(id)
    }

    pub fn update_test(&mut self, session: &str, test: TestCase) -> Result<(), SessionError> {
        self.edit_session(session, |s| {
            let slot = s
                .tests
                .iter_mut()
                .find(|t| t.id == test.id)
                .ok_or_else(|| SessionError::TestNotFound(test.id.clone()))?;
            *slot = test;
            Ok(())
        })
    }

    pub fn delete_test(&mut self, session: &str, test_id: &str) -> Result<TestCase, SessionError> {
        self.edit_session(session, |s| {
            let index = s
                .tests
                .iter()
                .position(|t| t.id == test_id)
                .ok_or_else(|| SessionError::TestNotFound(test_id.to_string()))?;
            Ok(s.tests.remove(index))
        })
    }

    /// Set a variable. `session` is ignored for [`VariableScope::Global`].
    pub fn set_variable(
        &mut self,
        scope: VariableScope,
        session: &str,
        key: &str,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(SessionError::EmptyField("variable name"));
        }
        let value = value.into();
        match scope {
            VariableScope::Global => {
                self.state.variables.global.insert(key.to_string(), value);
                self.persist()
            }
            VariableScope::Shared => self.edit_session(session, |s| {
                s.shared_variables.insert(key.to_string(), value);
                Ok(())
            }),
            VariableScope::Segment => self.edit_session(session, |s| {
                s.segment_variables.insert(key.to_string(), value);
                Ok(())
            }),
        }
    }

    pub fn set_global_variable(&mut self, key: &str, value: impl Into<String>) -> Result<(), SessionError> {
        self.set_variable(VariableScope::Global, "", key, value)
    }

    pub fn remove_global_variable(&mut self, key: &str) -> Result<Option<String>, SessionError> {
        let removed = self.state.variables.global.shift_remove(key.trim());
        self.persist()?;
        Ok(removed)
    }

    pub fn set_environment(&mut self, environment: &str) -> Result<(), SessionError> {
        self.state.settings.environment = environment.trim().to_string();
        self.persist()
    }

    /// Returns `false` when the category already existed.
    pub fn add_category(&mut self, name: &str) -> Result<bool, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyField("category"));
        }
        if self.state.categories.iter().any(|c| c == name) {
            return Ok(false);
        }
        self.state.categories.push(name.to_string());
        self.persist()?;
        Ok(true)
    }

    pub fn namespace_for(&self, session: &ExtendedSession) -> VariableNamespace {
        VariableNamespace::new(
            self.state.variables.global.clone(),
            session.shared_variables.clone(),
            session.segment_variables.clone(),
        )
    }

    pub fn auth_context(&self) -> AuthContext {
        AuthContext::from(&self.state.token_config)
    }

    /// Render a session's document and store it as its `yamlOutput`.
    ///
    /// Without an explicit sample the session's pasted custom response is
    /// used; `dialect` overrides the project's spec version.
    pub fn generate_spec(
        &mut self,
        id_or_name: &str,
        sample: Option<&ResponseSample>,
        dialect: Option<Dialect>,
    ) -> Result<String, SessionError> {
        let session = self.session(id_or_name)?;
        let id = session.id.clone();
        let template = session.template();
        let namespace = self.namespace_for(session);
        let auth = self.auth_context();
        let custom = session.custom_sample();
        let sample_body: Option<&Value> = sample.or(custom.as_ref()).and_then(ResponseSample::body);
        let dialect = dialect.unwrap_or_else(|| self.state.settings.dialect());

        let yaml = SpecAssembler::new(dialect, &template)
            .variables(&namespace, self.environment())
            .sample(sample_body)
            .conditions(&session.response_conditions)
            .meta(session.meta())
            .auth(Some(&auth))
            .assemble();

        self.edit_session(&id, |s| {
            s.yaml_output = yaml.clone();
            Ok(())
        })?;
        info!(project = %self.project_id, session = %id, dialect = dialect.version(), "spec generated");
        Ok(yaml)
    }

    /// Run every test of a session, record the results and persist them.
    pub async fn run_tests<T: Transport + Sync>(
        &mut self,
        id_or_name: &str,
        runner: &TestRunner<T>,
    ) -> Result<SuiteSummary, SessionError> {
        let session = self.session(id_or_name)?;
        let id = session.id.clone();
        let template = session.template();
        let namespace = self.namespace_for(session);
        let mut tests = session.tests.clone();
        let include_token = session.include_token;
        let auth = self.auth_context();

        let ctx = RunContext::new(&namespace)
            .environment(self.environment())
            .token(Some(&auth), include_token);
        let summary = runner.run_suite(&mut tests, &template, &ctx).await;

        self.edit_session(&id, |s| {
            for test in tests {
                if let Some(slot) = s.tests.iter_mut().find(|t| t.id == test.id) {
                    *slot = test;
                }
            }
            Ok(())
        })?;
        info!(
            project = %self.project_id,
            session = %id,
            passed = summary.passed,
            failed = summary.failed,
            "tests finished"
        );
        Ok(summary)
    }
}
