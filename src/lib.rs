//! # bistool - API Documentation and Regression Testing from Real Requests
//!
//! bistool turns a request you already know works into API documentation and a
//! small regression suite. Paste a URL, add headers and a body, capture (or paste)
//! a response, and get a ready-to-publish description in one of three YAML
//! dialects. Save the request as a session and attach tests that re-run it with
//! different inputs and check what comes back.
//!
//! ## Key Features
//!
//! - 📝 **Schema inference** - Derive a response schema from any JSON sample
//! - 📋 **Three output dialects** - Legacy `0.9.7.1`, Swagger 2.0 and OpenAPI 3.0
//! - 🔄 **Layered variables** - `{name}` placeholders resolved from global, segment and session values, per environment
//! - ✅ **Regression tests** - Override path, query and body values; match status and full or partial JSON
//! - 💾 **Sessions** - Projects persisted as one JSON document, with import and export
//!
//! ## Generating a Spec
//!
//! ```rust
//! use bistool::openapi::{Dialect, ResponseCondition, SpecAssembler, SpecMeta};
//! use bistool::request::RequestTemplate;
//! use bistool::variables::VariableNamespace;
//! use http::Method;
//! use serde_json::json;
//!
//! let template = RequestTemplate::from_url(Method::GET, "https://{host}/users/{id}?expand=true");
//!
//! let mut variables = VariableNamespace::default();
//! variables.global.insert("host".into(), "api.example.com".into());
//!
//! let sample = json!({"id": 7, "name": "Ann", "roles": ["admin"]});
//! let conditions = [ResponseCondition::new("404", "User not found")];
//!
//! let yaml = SpecAssembler::new(Dialect::OpenApi3, &template)
//!     .variables(&variables, "")
//!     .sample(Some(&sample))
//!     .conditions(&conditions)
//!     .meta(SpecMeta::new("Get user", "Users", "Fetch one user by id"))
//!     .assemble();
//!
//! assert!(yaml.contains("https://api.example.com"));
//! assert!(yaml.contains("'404':"));
//! assert!(bistool::openapi::validate_openapi3(&yaml).is_ok());
//! ```
//!
//! ## Inferring a Schema
//!
//! ```rust
//! use bistool::schema::infer_schema;
//! use serde_json::json;
//!
//! let schema = infer_schema(Some(&json!({"ok": true})), "");
//! assert_eq!(schema, "type: object\nproperties:\n  ok:\n    type: boolean\n    example: true\n");
//! ```
//!
//! ## Running Tests
//!
//! Tests run over any [`Transport`](transport::Transport); [`ReqwestTransport`](transport::ReqwestTransport)
//! is the real one.
//!
//! ```rust,no_run
//! use bistool::request::RequestTemplate;
//! use bistool::runner::{RunContext, TestCase, TestRunner};
//! use bistool::transport::ReqwestTransport;
//! use bistool::variables::VariableNamespace;
//! use http::Method;
//!
//! # async fn run() {
//! let template = RequestTemplate::from_url(Method::GET, "https://api.example.com/users/{id}");
//! let mut test = TestCase::named("existing user")
//!     .with_path_override("id", "42")
//!     .expect("200", r#"{"id": 42}"#, true);
//!
//! let variables = VariableNamespace::default();
//! let runner = TestRunner::new(ReqwestTransport::new());
//! let outcome = runner.run_and_record(&mut test, &template, &RunContext::new(&variables)).await;
//! println!("{:?} ({})", outcome.result, outcome.server_status);
//! # }
//! ```
//!
//! ## Sessions
//!
//! [`SessionManager`](session::SessionManager) owns a project's state and saves
//! it through a [`SessionStore`](store::SessionStore) after every change:
//!
//! ```rust
//! use bistool::session::{ExtendedSession, SessionManager};
//! use bistool::store::MemoryStore;
//! use http::Method;
//!
//! let mut manager = SessionManager::open(MemoryStore::new(), "demo").unwrap();
//! let session = ExtendedSession::from_request("Health", Method::GET, "https://api.example.com/health");
//! let id = manager.save_session(session).unwrap();
//!
//! let yaml = manager.generate_spec(&id, None, None).unwrap();
//! assert!(yaml.starts_with("openapi: 3.0.0"));
//! ```
//!
//! ## Error Handling
//!
//! Spec generation never fails and test runs always produce an outcome; see
//! [`error`] for the errors returned by parsing, persistence and validation.

pub mod error;
pub mod matching;
pub mod openapi;
pub mod request;
pub mod runner;
pub mod schema;
pub mod session;
pub mod store;
pub mod transfer;
pub mod transport;
pub mod variables;

pub use error::{MatchError, RunError, SessionError, SpecError, StoreError, TransportError};
pub use openapi::{Dialect, ResponseCondition, ResponseSample, SpecAssembler, SpecMeta};
pub use request::RequestTemplate;
pub use runner::{TestCase, TestOutcome, TestResult, TestRunner};
pub use session::{ExtendedSession, ProjectState, SessionManager};
pub use store::{FileStore, MemoryStore, SessionStore};
pub use transport::{ReqwestTransport, Transport};
pub use variables::{AuthContext, VariableNamespace};

// Re-exported so callers can build samples without a direct dependency.
pub use serde_json;
