//! Error types shared across the crate.
//!
//! Nothing here is fatal. The spec assembler never surfaces errors at all and
//! the test runner folds every error into a failed outcome; these types exist
//! for the layers that do hand errors back to a caller (parsing pasted input,
//! persistence and session validation).

use thiserror::Error;

/// Errors raised while parsing user-supplied JSON or generated YAML.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Other(String),
}

/// Errors raised while turning a template into a concrete outbound request.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid request URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised while comparing an actual response against an expectation.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("response body is not valid JSON: {0}")]
    ActualBody(#[source] serde_json::Error),

    #[error("expected response is not valid JSON: {0}")]
    ExpectedBody(#[source] serde_json::Error),
}

/// Errors raised by a [`SessionStore`](crate::store::SessionStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt project document: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid project id `{0}`: must be 1..=128 chars of [A-Za-z0-9._-]")]
    InvalidProjectId(String),
}

/// Validation and lookup errors for session management.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("a session named `{0}` already exists")]
    DuplicateName(String),

    #[error("session `{0}` not found")]
    SessionNotFound(String),

    #[error("test `{0}` not found")]
    TestNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
