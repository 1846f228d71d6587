//! Integration tests against a real HTTP server.
//!
//! These tests spawn an axum server on a free local port and drive it through
//! `ReqwestTransport`, covering the full materialize/send/judge cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bistool::openapi::{validate_openapi3, Dialect, SpecAssembler};
use bistool::request::{Body, RequestTemplate};
use bistool::runner::{RunContext, TestCase, TestResult, TestRunner};
use bistool::session::{ExtendedSession, SessionManager};
use bistool::store::FileStore;
use bistool::transport::ReqwestTransport;
use bistool::variables::{AuthContext, VariableNamespace};
use http::Method;
use serde_json::{json, Value};

async fn user(Path(id): Path<u64>, headers: HeaderMap) -> Response {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Bearer secret");
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))).into_response();
    }
    Json(json!({"id": id, "name": "Ann", "tags": ["admin", "ops"]})).into_response()
}

async fn search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({"q": params.get("q").cloned().unwrap_or_default()}))
}

async fn echo(headers: HeaderMap, body: String) -> Json<Value> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::String(body));
    Json(json!({"contentType": content_type, "body": parsed}))
}

/// Spawn a test server and return its base URL.
async fn spawn_test_server() -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/users/:id", get(user))
        .route("/search", get(search))
        .route("/echo", post(echo));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(10)).await;

    (format!("http://{addr}"), handle)
}

fn token_namespace() -> VariableNamespace {
    let mut ns = VariableNamespace::default();
    ns.global.insert("token".into(), "secret".into());
    ns
}

#[tokio::test]
async fn partial_match_with_injected_token_passes() {
    let (base, server) = spawn_test_server().await;
    let template = RequestTemplate::from_url(Method::GET, &format!("{base}/users/{{id}}"));
    let ns = token_namespace();
    let auth = AuthContext::default();
    let ctx = RunContext::new(&ns).token(Some(&auth), true);
    let runner = TestRunner::new(ReqwestTransport::new());

    let mut test = TestCase::named("known user")
        .with_path_override("id", "42")
        .expect("200", r#"{"id": 42, "tags": ["ops"]}"#, true);
    let outcome = runner.run_and_record(&mut test, &template, &ctx).await;

    assert_eq!(outcome.result, TestResult::Pass, "{outcome:?}");
    assert_eq!(test.server_status, Some(200));
    assert_eq!(outcome.request_url.as_deref(), Some(format!("{base}/users/42").as_str()));

    server.abort();
}

#[tokio::test]
async fn opting_out_of_the_token_gets_unauthorized() {
    let (base, server) = spawn_test_server().await;
    let template = RequestTemplate::from_url(Method::GET, &format!("{base}/users/{{id}}"));
    let ns = token_namespace();
    let auth = AuthContext::default();
    let ctx = RunContext::new(&ns).token(Some(&auth), true);
    let runner = TestRunner::new(ReqwestTransport::new());

    let mut test = TestCase::named("anonymous")
        .with_path_override("id", "1")
        .expect("401", r#"{"error":"unauthorized"}"#, false);
    test.use_token = Some(false);
    let outcome = runner.run(&test, &template, &ctx).await;

    assert_eq!(outcome.result, TestResult::Pass, "{outcome:?}");
    assert_eq!(outcome.server_status, 401);

    server.abort();
}

#[tokio::test]
async fn query_overrides_are_encoded() {
    let (base, server) = spawn_test_server().await;
    let template = RequestTemplate::from_url(Method::GET, &format!("{base}/search?q=default"));
    let ns = VariableNamespace::default();
    let runner = TestRunner::new(ReqwestTransport::new());

    let test = TestCase::named("search")
        .with_query_override("q", "a b&c")
        .expect("200", r#"{"q": "a b&c"}"#, false);
    let outcome = runner.run(&test, &template, &RunContext::new(&ns)).await;

    assert_eq!(outcome.result, TestResult::Pass, "{outcome:?}");

    server.abort();
}

#[tokio::test]
async fn json_body_override_is_sent_as_json() {
    let (base, server) = spawn_test_server().await;
    let template = RequestTemplate::from_url(Method::POST, &format!("{base}/echo"))
        .with_body(Body::Json(r#"{"name": "template"}"#.into()));
    let ns = VariableNamespace::default();
    let runner = TestRunner::new(ReqwestTransport::new());

    let mut test = TestCase::named("override").expect(
        "200",
        r#"{"contentType": "application/json", "body": {"name": "override"}}"#,
        true,
    );
    test.body_override = Some(r#"{"name": "override"}"#.into());
    let outcome = runner.run(&test, &template, &RunContext::new(&ns)).await;

    assert_eq!(outcome.result, TestResult::Pass, "{outcome:?}");

    server.abort();
}

#[tokio::test]
async fn unreachable_server_fails_with_status_zero() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let template = RequestTemplate::from_url(Method::GET, &format!("http://127.0.0.1:{port}/nothing"));
    let ns = VariableNamespace::default();
    let runner = TestRunner::new(ReqwestTransport::new());

    let outcome = runner.run(&TestCase::new(), &template, &RunContext::new(&ns)).await;

    assert_eq!(outcome.result, TestResult::Fail);
    assert_eq!(outcome.server_status, 0);
    assert!(outcome.error.is_some());
}

#[tokio::test]
async fn live_sample_feeds_a_valid_openapi_document() {
    let (base, server) = spawn_test_server().await;
    let template = RequestTemplate::from_url(Method::GET, &format!("{base}/users/{{id}}"));
    let mut ns = token_namespace();
    ns.segment.insert("id".into(), "7".into());
    let auth = AuthContext::default();
    let ctx = RunContext::new(&ns).token(Some(&auth), true);
    let runner = TestRunner::new(ReqwestTransport::new());

    let sample = runner.fetch_sample(&template, &ctx).await.unwrap();
    let yaml = SpecAssembler::new(Dialect::OpenApi3, &template)
        .variables(&ns, "")
        .sample(sample.body())
        .assemble();

    assert!(yaml.contains("tags:"));
    assert!(yaml.contains("example: \"Ann\""));
    let doc = validate_openapi3(&yaml).unwrap();
    assert!(doc.paths.paths.contains_key("/users/{id}"));

    server.abort();
}

#[tokio::test]
async fn session_results_survive_a_reopen() {
    let (base, server) = spawn_test_server().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));

    let mut manager = SessionManager::open(Arc::clone(&store), "live").unwrap();
    manager.set_global_variable("token", "secret").unwrap();
    let mut session = ExtendedSession::from_request("Get user", Method::GET, &format!("{base}/users/{{id}}"));
    session.include_token = true;
    let id = manager.save_session(session).unwrap();
    manager
        .add_test(&id, TestCase::named("42").with_path_override("id", "42").expect("200", r#"{"id":42}"#, true))
        .unwrap();

    let summary = manager
        .run_tests(&id, &TestRunner::new(ReqwestTransport::new()))
        .await
        .unwrap();
    assert!(summary.all_passed(), "{summary:?}");

    let reopened = SessionManager::open(Arc::clone(&store), "live").unwrap();
    let test = &reopened.session(&id).unwrap().tests[0];
    assert_eq!(test.result, TestResult::Pass);
    assert_eq!(test.server_status, Some(200));

    server.abort();
}
