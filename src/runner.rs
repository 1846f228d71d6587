//! Override-based request re-execution and pass/fail judgement.
//!
//! A [`TestCase`] re-runs its session's [`RequestTemplate`] with a handful of
//! overrides (path segments, query values, JSON body) and judges the captured
//! response against an expected status and, optionally, an expected body.
//!
//! Running never returns an error: invalid URLs, network failures and
//! malformed JSON all become a [`TestResult::Fail`] outcome whose captured
//! status is `0`.

use http::header::{CONTENT_TYPE, COOKIE};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};
use uuid::Uuid;

use crate::error::RunError;
use crate::matching::response_matches;
use crate::openapi::ResponseSample;
use crate::request::{Body, ParamLocation, PathSegment, RequestTemplate};
use crate::transport::{OutboundRequest, RawResponse, Transport};
use crate::variables::{AuthContext, Layer, VariableNamespace};

/// Layers consulted for placeholders the overrides left in the URL.
pub const RUNNER_PRECEDENCE: [Layer; 2] = [Layer::Session, Layer::Global];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    Pass,
    Fail,
    #[default]
    Unset,
}

/// One stored regression test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Dynamic segment name → replacement value.
    #[serde(default)]
    pub path_overrides: IndexMap<String, String>,
    /// Query key → replacement value.
    #[serde(default)]
    pub query_overrides: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_override: Option<String>,
    #[serde(default = "default_expected_status")]
    pub expected_status: String,
    #[serde(default)]
    pub expected_response: String,
    #[serde(default)]
    pub expected_partial_response: bool,
    /// `Some(false)` opts this test out of token injection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_token: Option<bool>,
    #[serde(default)]
    pub result: TestResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_status: Option<u16>,
    #[serde(default)]
    pub server_response: String,
}

fn default_expected_status() -> String {
    "200".to_string()
}

impl TestCase {
    /// A fresh test expecting `200`.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            expected_status: default_expected_status(),
            ..Default::default()
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::new()
        }
    }

    pub fn with_path_override(mut self, segment: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_overrides.insert(segment.into(), value.into());
        self
    }

    pub fn with_query_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_overrides.insert(key.into(), value.into());
        self
    }

    pub fn expect(mut self, status: impl Into<String>, response: impl Into<String>, partial: bool) -> Self {
        self.expected_status = status.into();
        self.expected_response = response.into();
        self.expected_partial_response = partial;
        self
    }
}

/// What one run observed and concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub test_id: String,
    pub result: TestResult,
    /// `None` when the URL could not be built.
    pub request_url: Option<String>,
    /// `0` when the request failed or the response could not be compared.
    pub server_status: u16,
    pub server_response: String,
    pub status_matched: bool,
    pub response_matched: bool,
    pub error: Option<String>,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        self.result == TestResult::Pass
    }

    /// Record result and captured response on the test case.
    pub fn apply_to(&self, test: &mut TestCase) {
        test.result = self.result;
        test.server_status = Some(self.server_status);
        test.server_response = self.server_response.clone();
    }

    fn errored(test: &TestCase, request_url: Option<String>, body: String, error: String) -> Self {
        Self {
            test_id: test.id.clone(),
            result: TestResult::Fail,
            request_url,
            server_status: 0,
            server_response: body,
            status_matched: false,
            response_matched: false,
            error: Some(error),
        }
    }
}

/// Totals for a batch of runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteSummary {
    pub passed: usize,
    pub failed: usize,
    pub outcomes: Vec<TestOutcome>,
}

impl SuiteSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Variables and auth settings a run resolves against.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub namespace: &'a VariableNamespace,
    pub environment: &'a str,
    pub auth: Option<&'a AuthContext>,
    /// The session-level "include token" toggle.
    pub include_token: bool,
}

impl<'a> RunContext<'a> {
    pub fn new(namespace: &'a VariableNamespace) -> Self {
        Self {
            namespace,
            environment: "",
            auth: None,
            include_token: false,
        }
    }

    pub fn environment(mut self, environment: &'a str) -> Self {
        self.environment = environment;
        self
    }

    pub fn token(mut self, auth: Option<&'a AuthContext>, include_token: bool) -> Self {
        self.auth = auth;
        self.include_token = include_token;
        self
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

/// Percent-encode `value` so it stays a single path segment.
fn encode_path_segment(value: &str) -> String {
    // byte_serialize writes spaces as `+` and a literal `+` as `%2B`.
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Build the concrete request for `test`.
///
/// Dynamic segments take the test's override when it is not blank, otherwise
/// the template's own segment value; whatever placeholders remain afterwards
/// are resolved session-first, then global.
pub fn materialize(
    test: &TestCase,
    template: &RequestTemplate,
    ctx: &RunContext<'_>,
) -> Result<OutboundRequest, RunError> {
    let ns = ctx.namespace;
    let env = ctx.environment;

    let mut raw_url = template.url.base_url.clone();
    for segment in &template.url.segments {
        raw_url.push('/');
        match segment {
            PathSegment::Static { value } => raw_url.push_str(value),
            PathSegment::Dynamic { name, .. } => {
                let value = non_blank(test.path_overrides.get(name))
                    .or_else(|| ns.resolve_in(&[Layer::Segment], name, env));
                match value {
                    Some(value) => {
                        let value = ns.substitute_in(&RUNNER_PRECEDENCE, value, env);
                        raw_url.push_str(&encode_path_segment(&value));
                    }
                    None => raw_url.push_str(&segment.template()),
                }
            }
        }
    }
    let resolved = ns.substitute_in(&RUNNER_PRECEDENCE, &raw_url, env);
    let mut url = Url::parse(resolved.trim()).map_err(|source| RunError::InvalidUrl {
        url: resolved.to_string(),
        source,
    })?;

    let pairs: Vec<(String, String)> = template
        .query_params
        .iter()
        .filter(|q| !q.key.trim().is_empty())
        .map(|q| {
            let value = non_blank(test.query_overrides.get(&q.key))
                .map(str::to_string)
                .unwrap_or_else(|| ns.lookup_value(&q.value, env).into_owned());
            (q.key.trim().to_string(), value)
        })
        .collect();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    let mut headers = Vec::new();
    let mut cookies = Vec::new();
    for header in template.headers.iter().filter(|h| !h.key.trim().is_empty()) {
        let key = header.key.trim().to_string();
        let value = ns.lookup_value(&header.value, env).into_owned();
        match header.location {
            ParamLocation::Header => headers.push((key, value)),
            ParamLocation::Cookie => cookies.push(format!("{key}={value}")),
        }
    }
    if !cookies.is_empty() {
        headers.push((COOKIE.as_str().to_string(), cookies.join("; ")));
    }

    if test.use_token != Some(false) && ctx.include_token {
        if let Some(auth) = ctx.auth {
            match auth.header_value(ns, env) {
                Some(value) => {
                    headers.retain(|(key, _)| !auth.is_auth_header(key));
                    headers.push((auth.header_name.trim().to_string(), value));
                }
                None => debug!(token = %auth.token_name, "token variable not set; sending without it"),
            }
        }
    }

    let body = match &template.body {
        Body::None => None,
        Body::Json(raw) => {
            let chosen = test
                .body_override
                .as_deref()
                .filter(|b| !b.trim().is_empty())
                .unwrap_or(raw);
            (!chosen.trim().is_empty()).then(|| (chosen.to_string(), "application/json"))
        }
        Body::Form(fields) => {
            let mut form = form_urlencoded::Serializer::new(String::new());
            let mut any = false;
            for field in fields.iter().filter(|f| !f.key.trim().is_empty()) {
                form.append_pair(field.key.trim(), &ns.lookup_value(&field.value, env));
                any = true;
            }
            any.then(|| (form.finish(), "application/x-www-form-urlencoded"))
        }
        Body::Text(raw) => (!raw.is_empty()).then(|| (raw.clone(), "text/plain")),
    };
    let body = body.map(|(content, content_type)| {
        headers.retain(|(key, _)| !key.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
        headers.push((CONTENT_TYPE.as_str().to_string(), content_type.to_string()));
        content
    });

    Ok(OutboundRequest {
        method: template.method.clone(),
        url: url.to_string(),
        headers,
        body,
    })
}

/// Judge a captured response against the test's expectations.
fn judge(test: &TestCase, request_url: String, response: RawResponse) -> TestOutcome {
    let status_matched = response.status.to_string() == test.expected_status;
    match response_matches(
        &test.expected_response,
        test.expected_partial_response,
        &response.body,
    ) {
        Ok(response_matched) => TestOutcome {
            test_id: test.id.clone(),
            result: if status_matched && response_matched {
                TestResult::Pass
            } else {
                TestResult::Fail
            },
            request_url: Some(request_url),
            server_status: response.status,
            server_response: response.body,
            status_matched,
            response_matched,
            error: None,
        },
        Err(err) => {
            warn!(test = %test.id, error = %err, "response comparison failed");
            TestOutcome::errored(test, Some(request_url), response.body, err.to_string())
        }
    }
}

/// Runs test cases over a [`Transport`].
#[derive(Debug, Clone, Default)]
pub struct TestRunner<T> {
    transport: T,
}

impl<T: Transport + Sync> TestRunner<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one test without touching it.
    pub async fn run(&self, test: &TestCase, template: &RequestTemplate, ctx: &RunContext<'_>) -> TestOutcome {
        let request = match materialize(test, template, ctx) {
            Ok(request) => request,
            Err(err) => {
                warn!(test = %test.id, error = %err, "could not build request");
                return TestOutcome::errored(test, None, String::new(), err.to_string());
            }
        };
        let url = request.url.clone();
        debug!(test = %test.id, method = %request.method, url = %url, "running test");

        let outcome = match self.transport.send(request).await {
            Ok(response) => judge(test, url, response),
            Err(err) => {
                warn!(test = %test.id, error = %err, "request failed");
                let message = err.to_string();
                TestOutcome::errored(test, Some(url), message.clone(), message)
            }
        };
        info!(
            test = %test.id,
            result = ?outcome.result,
            status = outcome.server_status,
            "test finished"
        );
        outcome
    }

    /// Run one test and record the result and captured response on it.
    pub async fn run_and_record(
        &self,
        test: &mut TestCase,
        template: &RequestTemplate,
        ctx: &RunContext<'_>,
    ) -> TestOutcome {
        let outcome = self.run(test, template, ctx).await;
        outcome.apply_to(test);
        outcome
    }

    /// Run every test in order, recording each outcome.
    pub async fn run_suite(
        &self,
        tests: &mut [TestCase],
        template: &RequestTemplate,
        ctx: &RunContext<'_>,
    ) -> SuiteSummary {
        let mut summary = SuiteSummary::default();
        for test in tests.iter_mut() {
            let outcome = self.run_and_record(test, template, ctx).await;
            if outcome.passed() {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            summary.outcomes.push(outcome);
        }
        summary
    }

    /// Send the template as-is and keep the response as a schema sample.
    pub async fn fetch_sample(
        &self,
        template: &RequestTemplate,
        ctx: &RunContext<'_>,
    ) -> Result<ResponseSample, RunError> {
        let request = materialize(&TestCase::default(), template, ctx)?;
        let response = self.transport.send(request).await?;
        Ok(ResponseSample::live(response.status, &response.body))
    }
}
