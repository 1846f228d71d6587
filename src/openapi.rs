//! Spec assembly: turns a request template plus a response sample into one of
//! three textual API description dialects.
//!
//! | Version string | Dialect | Root |
//! |---|---|---|
//! | `"0.9.7.1"` | [`Dialect::Legacy`] | `METHOD Title` header, flat `tags/url/security/parameters/responses` |
//! | `"2.0.0"` | [`Dialect::Swagger2`] | `swagger: '2.0'` with a `paths` map |
//! | anything else | [`Dialect::OpenApi3`] | `openapi: 3.0.0` with a `paths` map |
//!
//! Assembly never fails. Input that cannot be used (a malformed JSON request
//! body, for instance) is logged and its section is left out so the rest of
//! the document still renders while the user is typing.
//!
//! ```
//! use bistool::openapi::{Dialect, SpecAssembler};
//! use bistool::request::RequestTemplate;
//! use http::Method;
//! use serde_json::json;
//!
//! let template = RequestTemplate::from_url(Method::GET, "https://api.example.com/users/{id}");
//! let sample = json!({"id": 1, "name": "Ann"});
//!
//! let yaml = SpecAssembler::new(Dialect::from_version("3.0.0"), &template)
//!     .sample(Some(&sample))
//!     .assemble();
//!
//! assert!(yaml.starts_with("openapi: 3.0.0\n"));
//! assert!(yaml.contains("\"/users/{id}\":"));
//! ```

use std::fmt::Write as _;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::SpecError;
use crate::request::{Body, FormField, PathSegment, RequestTemplate};
use crate::schema::{quote, scalar, SchemaNode, INDENT};
use crate::variables::{AuthContext, VariableNamespace};

/// Output format selected by a project's spec version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Legacy,
    Swagger2,
    OpenApi3,
}

impl Dialect {
    pub const LEGACY_VERSION: &'static str = "0.9.7.1";
    pub const SWAGGER2_VERSION: &'static str = "2.0.0";
    pub const OPENAPI3_VERSION: &'static str = "3.0.0";

    pub fn from_version(version: &str) -> Self {
        match version.trim() {
            Self::LEGACY_VERSION => Dialect::Legacy,
            Self::SWAGGER2_VERSION => Dialect::Swagger2,
            _ => Dialect::OpenApi3,
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            Dialect::Legacy => Self::LEGACY_VERSION,
            Dialect::Swagger2 => Self::SWAGGER2_VERSION,
            Dialect::OpenApi3 => Self::OPENAPI3_VERSION,
        }
    }
}

/// Document title, tag and description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMeta {
    pub title: String,
    pub category: String,
    pub description: String,
}

impl Default for SpecMeta {
    fn default() -> Self {
        Self {
            title: "API Endpoint".to_string(),
            category: "API".to_string(),
            description: String::new(),
        }
    }
}

impl SpecMeta {
    /// Blank title or category fall back to the defaults.
    pub fn new(title: &str, category: &str, description: &str) -> Self {
        let defaults = Self::default();
        Self {
            title: non_blank(title).unwrap_or(defaults.title),
            category: non_blank(category).unwrap_or(defaults.category),
            description: description.trim().to_string(),
        }
    }
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// An extra documented response next to the default `200`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseCondition {
    /// Status code, or the literal `custom`.
    pub status: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default = "default_include")]
    pub include: bool,
}

fn default_include() -> bool {
    true
}

impl ResponseCondition {
    pub fn new(status: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            condition: condition.into(),
            include: true,
        }
    }

    pub fn is_custom(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("custom")
    }

    /// Mapping key under `responses`.
    fn key(&self) -> String {
        if self.is_custom() {
            "default".to_string()
        } else {
            format!("'{}'", self.status.trim().replace('\'', "''"))
        }
    }

    fn description(&self) -> String {
        if let Some(text) = non_blank(&self.condition) {
            return text;
        }
        StatusCode::from_bytes(self.status.trim().as_bytes())
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Response")
            .to_string()
    }

    fn is_emitted(&self) -> bool {
        let status = self.status.trim();
        self.include && !status.is_empty() && status != "200"
    }
}

/// Response body used to infer the `200` schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseSample {
    /// Captured from a live request; `body` is `None` when it was empty or not JSON.
    Live { status: u16, body: Option<Value> },
    /// JSON pasted by the user.
    Pasted(Value),
}

impl ResponseSample {
    pub fn pasted(text: &str) -> Result<Self, SpecError> {
        Ok(ResponseSample::Pasted(serde_json::from_str(text)?))
    }

    pub fn live(status: u16, text: &str) -> Self {
        ResponseSample::Live {
            status,
            body: serde_json::from_str(text).ok(),
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            ResponseSample::Live { body, .. } => body.as_ref(),
            ResponseSample::Pasted(value) => Some(value),
        }
    }
}

/// Replace every dot-delimited segment of a token with `xxx`, keeping an
/// auth scheme prefix such as `Bearer `.
///
/// ```
/// assert_eq!(bistool::openapi::mask_token("h.p.s"), "xxx.xxx.xxx");
/// assert_eq!(bistool::openapi::mask_token("Bearer a.b"), "Bearer xxx.xxx");
/// ```
pub fn mask_token(value: &str) -> String {
    let (prefix, token) = match value.split_once(' ') {
        Some((scheme, rest)) if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphabetic()) => {
            (format!("{scheme} "), rest.trim_start())
        }
        _ => (String::new(), value),
    };
    if token.is_empty() {
        return value.to_string();
    }
    let masked = token.split('.').map(|_| "xxx").collect::<Vec<_>>().join(".");
    format!("{prefix}{masked}")
}

fn is_secret_header(key: &str, value: &str, auth: Option<&AuthContext>) -> bool {
    let key_lower = key.to_ascii_lowercase();
    auth.is_some_and(|auth| auth.is_auth_header(key))
        || ["authorization", "token", "bearer"]
            .iter()
            .any(|needle| key_lower.contains(needle))
        || value.trim_start().starts_with("Bearer ")
}

/// One rendered parameter stanza.
#[derive(Debug, Clone, PartialEq)]
struct Parameter {
    name: String,
    location: &'static str,
    required: bool,
    description: String,
    example: String,
}

/// Request body, ready to render.
#[derive(Debug, Clone, PartialEq)]
enum BodySchema {
    Json(SchemaNode),
    Form(Vec<Parameter>),
    Text(SchemaNode),
}

/// Builder for one generated document.
#[derive(Debug, Clone)]
pub struct SpecAssembler<'a> {
    dialect: Dialect,
    template: &'a RequestTemplate,
    variables: Option<&'a VariableNamespace>,
    environment: &'a str,
    sample: Option<&'a Value>,
    conditions: &'a [ResponseCondition],
    meta: SpecMeta,
    auth: Option<&'a AuthContext>,
}

impl<'a> SpecAssembler<'a> {
    pub fn new(dialect: Dialect, template: &'a RequestTemplate) -> Self {
        Self {
            dialect,
            template,
            variables: None,
            environment: "",
            sample: None,
            conditions: &[],
            meta: SpecMeta::default(),
            auth: None,
        }
    }

    /// Namespace used for parameter examples and server URLs.
    pub fn variables(mut self, namespace: &'a VariableNamespace, environment: &'a str) -> Self {
        self.variables = Some(namespace);
        self.environment = environment;
        self
    }

    /// Response body to infer the `200` schema from; `None` renders `type: string`.
    pub fn sample(mut self, sample: Option<&'a Value>) -> Self {
        self.sample = sample;
        self
    }

    pub fn conditions(mut self, conditions: &'a [ResponseCondition]) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn meta(mut self, meta: SpecMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn auth(mut self, auth: Option<&'a AuthContext>) -> Self {
        self.auth = auth;
        self
    }

    /// Render the document.
    pub fn assemble(&self) -> String {
        let fallback = VariableNamespace::default();
        let namespace = self.variables.unwrap_or(&fallback);

        let parameters = self.collect_parameters(namespace);
        let body = if self.template.has_body_section() {
            self.body_schema(namespace)
        } else {
            None
        };
        let response = SchemaNode::from_sample(self.sample);

        let mut w = YamlWriter::default();
        match self.dialect {
            Dialect::Legacy => self.write_legacy(&mut w, &parameters, body.as_ref(), &response),
            Dialect::Swagger2 => self.write_swagger2(&mut w, namespace, &parameters, body.as_ref(), &response),
            Dialect::OpenApi3 => self.write_openapi3(&mut w, namespace, &parameters, body.as_ref(), &response),
        }

        debug!(
            dialect = self.dialect.version(),
            method = %self.template.method,
            parameters = parameters.len(),
            "assembled spec"
        );
        w.out
    }

    /// Path, header, query and (outside 3.0) form parameters, in that order.
    fn collect_parameters(&self, ns: &VariableNamespace) -> Vec<Parameter> {
        let env = self.environment;
        let mut params = Vec::new();

        for segment in &self.template.url.segments {
            if let PathSegment::Dynamic { name, description, required } = segment {
                params.push(Parameter {
                    name: name.clone(),
                    location: "path",
                    required: *required,
                    description: description.clone(),
                    example: ns.resolve(name, env).unwrap_or_default().to_string(),
                });
            }
        }

        for header in self.template.headers.iter().filter(|h| !h.key.trim().is_empty()) {
            let value = ns.lookup_value(&header.value, env);
            let example = if is_secret_header(&header.key, &value, self.auth) {
                mask_token(&value)
            } else {
                value.into_owned()
            };
            params.push(Parameter {
                name: header.key.trim().to_string(),
                // Swagger 2.0 has no cookie parameters.
                location: match self.dialect {
                    Dialect::OpenApi3 => header.location.as_str(),
                    Dialect::Legacy | Dialect::Swagger2 => "header",
                },
                required: header.required,
                description: header.description.clone(),
                example,
            });
        }

        for query in self.template.query_params.iter().filter(|q| !q.key.trim().is_empty()) {
            params.push(Parameter {
                name: query.key.trim().to_string(),
                location: "query",
                required: query.required,
                description: query.description.clone(),
                example: ns.lookup_value(&query.value, env).into_owned(),
            });
        }

        if self.dialect != Dialect::OpenApi3 && self.template.has_body_section() {
            if let Body::Form(fields) = &self.template.body {
                params.extend(self.form_parameters(fields, ns, "formData"));
            }
        }

        params
    }

    fn form_parameters(
        &self,
        fields: &[FormField],
        ns: &VariableNamespace,
        location: &'static str,
    ) -> Vec<Parameter> {
        fields
            .iter()
            .filter(|f| !f.key.trim().is_empty())
            .map(|f| Parameter {
                name: f.key.trim().to_string(),
                location,
                required: f.required,
                description: f.description.clone(),
                example: ns.lookup_value(&f.value, self.environment).into_owned(),
            })
            .collect()
    }

    fn body_schema(&self, ns: &VariableNamespace) -> Option<BodySchema> {
        match &self.template.body {
            Body::None => None,
            Body::Json(raw) if raw.trim().is_empty() => None,
            Body::Json(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(value) => Some(BodySchema::Json(SchemaNode::infer(&value))),
                Err(err) => {
                    warn!(error = %err, "request body is not valid JSON; omitting body schema");
                    None
                }
            },
            Body::Form(fields) => {
                let params = self.form_parameters(fields, ns, "formData");
                (!params.is_empty()).then_some(BodySchema::Form(params))
            }
            Body::Text(raw) if raw.is_empty() => None,
            Body::Text(raw) => Some(BodySchema::Text(SchemaNode::String(raw.clone()))),
        }
    }

    fn write_legacy(
        &self,
        w: &mut YamlWriter,
        params: &[Parameter],
        body: Option<&BodySchema>,
        response: &SchemaNode,
    ) {
        w.line(0, format!("{} {}", self.template.method, self.meta.title));
        w.line(0, "---");
        w.line(0, "tags:");
        w.line(1, format!("- {}", scalar(&self.meta.category)));
        w.line(0, format!("description: {}", scalar(&self.meta.description)));
        w.line(0, format!("url: {}", quote(&self.template.url.url_template())));
        w.line(0, "security:");
        w.line(1, "- ApiKeyAuth: []");

        let body_param = body.filter(|b| !matches!(b, BodySchema::Form(_)));
        if params.is_empty() && body_param.is_none() {
            w.line(0, "parameters: []");
        } else {
            w.line(0, "parameters:");
            self.write_parameters(w, 1, params);
            if let Some(body) = body_param {
                write_body_parameter(w, 1, body);
            }
        }

        w.line(0, "responses:");
        w.line(1, "'200':");
        w.line(2, format!("description: {}", quote("Successful response")));
        w.line(2, "schema:");
        w.schema(3, response);
        self.write_conditions(w, 1);
    }

    fn write_swagger2(
        &self,
        w: &mut YamlWriter,
        ns: &VariableNamespace,
        params: &[Parameter],
        body: Option<&BodySchema>,
        response: &SchemaNode,
    ) {
        w.line(0, "swagger: '2.0'");
        self.write_info(w);
        if let Some(server) = self.server_url(ns) {
            if let Some(host) = server.host_str() {
                let host = match server.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                };
                w.line(0, format!("host: {}", quote(&host)));
                w.line(0, format!("basePath: {}", quote(base_path(&server))));
                w.line(0, "schemes:");
                w.line(1, format!("- {}", server.scheme()));
            }
        }
        w.line(0, "paths:");
        w.line(1, format!("{}:", quote(&self.template.url.path_template())));
        w.line(2, format!("{}:", self.template.method.as_str().to_ascii_lowercase()));
        self.write_operation_header(w, 3);
        w.line(3, "produces:");
        w.line(4, "- application/json");

        let body_param = body.filter(|b| !matches!(b, BodySchema::Form(_)));
        if !params.is_empty() || body_param.is_some() {
            w.line(3, "parameters:");
            self.write_parameters(w, 4, params);
            if let Some(body) = body_param {
                write_body_parameter(w, 4, body);
            }
        }

        w.line(3, "responses:");
        w.line(4, "'200':");
        w.line(5, format!("description: {}", quote("Successful response")));
        w.line(5, "schema:");
        w.schema(6, response);
        self.write_conditions(w, 4);
    }

    fn write_openapi3(
        &self,
        w: &mut YamlWriter,
        ns: &VariableNamespace,
        params: &[Parameter],
        body: Option<&BodySchema>,
        response: &SchemaNode,
    ) {
        w.line(0, "openapi: 3.0.0");
        self.write_info(w);
        if let Some(server) = self.server_url(ns) {
            w.line(0, "servers:");
            w.line(1, format!("- url: {}", quote(server.as_str().trim_end_matches('/'))));
        }
        w.line(0, "paths:");
        w.line(1, format!("{}:", quote(&self.template.url.path_template())));
        w.line(2, format!("{}:", self.template.method.as_str().to_ascii_lowercase()));
        self.write_operation_header(w, 3);

        if !params.is_empty() {
            w.line(3, "parameters:");
            self.write_parameters(w, 4, params);
        }

        if let Some(body) = body {
            w.line(3, "requestBody:");
            w.line(4, "required: true");
            w.line(4, "content:");
            match body {
                BodySchema::Json(schema) => {
                    w.line(5, "application/json:");
                    w.line(6, "schema:");
                    w.schema(7, schema);
                }
                BodySchema::Text(schema) => {
                    w.line(5, "text/plain:");
                    w.line(6, "schema:");
                    w.schema(7, schema);
                }
                BodySchema::Form(fields) => {
                    w.line(5, "application/x-www-form-urlencoded:");
                    w.line(6, "schema:");
                    w.line(7, "type: object");
                    w.line(7, "properties:");
                    for field in fields {
                        w.line(8, format!("{}:", crate::schema::yaml_key(&field.name)));
                        w.line(9, "type: string");
                        w.line(9, format!("description: {}", quote(&field.description)));
                        w.line(9, format!("example: {}", quote(&field.example)));
                    }
                    let required: Vec<_> = fields.iter().filter(|f| f.required).collect();
                    if !required.is_empty() {
                        w.line(7, "required:");
                        for field in required {
                            w.line(8, format!("- {}", quote(&field.name)));
                        }
                    }
                }
            }
        }

        w.line(3, "responses:");
        w.line(4, "'200':");
        w.line(5, format!("description: {}", quote("Successful response")));
        w.line(5, "content:");
        w.line(6, "application/json:");
        w.line(7, "schema:");
        w.schema(8, response);
        self.write_conditions(w, 4);
    }

    fn write_info(&self, w: &mut YamlWriter) {
        w.line(0, "info:");
        w.line(1, format!("title: {}", quote(&self.meta.title)));
        w.line(1, format!("description: {}", quote(&self.meta.description)));
        w.line(1, "version: 1.0.0");
    }

    fn write_operation_header(&self, w: &mut YamlWriter, level: usize) {
        w.line(level, "tags:");
        w.line(level + 1, format!("- {}", quote(&self.meta.category)));
        w.line(level, format!("summary: {}", quote(&self.meta.title)));
        w.line(level, format!("description: {}", quote(&self.meta.description)));
    }

    fn write_parameters(&self, w: &mut YamlWriter, level: usize, params: &[Parameter]) {
        for param in params {
            w.line(level, format!("- name: {}", quote(&param.name)));
            let inner = level + 1;
            w.line(inner, format!("in: {}", param.location));
            if self.dialect != Dialect::OpenApi3 {
                w.line(inner, "type: string");
            }
            w.line(inner, format!("required: {}", param.required));
            w.line(inner, format!("description: {}", quote(&param.description)));
            if self.dialect == Dialect::OpenApi3 {
                w.line(inner, "schema:");
                w.line(inner + 1, "type: string");
            }
            w.line(inner, format!("example: {}", quote(&param.example)));
        }
    }

    fn write_conditions(&self, w: &mut YamlWriter, level: usize) {
        for condition in self.conditions.iter().filter(|c| c.is_emitted()) {
            w.line(level, format!("{}:", condition.key()));
            w.line(level + 1, format!("description: {}", quote(&condition.description())));
        }
    }

    /// Base URL after variable substitution, when it is a usable absolute URL.
    fn server_url(&self, ns: &VariableNamespace) -> Option<Url> {
        let base = ns.substitute(&self.template.url.base_url, self.environment);
        Url::parse(base.trim())
            .ok()
            .filter(|url| url.has_host() && matches!(url.scheme(), "http" | "https"))
    }
}

/// Path prefix of the server URL, `/` when it has none.
fn base_path(server: &Url) -> &str {
    match server.path().trim_end_matches('/') {
        "" => "/",
        path => path,
    }
}

/// `in: body` stanza used by the legacy and Swagger 2.0 dialects.
fn write_body_parameter(w: &mut YamlWriter, level: usize, body: &BodySchema) {
    let schema = match body {
        BodySchema::Json(schema) | BodySchema::Text(schema) => schema,
        BodySchema::Form(_) => return,
    };
    w.line(level, "- name: body");
    w.line(level + 1, "in: body");
    w.line(level + 1, "required: true");
    w.line(level + 1, "schema:");
    w.schema(level + 2, schema);
}

#[derive(Default)]
struct YamlWriter {
    out: String,
}

impl YamlWriter {
    fn line(&mut self, level: usize, text: impl AsRef<str>) {
        let _ = writeln!(self.out, "{}{}", INDENT.repeat(level), text.as_ref());
    }

    fn schema(&mut self, level: usize, node: &SchemaNode) {
        self.out.push_str(&node.render(&INDENT.repeat(level)));
    }
}

/// Parse generated OpenAPI 3.0 text back into a typed document.
pub fn validate_openapi3(text: &str) -> Result<openapiv3::OpenAPI, SpecError> {
    Ok(serde_yaml::from_str(text)?)
}

/// Parse generated text of any dialect into a generic YAML tree.
///
/// The legacy dialect's `METHOD Title` header line is skipped.
pub fn parse_document(dialect: Dialect, text: &str) -> Result<serde_yaml::Value, SpecError> {
    let body = match dialect {
        Dialect::Legacy => text.split_once("\n---\n").map_or(text, |(_, rest)| rest),
        Dialect::Swagger2 | Dialect::OpenApi3 => text,
    };
    Ok(serde_yaml::from_str(body)?)
}
