//! The request template a session edits: method, URL segments, query
//! parameters, headers and body.

use http::Method;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// One `/`-delimited piece of a URL path template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PathSegment {
    Static {
        value: String,
    },
    Dynamic {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default = "default_true")]
        required: bool,
    },
}

impl PathSegment {
    pub fn literal(value: impl Into<String>) -> Self {
        PathSegment::Static { value: value.into() }
    }

    pub fn dynamic(name: impl Into<String>) -> Self {
        PathSegment::Dynamic {
            name: name.into(),
            description: String::new(),
            required: true,
        }
    }

    /// The segment as it appears in a path template.
    pub fn template(&self) -> String {
        match self {
            PathSegment::Static { value } => value.clone(),
            PathSegment::Dynamic { name, .. } => format!("{{{name}}}"),
        }
    }

    fn parse(raw: &str) -> Self {
        let braced = raw
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .filter(|name| !name.is_empty() && !name.contains(['{', '}']));
        let colon = raw.strip_prefix(':').filter(|name| !name.is_empty());
        match braced.or(colon) {
            Some(name) => PathSegment::dynamic(name),
            None => PathSegment::literal(raw),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A URL split into its base and path segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlData {
    /// `scheme://host[:port]`, possibly containing `{var}` placeholders.
    pub base_url: String,
    #[serde(default)]
    pub segments: Vec<PathSegment>,
}

impl UrlData {
    /// Split a pasted URL into base, path segments and query parameters.
    ///
    /// `{name}` and `:name` path pieces become dynamic segments.
    pub fn parse(url: &str) -> (Self, Vec<QueryParam>) {
        let url = url.trim();
        let (without_fragment, _) = url.split_once('#').unwrap_or((url, ""));
        let (location, query) = without_fragment
            .split_once('?')
            .unwrap_or((without_fragment, ""));

        let path_start = match location.find("://") {
            Some(scheme_end) => location[scheme_end + 3..]
                .find('/')
                .map(|i| i + scheme_end + 3),
            None => location.find('/'),
        };
        let (base_url, path) = match path_start {
            Some(i) => (&location[..i], &location[i..]),
            None => (location, ""),
        };

        let segments = path
            .split('/')
            .filter(|piece| !piece.is_empty())
            .map(PathSegment::parse)
            .collect();

        let query_params = form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| QueryParam::new(key, value))
            .collect();

        (
            Self {
                base_url: base_url.trim_end_matches('/').to_string(),
                segments,
            },
            query_params,
        )
    }

    /// Path portion with dynamic segments as `{name}`, always starting with `/`.
    pub fn path_template(&self) -> String {
        let joined = self
            .segments
            .iter()
            .map(PathSegment::template)
            .collect::<Vec<_>>()
            .join("/");
        format!("/{joined}")
    }

    /// Base URL followed by the path template.
    pub fn url_template(&self) -> String {
        if self.segments.is_empty() {
            return self.base_url.clone();
        }
        format!("{}{}", self.base_url, self.path_template())
    }

    /// Names of the dynamic segments, in path order.
    pub fn dynamic_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            PathSegment::Dynamic { name, .. } => Some(name.as_str()),
            PathSegment::Static { .. } => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParam {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl QueryParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Where a declared header-like parameter travels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    #[default]
    Header,
    Cookie,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderParam {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "in")]
    pub location: ParamLocation,
}

impl HeaderParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl FormField {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Request body descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum Body {
    #[default]
    None,
    /// Raw JSON text as typed by the user; may be malformed.
    Json(String),
    Form(Vec<FormField>),
    Text(String),
}

/// Everything needed to issue or document one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTemplate {
    #[serde(with = "method_name")]
    pub method: Method,
    pub url: UrlData,
    #[serde(default)]
    pub query_params: Vec<QueryParam>,
    #[serde(default)]
    pub headers: Vec<HeaderParam>,
    #[serde(default)]
    pub body: Body,
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: UrlData::default(),
            query_params: Vec::new(),
            headers: Vec::new(),
            body: Body::None,
        }
    }
}

impl RequestTemplate {
    /// Build a template from a method and a pasted URL.
    pub fn from_url(method: Method, url: &str) -> Self {
        let (url, query_params) = UrlData::parse(url);
        Self {
            method,
            url,
            query_params,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HeaderParam::new(key, value));
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push(QueryParam::new(key, value));
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Whether the method carries a documented request body.
    pub fn has_body_section(&self) -> bool {
        self.method != Method::GET
    }
}

/// (De)serializes [`Method`] as its upper-case name.
pub(crate) mod method_name {
    use http::Method;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes()).map_err(D::Error::custom)
    }
}
