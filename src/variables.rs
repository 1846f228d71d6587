//! Layered variable resolution for `{name}` / `${name}` placeholders.
//!
//! A [`VariableNamespace`] holds three layers: global (shared by every session
//! of a project), session (saved with one session) and segment (values for the
//! dynamic parts of the current URL). Resolution is read-only and tries the
//! environment-suffixed key before the bare key in every layer:
//!
//! ```
//! use bistool::variables::VariableNamespace;
//!
//! let mut ns = VariableNamespace::default();
//! ns.global.insert("host_dev".into(), "dev.example.com".into());
//! ns.session.insert("host".into(), "example.com".into());
//!
//! assert_eq!(ns.resolve("host", "dev"), Some("dev.example.com"));
//! assert_eq!(ns.resolve("host", ""), Some("example.com"));
//! assert_eq!(ns.substitute("https://{host}/x/{missing}", "dev"), "https://dev.example.com/x/{missing}");
//! ```

use std::borrow::Cow;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Ordered name → value bag.
pub type Variables = IndexMap<String, String>;

/// One namespace layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Global,
    Segment,
    Session,
}

/// Global first, then the URL's own segment values, then session-shared values.
pub const DEFAULT_PRECEDENCE: [Layer; 3] = [Layer::Global, Layer::Segment, Layer::Session];

/// `{name}`, `${name}` and the percent-encoded `%7Bname%7D` forms.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?(?:\{|%7[Bb])([A-Za-z_][A-Za-z0-9_.\-]*)(?:\}|%7[Dd])")
        .expect("placeholder pattern is valid")
});

/// A value that is nothing but one reference.
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$?\{([A-Za-z_][A-Za-z0-9_.\-]*)\}$").expect("reference pattern is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableNamespace {
    #[serde(default)]
    pub global: Variables,
    #[serde(default)]
    pub session: Variables,
    #[serde(default)]
    pub segment: Variables,
}

impl VariableNamespace {
    pub fn new(global: Variables, session: Variables, segment: Variables) -> Self {
        Self {
            global,
            session,
            segment,
        }
    }

    pub fn layer(&self, layer: Layer) -> &Variables {
        match layer {
            Layer::Global => &self.global,
            Layer::Segment => &self.segment,
            Layer::Session => &self.session,
        }
    }

    /// Resolve `name` with the default precedence.
    pub fn resolve(&self, name: &str, environment: &str) -> Option<&str> {
        self.resolve_in(&DEFAULT_PRECEDENCE, name, environment)
    }

    /// Resolve `name` walking `order`; within each layer `name_<env>` beats `name`.
    ///
    /// Empty values count as unset.
    pub fn resolve_in(&self, order: &[Layer], name: &str, environment: &str) -> Option<&str> {
        let scoped = environment_key(name, environment);
        order.iter().find_map(|layer| {
            let vars = self.layer(*layer);
            scoped
                .as_deref()
                .and_then(|key| non_empty(vars.get(key)))
                .or_else(|| non_empty(vars.get(name)))
        })
    }

    /// Replace every placeholder in `text` using the default precedence.
    ///
    /// Unresolved placeholders are left exactly as written.
    pub fn substitute<'t>(&self, text: &'t str, environment: &str) -> Cow<'t, str> {
        self.substitute_in(&DEFAULT_PRECEDENCE, text, environment)
    }

    pub fn substitute_in<'t>(&self, order: &[Layer], text: &'t str, environment: &str) -> Cow<'t, str> {
        PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
            match self.resolve_in(order, &caps[1], environment) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
    }

    /// Resolve a stored parameter value that is itself a `${name}` or `{name}`
    /// reference; literals and unresolved references come back unchanged.
    pub fn lookup_value<'v>(&self, raw: &'v str, environment: &str) -> Cow<'v, str> {
        REFERENCE
            .captures(raw.trim())
            .and_then(|caps| caps.get(1))
            .and_then(|name| self.resolve(name.as_str(), environment))
            .map_or(Cow::Borrowed(raw), |value| Cow::Owned(value.to_string()))
    }
}

fn environment_key(name: &str, environment: &str) -> Option<String> {
    let environment = environment.trim();
    (!environment.is_empty()).then(|| format!("{name}_{environment}"))
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// How a bearer token is found and attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Variable holding the token value.
    pub token_name: String,
    /// Header the token is sent in.
    pub header_name: String,
    /// Prefix such as `Bearer`; empty sends the raw token.
    pub scheme: String,
}

impl Default for AuthContext {
    fn default() -> Self {
        Self {
            token_name: "token".to_string(),
            header_name: http::header::AUTHORIZATION.as_str().to_string(),
            scheme: "Bearer".to_string(),
        }
    }
}

impl AuthContext {
    pub fn new(token_name: impl Into<String>) -> Self {
        Self {
            token_name: token_name.into(),
            ..Default::default()
        }
    }

    /// The token value, if the namespace has one.
    pub fn resolve<'n>(&self, namespace: &'n VariableNamespace, environment: &str) -> Option<&'n str> {
        if self.token_name.trim().is_empty() {
            return None;
        }
        namespace.resolve(self.token_name.trim(), environment)
    }

    /// Full header value including the scheme prefix.
    pub fn header_value(&self, namespace: &VariableNamespace, environment: &str) -> Option<String> {
        let token = self.resolve(namespace, environment)?;
        let scheme = self.scheme.trim();
        if scheme.is_empty() || token.starts_with(scheme) {
            Some(token.to_string())
        } else {
            Some(format!("{scheme} {token}"))
        }
    }

    pub fn is_auth_header(&self, key: &str) -> bool {
        key.trim().eq_ignore_ascii_case(self.header_name.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_global_environment_key_wins() {
        let ns = VariableNamespace::new(
            vars(&[("name_dev", "global-dev"), ("name", "global")]),
            vars(&[("name", "session")]),
            vars(&[("name", "segment")]),
        );
        assert_eq!(ns.resolve("name", "dev"), Some("global-dev"));
    }

    #[test]
    fn test_full_precedence_chain() {
        let mut ns = VariableNamespace::new(
            vars(&[("v", "global")]),
            vars(&[("v_dev", "session-dev"), ("v", "session")]),
            vars(&[("v_dev", "segment-dev"), ("v", "segment")]),
        );
        assert_eq!(ns.resolve("v", "dev"), Some("global"));

        ns.global.clear();
        assert_eq!(ns.resolve("v", "dev"), Some("segment-dev"));

        ns.segment.shift_remove("v_dev");
        assert_eq!(ns.resolve("v", "dev"), Some("segment"));

        ns.segment.clear();
        assert_eq!(ns.resolve("v", "dev"), Some("session-dev"));
        assert_eq!(ns.resolve("v", ""), Some("session"));
        assert_eq!(ns.resolve("other", "dev"), None);
    }

    #[test]
    fn test_empty_values_are_unset() {
        let ns = VariableNamespace::new(vars(&[("id", "")]), vars(&[("id", "7")]), Variables::new());
        assert_eq!(ns.resolve("id", ""), Some("7"));
    }

    #[test]
    fn test_custom_order() {
        let ns = VariableNamespace::new(vars(&[("id", "999")]), vars(&[("id", "5")]), Variables::new());
        assert_eq!(ns.resolve_in(&[Layer::Session, Layer::Global], "id", ""), Some("5"));
        assert_eq!(ns.resolve_in(&[Layer::Global, Layer::Session], "id", ""), Some("999"));
    }

    #[test]
    fn test_substitute_all_placeholder_forms() {
        let ns = VariableNamespace::new(vars(&[("host", "h"), ("id", "42")]), Variables::new(), Variables::new());
        assert_eq!(ns.substitute("https://{host}/u/%7Bid%7D", ""), "https://h/u/42");
        assert_eq!(ns.substitute("https://${host}/u/%7bid%7d", ""), "https://h/u/42");
    }

    #[test]
    fn test_substitute_leaves_unresolved_untouched() {
        let ns = VariableNamespace::default();
        assert_eq!(ns.substitute("https://x/{id}/%7Bother%7D", "dev"), "https://x/{id}/%7Bother%7D");
    }

    #[test]
    fn test_resolution_does_not_mutate() {
        let ns = VariableNamespace::new(vars(&[("a", "1")]), vars(&[("b", "2")]), vars(&[("c", "3")]));
        let before = ns.clone();
        let _ = ns.substitute("{a}{b}{c}{d}", "x");
        let _ = ns.lookup_value("${a}", "x");
        assert_eq!(ns, before);
    }

    #[test]
    fn test_lookup_value_references_only() {
        let ns = VariableNamespace::new(vars(&[("token", "abc")]), Variables::new(), Variables::new());
        assert_eq!(ns.lookup_value("${token}", ""), "abc");
        assert_eq!(ns.lookup_value("{token}", ""), "abc");
        assert_eq!(ns.lookup_value("Bearer {token}", ""), "Bearer {token}");
        assert_eq!(ns.lookup_value("${nope}", ""), "${nope}");
        assert_eq!(ns.lookup_value("plain", ""), "plain");
    }

    #[test]
    fn test_auth_header_value() {
        let ns = VariableNamespace::new(vars(&[("jwt", "a.b.c")]), Variables::new(), Variables::new());
        let auth = AuthContext::new("jwt");
        assert_eq!(auth.header_value(&ns, "").as_deref(), Some("Bearer a.b.c"));
        assert!(auth.is_auth_header("authorization"));

        let raw = AuthContext {
            scheme: String::new(),
            ..AuthContext::new("jwt")
        };
        assert_eq!(raw.header_value(&ns, "").as_deref(), Some("a.b.c"));
        assert_eq!(AuthContext::new("missing").header_value(&ns, ""), None);
    }
}
