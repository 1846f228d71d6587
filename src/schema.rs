//! Structural schema inference over arbitrary JSON samples.
//!
//! A [`SchemaNode`] tree mirrors the JSON value it was inferred from one node
//! per value, so the tree depth equals the nesting depth of the sample. Two
//! sampling rules are deliberate and must stay stable because generated specs
//! depend on them:
//!
//! - arrays take their item schema from the **first element only**; an empty
//!   array gets an untyped (`type: string`) item schema,
//! - a missing sample (no response body at all) is rendered as `type: string`.
//!
//! Rendering produces indented YAML text rather than a document model because
//! the spec assembler splices it verbatim into larger blocks.
//!
//! ```
//! use bistool::schema::SchemaNode;
//! use serde_json::json;
//!
//! let node = SchemaNode::infer(&json!([]));
//! assert_eq!(node.render(""), "type: array\nitems:\n  type: string\n");
//! ```

use indexmap::IndexMap;
use serde_json::{Number, Value};

/// Indentation added per nesting level.
pub const INDENT: &str = "  ";

/// One node of an inferred schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    /// Element schema, inferred from element 0.
    Array(Box<SchemaNode>),
    /// Properties in the source object's key order.
    Object(IndexMap<String, SchemaNode>),
    /// No value to sample from. Rendered as a plain string schema.
    Untyped,
}

impl SchemaNode {
    /// Infer a schema from a JSON value.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null => SchemaNode::Null,
            Value::Bool(b) => SchemaNode::Boolean(*b),
            Value::Number(n) => SchemaNode::Number(n.clone()),
            Value::String(s) => SchemaNode::String(s.clone()),
            Value::Array(items) => {
                let item = items.first().map_or(SchemaNode::Untyped, SchemaNode::infer);
                SchemaNode::Array(Box::new(item))
            }
            Value::Object(map) => SchemaNode::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), SchemaNode::infer(value)))
                    .collect(),
            ),
        }
    }

    /// Infer from a sample that may be absent.
    pub fn from_sample(sample: Option<&Value>) -> Self {
        sample.map_or(SchemaNode::Untyped, SchemaNode::infer)
    }

    /// The schema `type` keyword for this node.
    pub fn type_name(&self) -> &'static str {
        match self {
            SchemaNode::Null => "null",
            SchemaNode::Boolean(_) => "boolean",
            SchemaNode::Number(_) => "number",
            SchemaNode::String(_) | SchemaNode::Untyped => "string",
            SchemaNode::Array(_) => "array",
            SchemaNode::Object(_) => "object",
        }
    }

    /// Render as YAML lines, each prefixed with `indent` and terminated by a newline.
    pub fn render(&self, indent: &str) -> String {
        let mut out = String::new();
        self.render_into(&mut out, indent);
        out
    }

    fn render_into(&self, out: &mut String, indent: &str) {
        push_line(out, indent, &format!("type: {}", self.type_name()));
        match self {
            SchemaNode::Null | SchemaNode::Untyped => {}
            SchemaNode::Boolean(b) => push_line(out, indent, &format!("example: {b}")),
            SchemaNode::Number(n) => push_line(out, indent, &format!("example: {n}")),
            SchemaNode::String(s) => push_line(out, indent, &format!("example: {}", quote(s))),
            SchemaNode::Array(item) => {
                push_line(out, indent, "items:");
                item.render_into(out, &format!("{indent}{INDENT}"));
            }
            SchemaNode::Object(properties) => {
                push_line(out, indent, "properties:");
                let key_indent = format!("{indent}{INDENT}");
                let child_indent = format!("{key_indent}{INDENT}");
                for (key, child) in properties {
                    push_line(out, &key_indent, &format!("{}:", yaml_key(key)));
                    child.render_into(out, &child_indent);
                }
            }
        }
    }
}

/// Infer and render in one step.
pub fn infer_schema(sample: Option<&Value>, indent: &str) -> String {
    SchemaNode::from_sample(sample).render(indent)
}

fn push_line(out: &mut String, indent: &str, line: &str) {
    out.push_str(indent);
    out.push_str(line);
    out.push('\n');
}

/// Double-quoted YAML scalar. JSON string syntax is a subset of YAML's.
pub(crate) fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Words a YAML 1.1 reader could resolve to a bool, null or number.
fn is_reserved(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "true" | "false" | "null" | "yes" | "no" | "on" | "off" | "y" | "n"
    ) || s.parse::<f64>().is_ok()
}

/// Mapping key, left bare when it cannot be misread as YAML syntax.
pub(crate) fn yaml_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !key.starts_with('-')
        && !is_reserved(key);
    if bare {
        key.to_string()
    } else {
        quote(key)
    }
}

/// Plain scalar value when it reads back as the same string, quoted otherwise.
/// Unlike keys, inner spaces and a few separators stay plain.
pub(crate) fn scalar(s: &str) -> String {
    let plain = s.starts_with(|c: char| c.is_ascii_alphabetic())
        && !s.ends_with(' ')
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.' | '/'))
        && !is_reserved(s);
    if plain {
        s.to_string()
    } else {
        quote(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_carry_examples() {
        assert_eq!(SchemaNode::infer(&json!(1)).render(""), "type: number\nexample: 1\n");
        assert_eq!(SchemaNode::infer(&json!(2.5)).render(""), "type: number\nexample: 2.5\n");
        assert_eq!(SchemaNode::infer(&json!(true)).render(""), "type: boolean\nexample: true\n");
        assert_eq!(
            SchemaNode::infer(&json!("Ann")).render(""),
            "type: string\nexample: \"Ann\"\n"
        );
    }

    #[test]
    fn test_null_has_no_example() {
        assert_eq!(SchemaNode::infer(&Value::Null).render(""), "type: null\n");
    }

    #[test]
    fn test_missing_sample_renders_as_string() {
        assert_eq!(infer_schema(None, ""), "type: string\n");
    }

    #[test]
    fn test_empty_array_defaults_to_string_items() {
        assert_eq!(
            infer_schema(Some(&json!([])), ""),
            "type: array\nitems:\n  type: string\n"
        );
    }

    #[test]
    fn test_array_samples_first_element_only() {
        let mixed = SchemaNode::infer(&json!([1, "a", "b"]));
        assert_eq!(mixed, SchemaNode::Array(Box::new(SchemaNode::infer(&json!(1)))));
        assert_eq!(
            mixed.render(""),
            "type: array\nitems:\n  type: number\n  example: 1\n"
        );
    }

    #[test]
    fn test_object_preserves_key_order() {
        let rendered = infer_schema(Some(&json!({"b": 1, "a": 2})), "");
        let b = rendered.find("  b:").unwrap();
        let a = rendered.find("  a:").unwrap();
        assert!(b < a, "{rendered}");
    }

    #[test]
    fn test_nested_object_indentation() {
        let rendered = infer_schema(Some(&json!({"user": {"id": 1, "tags": ["x"]}})), "    ");
        let expected = "    type: object
    properties:
      user:
        type: object
        properties:
          id:
            type: number
            example: 1
          tags:
            type: array
            items:
              type: string
              example: \"x\"
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_inference_is_deterministic() {
        let sample = json!({"id": 1, "items": [{"ok": true}], "note": null});
        assert_eq!(infer_schema(Some(&sample), "  "), infer_schema(Some(&sample), "  "));
    }

    #[test]
    fn test_awkward_keys_are_quoted() {
        let rendered = infer_schema(Some(&json!({"a b": 1, "true": 2, "42": 3, "ok_key": 4})), "");
        assert!(rendered.contains("  \"a b\":\n"));
        assert!(rendered.contains("  \"true\":\n"));
        assert!(rendered.contains("  \"42\":\n"));
        assert!(rendered.contains("  ok_key:\n"));
    }

    #[test]
    fn test_plain_scalars() {
        assert_eq!(scalar("Users"), "Users");
        assert_eq!(scalar("Lists active users"), "Lists active users");
        assert_eq!(scalar("v1.2/beta"), "v1.2/beta");
        assert_eq!(scalar(""), "\"\"");
        assert_eq!(scalar("No"), "\"No\"");
        assert_eq!(scalar("nan"), "\"nan\"");
        assert_eq!(scalar("a: b"), "\"a: b\"");
        assert_eq!(scalar("trailing "), "\"trailing \"");
        assert_eq!(scalar("#hash"), "\"#hash\"");
        assert_eq!(scalar("- item"), "\"- item\"");
    }

    #[test]
    fn test_string_examples_are_escaped() {
        let rendered = infer_schema(Some(&json!("say \"hi\"\n")), "");
        assert_eq!(rendered, "type: string\nexample: \"say \\\"hi\\\"\\n\"\n");
    }
}
