//! Named value transforms applied with `expr | name` or `expr | name:arg`.
//!
//! The default registry carries the built-in filters. Applying a filter that
//! is not registered leaves the value unchanged.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use crate::expression::length;
use crate::processor::html_escape;
use crate::value::{Markup, Value};


/// Element id used by `json_script` when no argument is given.
pub const DEFAULT_JSON_SCRIPT_ID: &str = "json-data";

type FilterFn = dyn Fn(Value, Option<Value>) -> Value + Send + Sync;

#[derive(Clone)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<FilterFn>>,
}

impl FilterRegistry {
    /// A registry without any filter, not even the built-ins.
    pub fn empty() -> Self {
        FilterRegistry { filters: HashMap::new() }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, filter: F)
    where F: Fn(Value, Option<Value>) -> Value + Send + Sync + 'static {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names = self.filters.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    pub(crate) fn apply(&self, name: &str, value: Value, argument: Option<Value>) -> Value {
        match self.filters.get(name) {
            Some(filter) => filter(value, argument),
            None => {
                tracing::trace!(filter = name, "unknown filter, value passed through");
                value
            }
        }
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        let mut registry = FilterRegistry::empty();
        registry.register("upper", |value, _| map_str(value, |s| s.to_uppercase()));
        registry.register("lower", |value, _| map_str(value, |s| s.to_lowercase()));
        registry.register("trim", |value, _| map_str(value, |s| s.trim().to_owned()));
        registry.register("safe", |value, _| safe(value));
        registry.register("escape", |value, _| escape(value));
        registry.register("escapejs", |value, _| escapejs(&value));
        registry.register("raw_json", |value, _| raw_json(&value));
        registry.register("json_script", json_script);
        registry.register("default", default);
        registry.register("length", |value, _| {
            Value::from(length(&value).unwrap_or_default())
        });
        registry.register("join", join);
        registry
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.names())
            .finish()
    }
}


fn map_str(value: Value, fun: impl Fn(&str) -> String) -> Value {
    match value {
        Value::Str(s) => Value::Str(fun(&s)),
        other => other
    }
}

fn safe(value: Value) -> Value {
    match value {
        Value::Safe(_) => value,
        other => Value::safe(other.to_string())
    }
}

fn escape(value: Value) -> Value {
    match value {
        Value::Safe(_) => value,
        other => Value::safe(html_escape(&other.to_string()))
    }
}

fn escapejs(value: &Value) -> Value {
    let text = value.to_string();
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('"');
    for c in text.chars() {
        match c {
            '\\' => literal.push_str("\\\\"),
            '"' => literal.push_str("\\\""),
            '\'' => literal.push_str("\\'"),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            '\u{2028}' => literal.push_str("\\u2028"),
            '\u{2029}' => literal.push_str("\\u2029"),
            c if c < ' ' => literal.push_str(&format!("\\u{:04x}", c as u32)),
            c => literal.push(c),
        }
    }
    literal.push('"');
    Value::safe(defuse_script_close(&literal))
}

fn json_text(value: &Value) -> String {
    let text = serde_json::to_string(value).unwrap_or_else(|err| {
        tracing::trace!(error = %err, "value is not serializable, emitting null");
        "null".to_owned()
    });
    defuse_script_close(&text)
}

fn raw_json(value: &Value) -> Value {
    Value::safe(json_text(value))
}

fn json_script(value: Value, id: Option<Value>) -> Value {
    let id = id.map(|id| id.to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_JSON_SCRIPT_ID.to_owned());
    Value::Safe(Markup::new(format!(
        r#"<script type="application/json" id="{}">{}</script>"#,
        html_escape(&id),
        json_text(&value)
    )))
}

fn default(value: Value, fallback: Option<Value>) -> Value {
    match fallback {
        Some(fallback) if !value.is_truthy() => fallback,
        _ => value
    }
}

fn join(value: Value, separator: Option<Value>) -> Value {
    let separator = separator.map_or_else(|| ",".to_owned(), |sep| sep.to_string());
    match value {
        Value::Seq(items) => Value::Str(
            items.iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(&separator)
        ),
        other => other
    }
}

/// Rewrites every `</script`, in any letter case, as `<\/script`.
pub(crate) fn defuse_script_close(text: &str) -> String {
    const NEEDLE: &str = "</script";
    // ascii lowercasing keeps byte offsets aligned with `text`
    let lowered = text.to_ascii_lowercase();
    let mut result = String::with_capacity(text.len());
    let mut start = 0;
    while let Some(p) = lowered[start..].find(NEEDLE) {
        let at = start + p;
        result.push_str(&text[start..at]);
        result.push_str("<\\/");
        start = at + 2;
    }
    result.push_str(&text[start..]);
    result
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn apply(name: &str, value: impl Into<Value>, argument: Option<Value>) -> Value {
        FilterRegistry::default().apply(name, value.into(), argument)
    }

    #[test]
    fn case_filters_ignore_non_strings() {
        assert_eq!(apply("upper", "aBc", None), Value::from("ABC"));
        assert_eq!(apply("lower", "aBc", None), Value::from("abc"));
        assert_eq!(apply("upper", 12, None), Value::Int(12));
        assert_eq!(apply("lower", Value::Null, None), Value::Null);
    }

    #[test]
    fn safe_wraps_string_form() {
        assert_eq!(apply("safe", "<b>", None), Value::safe("<b>"));
        assert_eq!(apply("safe", 3, None), Value::safe("3"));
        assert_eq!(apply("escape", "<b>", None), Value::safe("&lt;b&gt;"));
        assert_eq!(apply("escape", Value::safe("<b>"), None), Value::safe("<b>"));
    }

    #[test]
    fn escapejs_quotes_and_escapes() {
        let value = apply("escapejs", "a\"b'c\\d\ne\u{2028}</SCRIPT>", None);
        assert_eq!(value, Value::safe(r#""a\"b\'c\\d\ne\u2028<\/SCRIPT>""#));
        assert_eq!(apply("escapejs", Value::Undefined, None), Value::safe(r#""""#));
    }

    #[test]
    fn raw_json_defuses_script_close() {
        let value = Value::from_iter([("x", "</script><script>alert(1)</ScRiPt>")]);
        let Value::Safe(json) = apply("raw_json", value, None) else {
            panic!("raw_json must produce markup");
        };
        assert!(!json.as_str().to_ascii_lowercase().contains("</script"));
        assert_eq!(json.as_str(), r#"{"x":"<\/script><script>alert(1)<\/ScRiPt>"}"#);
    }

    #[test]
    fn raw_json_degrades_to_null() {
        let value = Value::from_iter([("f", Value::function(|_| Ok(Value::Null)))]);
        assert_eq!(apply("raw_json", value, None), Value::safe("null"));
    }

    #[test]
    fn json_script_element() {
        let value = Value::from(vec![1, 2]);
        assert_eq!(
            apply("json_script", value.clone(), None),
            Value::safe(r#"<script type="application/json" id="json-data">[1,2]</script>"#)
        );
        assert_eq!(
            apply("json_script", value, Some(Value::from("a\"b"))),
            Value::safe(r#"<script type="application/json" id="a&quot;b">[1,2]</script>"#)
        );
    }

    #[test]
    fn default_length_join() {
        assert_eq!(apply("default", "", Some(Value::from("x"))), Value::from("x"));
        assert_eq!(apply("default", "y", Some(Value::from("x"))), Value::from("y"));
        assert_eq!(apply("default", Value::Null, None), Value::Null);
        assert_eq!(apply("length", vec!["a", "b"], None), Value::Int(2));
        assert_eq!(apply("length", "héllo", None), Value::Int(5));
        assert_eq!(apply("length", Value::Undefined, None), Value::Int(0));
        assert_eq!(apply("join", vec![1, 2, 3], None), Value::from("1,2,3"));
        assert_eq!(apply("join", vec![1, 2], Some(Value::from(" - "))), Value::from("1 - 2"));
    }

    #[test]
    fn unknown_filter_passes_through() {
        assert_eq!(apply("nope", "v", Some(Value::Int(1))), Value::from("v"));
    }

    #[test]
    fn custom_filters_replace_builtins() {
        let mut registry = FilterRegistry::default();
        registry.register("upper", |_, _| Value::from("custom"));
        assert_eq!(registry.apply("upper", Value::from("a"), None), Value::from("custom"));
        assert!(FilterRegistry::empty().names().is_empty());
    }
}
