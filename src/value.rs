use std::fmt;
use std::sync::Arc;
use indexmap::IndexMap;
use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};


/// Insertion-ordered mapping used for [Value::Map] and [Context](crate::Context).
pub type Map = IndexMap<String, Value>;

type Callable = dyn Fn(Option<&Value>) -> Result<Value, String> + Send + Sync;

/// A zero-argument callable stored in a context.
///
/// It receives the value it was read from (`user` for `user.name()`),
/// or `None` when invoked from the context root.
#[derive(Clone)]
pub struct Function(Arc<Callable>);

impl Function {
    pub fn new<F>(fun: F) -> Self
    where F: Fn(Option<&Value>) -> Result<Value, String> + Send + Sync + 'static {
        Function(Arc::new(fun))
    }

    pub fn call(&self, receiver: Option<&Value>) -> Result<Value, String> {
        (self.0)(receiver)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function {{...}}")
    }
}


/// A string that is already safe to emit without HTML escaping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Markup(String);

impl Markup {
    pub fn new(text: impl Into<String>) -> Self {
        Markup(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}


/// Runtime value seen by expressions.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Safe(Markup),
    Seq(Vec<Value>),
    Map(Map),
    Function(Function),
}

impl Value {
    pub fn function<F>(fun: F) -> Self
    where F: Fn(Option<&Value>) -> Result<Value, String> + Send + Sync + 'static {
        Value::Function(Function::new(fun))
    }

    pub fn safe(text: impl Into<String>) -> Self {
        Value::Safe(Markup::new(text))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Value::Safe(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Safe(markup) => Some(markup.as_str()),
            _ => None,
        }
    }

    /// Only undefined, null, `false`, the empty string, zero and NaN are falsy.
    /// Empty sequences and mappings are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Safe(_) | Value::Seq(_) | Value::Map(_) | Value::Function(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Safe(_) => "markup",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "mapping",
            Value::Function(_) => "function",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_infinite() => {
                f.write_str(if *x > 0.0 { "Infinity" } else { "-Infinity" })
            },
            Value::Float(x) if x.is_nan() => f.write_str("NaN"),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Safe(markup) => f.write_str(markup.as_str()),
            Value::Seq(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            },
            Value::Map(_) => f.write_str("[object Object]"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Safe(a), Value::Safe(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(&a.0, &b.0),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Safe(markup) => serializer.serialize_str(markup.as_str()),
            Value::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            },
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            },
            Value::Function(_) => Err(S::Error::custom("functions cannot be serialized")),
        }
    }
}


impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        i64::try_from(i).map_or(Value::Float(i as f64), Value::Int)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Markup> for Value {
    fn from(markup: Markup) -> Self {
        Value::Safe(markup)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<Function> for Value {
    fn from(fun: Function) -> Self {
        Value::Function(fun)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn truthiness() {
        let falsy = vec![
            Value::Undefined, Value::Null, Value::Bool(false),
            Value::Int(0), Value::Float(0.0), Value::Float(f64::NAN), Value::from(""),
        ];
        for value in falsy {
            assert!(!value.is_truthy(), "{:?} should be falsy", value);
        }
        let truthy = vec![
            Value::Bool(true), Value::Int(-1), Value::from("0"),
            Value::Seq(vec![]), Value::Map(Map::new()), Value::safe(""),
        ];
        for value in truthy {
            assert!(value.is_truthy(), "{:?} should be truthy", value);
        }
    }

    #[test]
    fn string_forms() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Float(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(Value::from(vec![Value::Int(1), Value::Null, Value::from("a")]).to_string(), "1,,a");
        assert_eq!(Value::from_iter([("a", 1)]).to_string(), "[object Object]");
    }

    #[test]
    fn numbers_compare_across_kinds() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert!(Value::Int(2) != Value::from("2"));
    }

    #[test]
    fn functions_do_not_serialize() {
        let value = Value::from_iter([("f", Value::function(|_| Ok(Value::Null)))]);
        assert!(serde_json::to_string(&value).is_err());
        let value = Value::from_iter([("a", Value::Undefined)]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"a":null}"#);
    }
}
