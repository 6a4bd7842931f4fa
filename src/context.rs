use serde::Serialize;
use crate::error::{Error, Result};
use crate::json::JsonValue;
use crate::value::{Map, Value};
use crate::yaml::YamlValue;


/// Caller-supplied data a template is rendered against.
///
/// Rendering only ever borrows a context; loop variables are bound in a
/// separate scope and never leak back into it.
#[derive(Debug, Clone, Default)]
pub struct Context {
    vars: Map,
}

impl Context {
    pub fn new() -> Self {
        Context { vars: Map::new() }
    }

    /// Build a context from any value serializing to a mapping.
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self> {
        let json = serde_json::to_value(data)?;
        Context::try_from(Value::from(json))
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.vars.insert(name.into(), value.into())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl TryFrom<Value> for Context {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Map(vars) => Ok(Context { vars }),
            other => Err(Error::ContextNotMapping(other.type_name()))
        }
    }
}

impl TryFrom<JsonValue> for Context {
    type Error = Error;

    fn try_from(json: JsonValue) -> Result<Self> {
        Context::try_from(Value::from(json))
    }
}

impl TryFrom<YamlValue> for Context {
    type Error = Error;

    fn try_from(yaml: YamlValue) -> Result<Self> {
        Context::try_from(Value::from(yaml))
    }
}

impl From<Map> for Context {
    fn from(vars: Map) -> Self {
        Context { vars }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Context {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
        }
    }
}


/// Name resolution during a render: loop frames on top of the caller's context.
pub(crate) struct Stack<'a> {
    root: &'a Context,
    frames: Vec<Map>,
}

impl<'a> Stack<'a> {
    pub(crate) fn new(root: &'a Context) -> Self {
        Stack {
            root,
            frames: Vec::new(),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.root.get(name))
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push(&mut self, frame: Map) {
        self.frames.push(frame);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.frames.truncate(len);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Serialize)]
    struct Page {
        title: &'static str,
        tags: Vec<&'static str>,
    }

    #[test]
    fn from_serialize() {
        let context = Context::from_serialize(&Page { title: "t", tags: vec!["a"] }).unwrap();
        assert_eq!(context.get("title"), Some(&Value::from("t")));
        assert_eq!(context.get("tags"), Some(&Value::from(vec!["a"])));
    }

    #[test]
    fn scalar_is_not_a_context() {
        let result = Context::from_serialize(&42);
        assert!(matches!(result, Err(Error::ContextNotMapping("int"))));
    }

    #[test]
    fn frames_shadow_root() {
        let context = Context::new().with("x", 1).with("y", 2);
        let mut stack = Stack::new(&context);
        let len = stack.len();
        stack.push(Map::from_iter([("x".to_owned(), Value::Int(10))]));
        assert_eq!(stack.get("x"), Some(&Value::Int(10)));
        assert_eq!(stack.get("y"), Some(&Value::Int(2)));
        stack.truncate(len);
        assert_eq!(stack.get("x"), Some(&Value::Int(1)));
        assert_eq!(context.get("x"), Some(&Value::Int(1)));
    }
}
