use crate::value::Value;
pub use serde_json::Value as JsonValue;


impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN))
            },
            JsonValue::String(s) => Value::Str(s),
            JsonValue::Array(seq) =>
                Value::Seq(
                    seq.into_iter()
                        .map(Value::from)
                        .collect::<_>()
                ),
            JsonValue::Object(obj) =>
                Value::Map(
                    obj.into_iter()
                        .map(|(key, value)| (key, Value::from(value)))
                        .collect::<_>()
                ),
        }
    }
}

impl From<&JsonValue> for Value {
    fn from(json: &JsonValue) -> Self {
        Value::from(json.clone())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn object_keeps_insertion_order() {
        let json = serde_json::from_str::<JsonValue>(r#"{"z": 1, "a": 2.5, "m": [true, null]}"#).unwrap();
        let Value::Map(map) = Value::from(json) else {
            panic!("expected a mapping");
        };
        assert_eq!(map.keys().map(String::as_str).collect::<Vec<_>>(), vec!["z", "a", "m"]);
        assert_eq!(map["z"], Value::Int(1));
        assert_eq!(map["a"], Value::Float(2.5));
        assert_eq!(map["m"], Value::Seq(vec![Value::Bool(true), Value::Null]));
    }
}
