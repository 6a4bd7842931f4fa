use crate::value::{Map, Value};
pub use serde_yaml::Value as YamlValue;


impl From<YamlValue> for Value {
    fn from(yaml: YamlValue) -> Self {
        match yaml {
            YamlValue::Null => Value::Null,
            YamlValue::Bool(b) => Value::Bool(b),
            YamlValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN))
            },
            YamlValue::String(s) => Value::Str(s),
            YamlValue::Sequence(seq) =>
                Value::Seq(
                    seq.into_iter()
                        .map(Value::from)
                        .collect::<_>()
                ),
            YamlValue::Mapping(mapping) => {
                let mut map = Map::with_capacity(mapping.len());
                for (key, value) in mapping {
                    // only scalar keys can be addressed from a template
                    if let Some(key) = scalar_key(key) {
                        map.insert(key, Value::from(value));
                    }
                }
                Value::Map(map)
            },
            YamlValue::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

impl From<&YamlValue> for Value {
    fn from(yaml: &YamlValue) -> Self {
        Value::from(yaml.clone())
    }
}

fn scalar_key(key: YamlValue) -> Option<String> {
    match key {
        YamlValue::String(s) => Some(s),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Tagged(tagged) => scalar_key(tagged.value),
        _ => None
    }
}
