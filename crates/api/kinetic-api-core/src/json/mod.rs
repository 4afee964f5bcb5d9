use serde_json::{json, Map, Value as JsonValue};

use crate::Value;

/// Normalize shorthand `Value` JSON into the canonical `{ "type": ..., "data": ... }`
/// representation understood by the serde derives on [`Value`].
///
/// Accepted shorthands:
/// - integers (`3`) become `int`, other numbers (`3.5`) become `float`
/// - arrays become `seq` (elements normalized recursively)
/// - objects become `map` (values normalized recursively)
/// - `{ "float": 1 }` / `{ "int": 2 }` force a scalar kind
///
/// Objects already in canonical form are returned untouched. A single-key
/// object named `float` or `int` with a numeric value is always read as the
/// forced scalar, so a map with exactly that one key has to be written in
/// canonical form: `{ "type": "map", "data": { "int": { "type": "int", "data": 3 } } }`.
pub fn normalize_value_json(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Number(n) => {
            if n.is_i64() || n.is_u64() {
                json!({ "type": "int", "data": n })
            } else {
                json!({ "type": "float", "data": n })
            }
        }
        JsonValue::Array(arr) => {
            let data: Vec<JsonValue> = arr.into_iter().map(normalize_value_json).collect();
            json!({ "type": "seq", "data": data })
        }
        JsonValue::Object(obj) => {
            if obj.contains_key("type") && obj.contains_key("data") {
                return JsonValue::Object(obj);
            }
            if obj.len() == 1 {
                if let Some(f) = obj.get("float").and_then(|x| x.as_f64()) {
                    return json!({ "type": "float", "data": f });
                }
                if let Some(i) = obj.get("int").and_then(|x| x.as_i64()) {
                    return json!({ "type": "int", "data": i });
                }
            }
            let mut data = Map::new();
            for (key, val) in obj.into_iter() {
                data.insert(key, normalize_value_json(val));
            }
            json!({ "type": "map", "data": JsonValue::Object(data) })
        }
        other => other,
    }
}

/// Convenience helper that normalizes Value JSON then deserializes it into the
/// strongly typed [`Value`] enum.
pub fn parse_value(value: JsonValue) -> Result<Value, serde_json::Error> {
    let normalized = normalize_value_json(value);
    serde_json::from_value(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_numbers_keep_integrality() {
        assert_eq!(parse_value(json!(3)).unwrap(), Value::Int(3));
        assert_eq!(parse_value(json!(3.5)).unwrap(), Value::Float(3.5));
        assert_eq!(parse_value(json!({ "float": 2 })).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn nested_shorthand() {
        let v = parse_value(json!({ "pos": [1, 2.5], "color": { "a": 1.0 } })).unwrap();
        assert_eq!(
            v,
            Value::map([
                ("pos", Value::seq([Value::Int(1), Value::Float(2.5)])),
                ("color", Value::map([("a", 1.0)])),
            ])
        );
    }

    #[test]
    fn canonical_passthrough() {
        let v = parse_value(json!({ "type": "float", "data": 4.0 })).unwrap();
        assert_eq!(v, Value::Float(4.0));
    }

    #[test]
    fn forced_scalar_keys_need_canonical_maps() {
        assert_eq!(parse_value(json!({ "int": 3 })).unwrap(), Value::Int(3));
        let v = parse_value(json!({
            "type": "map",
            "data": { "int": { "type": "int", "data": 3 } }
        }))
        .unwrap();
        assert_eq!(v, Value::map([("int", Value::i(3))]));
        // a second key keeps the shorthand a map
        let v = parse_value(json!({ "int": 3, "float": 0.5 })).unwrap();
        assert_eq!(v.get("int"), Some(&Value::Int(3)));
    }

    #[test]
    fn strings_are_rejected() {
        assert!(parse_value(json!("x")).is_err());
    }
}
