//! Value: property values read from and written to animation targets.
//! Numbers are either integral or floating; containers nest arbitrarily.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Coarse kind of a [`Value`], used for diagnostics and cast-back rules.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Float,
    Int,
    Seq,
    Map,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Float => "float",
            ValueKind::Int => "int",
            ValueKind::Seq => "seq",
            ValueKind::Map => "map",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Value {
    /// Floating-point scalar
    Float(f64),

    /// Integral scalar; interpolated results are rounded back to an integer
    Int(i64),

    /// Fixed-length ordered sequence
    Seq(Vec<Value>),

    /// Keyed mapping; insertion order is preserved
    Map(IndexMap<String, Value>),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Int(_) => ValueKind::Int,
            Value::Seq(_) => ValueKind::Seq,
            Value::Map(_) => ValueKind::Map,
        }
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Float(_) | Value::Int(_))
    }

    /// Numeric view of a scalar. Containers yield `None`.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a key of a `Map` value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Convenience constructors
    pub fn f(v: f64) -> Self {
        Value::Float(v)
    }

    pub fn i(v: i64) -> Self {
        Value::Int(v)
    }

    pub fn seq<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::seq(items)
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for Value {
    fn from(items: [V; N]) -> Self {
        Value::seq(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_keep_kinds() {
        assert_eq!(Value::from(3).kind(), ValueKind::Int);
        assert_eq!(Value::from(3.0).kind(), ValueKind::Float);
        assert_eq!(Value::from([1, 2, 3]).kind(), ValueKind::Seq);
        assert_eq!(Value::map([("a", 1.0)]).kind(), ValueKind::Map);
    }

    #[test]
    fn tagged_serde_roundtrip() {
        let v = Value::map([("pos", Value::from([1.5, 2.0])), ("z", Value::i(4))]);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["type"], "map");
        assert_eq!(json["data"]["z"]["type"], "int");
        let back: Value = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }
}
