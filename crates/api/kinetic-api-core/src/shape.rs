//! Shape definitions and structural checks for property values.
//!
//! Integral and floating scalars share the `Scalar` shape; containers must
//! match element-for-element (sequences) or key-for-key (maps).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Value;

/// A keyed entry of a `Map` shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub shape: Shape,
}

/// Structural type of a value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "id", content = "data")]
pub enum Shape {
    Scalar,
    Seq(Vec<Shape>),
    Map(Vec<Field>),
}

impl Shape {
    /// Derive the shape of a concrete value.
    pub fn of(value: &Value) -> Shape {
        match value {
            Value::Float(_) | Value::Int(_) => Shape::Scalar,
            Value::Seq(items) => Shape::Seq(items.iter().map(Shape::of).collect()),
            Value::Map(entries) => Shape::Map(
                entries
                    .iter()
                    .map(|(k, v)| Field {
                        name: k.clone(),
                        shape: Shape::of(v),
                    })
                    .collect(),
            ),
        }
    }

    fn describe(&self) -> String {
        match self {
            Shape::Scalar => "scalar".to_string(),
            Shape::Seq(items) => format!("seq of {}", items.len()),
            Shape::Map(fields) => format!("map of {}", fields.len()),
        }
    }
}

/// Structural disagreement between two values (or a value and a template).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ShapeError {
    #[error("shape mismatch at '{path}': expected {expected}, found {found}")]
    Mismatch {
        path: String,
        expected: String,
        found: String,
    },
    #[error("length mismatch at '{path}': expected {expected} elements, found {found}")]
    LengthMismatch {
        path: String,
        expected: usize,
        found: usize,
    },
    #[error("missing key '{key}' at '{path}'")]
    MissingKey { path: String, key: String },
}

impl ShapeError {
    fn mismatch(expected: &Value, found: &Value) -> Self {
        ShapeError::Mismatch {
            path: String::new(),
            expected: Shape::of(expected).describe(),
            found: Shape::of(found).describe(),
        }
    }

    /// Prefix the error location with an enclosing path segment.
    pub fn within(self, segment: &str) -> Self {
        let join = |path: String| {
            if path.is_empty() || path.starts_with('[') {
                format!("{segment}{path}")
            } else {
                format!("{segment}.{path}")
            }
        };
        match self {
            ShapeError::Mismatch {
                path,
                expected,
                found,
            } => ShapeError::Mismatch {
                path: join(path),
                expected,
                found,
            },
            ShapeError::LengthMismatch {
                path,
                expected,
                found,
            } => ShapeError::LengthMismatch {
                path: join(path),
                expected,
                found,
            },
            ShapeError::MissingKey { path, key } => ShapeError::MissingKey {
                path: join(path),
                key,
            },
        }
    }

    /// Location of the disagreement, relative to the checked value.
    pub fn path(&self) -> &str {
        match self {
            ShapeError::Mismatch { path, .. }
            | ShapeError::LengthMismatch { path, .. }
            | ShapeError::MissingKey { path, .. } => path,
        }
    }
}

/// Check that `a` and `b` have identical shapes.
pub fn ensure_same_shape(a: &Value, b: &Value) -> Result<(), ShapeError> {
    match (a, b) {
        (x, y) if x.is_scalar() && y.is_scalar() => Ok(()),
        (Value::Seq(xs), Value::Seq(ys)) => {
            if xs.len() != ys.len() {
                return Err(ShapeError::LengthMismatch {
                    path: String::new(),
                    expected: xs.len(),
                    found: ys.len(),
                });
            }
            for (i, (x, y)) in xs.iter().zip(ys).enumerate() {
                ensure_same_shape(x, y).map_err(|e| e.within(&format!("[{i}]")))?;
            }
            Ok(())
        }
        (Value::Map(xs), Value::Map(ys)) => {
            for (key, x) in xs {
                let y = ys.get(key).ok_or_else(|| ShapeError::MissingKey {
                    path: String::new(),
                    key: key.clone(),
                })?;
                ensure_same_shape(x, y).map_err(|e| e.within(key))?;
            }
            if let Some(extra) = ys.keys().find(|k| !xs.contains_key(*k)) {
                return Err(ShapeError::MissingKey {
                    path: String::new(),
                    key: extra.clone(),
                });
            }
            Ok(())
        }
        _ => Err(ShapeError::mismatch(a, b)),
    }
}

/// Take a non-aliased copy of `live` restricted to the structure of `template`.
///
/// Maps keep only the keys named by the template (recursively); sequences must
/// have the template's length. This is how a property snapshot is captured.
pub fn project(live: &Value, template: &Value) -> Result<Value, ShapeError> {
    match (template, live) {
        (t, l) if t.is_scalar() && l.is_scalar() => Ok(l.clone()),
        (Value::Seq(ts), Value::Seq(ls)) => {
            if ts.len() != ls.len() {
                return Err(ShapeError::LengthMismatch {
                    path: String::new(),
                    expected: ts.len(),
                    found: ls.len(),
                });
            }
            ts.iter()
                .zip(ls)
                .enumerate()
                .map(|(i, (t, l))| project(l, t).map_err(|e| e.within(&format!("[{i}]"))))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Seq)
        }
        (Value::Map(ts), Value::Map(ls)) => ts
            .iter()
            .map(|(key, t)| {
                let l = ls.get(key).ok_or_else(|| ShapeError::MissingKey {
                    path: String::new(),
                    key: key.clone(),
                })?;
                project(l, t)
                    .map(|v| (key.clone(), v))
                    .map_err(|e| e.within(key))
            })
            .collect::<Result<_, _>>()
            .map(Value::Map),
        _ => Err(ShapeError::mismatch(template, live)),
    }
}

/// Write `partial` over `live`: map keys not present in `partial` are kept at
/// any depth, including maps held in equal-length sequences. Everything else
/// is replaced.
pub fn overlay(live: &Value, partial: &Value) -> Value {
    match (live, partial) {
        (Value::Seq(ls), Value::Seq(ps)) if ls.len() == ps.len() => {
            Value::Seq(ls.iter().zip(ps).map(|(l, p)| overlay(l, p)).collect())
        }
        (Value::Map(ls), Value::Map(ps)) => {
            let mut merged = ls.clone();
            for (key, p) in ps {
                let next = match ls.get(key) {
                    Some(l) => overlay(l, p),
                    None => p.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Map(merged)
        }
        _ => partial.clone(),
    }
}
