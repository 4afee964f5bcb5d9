//! Interpolation utilities for Value types.
//! - scalar blend `start * (1 - t) + end * t`, cast back to the start's kind
//! - elementwise recursion over sequences and maps
//! - structural addition used to turn deltas into end values

use crate::shape::ShapeError;
use crate::Value;

/// Blend two scalars. Integral starts round to nearest.
#[inline]
fn blend_scalar(start: &Value, a: f64, b: f64, t: f64) -> Value {
    let v = a * (1.0 - t) + b * t;
    match start {
        Value::Int(_) => Value::Int(v.round() as i64),
        _ => Value::Float(v),
    }
}

fn mismatch(start: &Value, end: &Value) -> ShapeError {
    ShapeError::Mismatch {
        path: String::new(),
        expected: start.kind().as_str().to_string(),
        found: end.kind().as_str().to_string(),
    }
}

/// Interpolate `start` towards `end` at `t` (eased progress, may overshoot [0,1]).
///
/// Every element of the result keeps the kind of the corresponding `start`
/// element. Shapes must match.
pub fn lerp_value(start: &Value, end: &Value, t: f64) -> Result<Value, ShapeError> {
    match (start, end) {
        (Value::Seq(xs), Value::Seq(ys)) => {
            if xs.len() != ys.len() {
                return Err(ShapeError::LengthMismatch {
                    path: String::new(),
                    expected: xs.len(),
                    found: ys.len(),
                });
            }
            xs.iter()
                .zip(ys)
                .enumerate()
                .map(|(i, (x, y))| lerp_value(x, y, t).map_err(|e| e.within(&format!("[{i}]"))))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Seq)
        }
        (Value::Map(xs), Value::Map(ys)) => xs
            .iter()
            .map(|(key, x)| {
                let y = ys.get(key).ok_or_else(|| ShapeError::MissingKey {
                    path: String::new(),
                    key: key.clone(),
                })?;
                lerp_value(x, y, t)
                    .map(|v| (key.clone(), v))
                    .map_err(|e| e.within(key))
            })
            .collect::<Result<_, _>>()
            .map(Value::Map),
        _ => match (start.as_f64(), end.as_f64()) {
            (Some(a), Some(b)) => Ok(blend_scalar(start, a, b, t)),
            _ => Err(mismatch(start, end)),
        },
    }
}

/// Structural sum `base + delta`. Two integers stay integral; any float makes
/// the sum a float. Maps are summed over the keys of `delta`.
pub fn add_values(base: &Value, delta: &Value) -> Result<Value, ShapeError> {
    match (base, delta) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.saturating_add(*b))),
        (Value::Seq(xs), Value::Seq(ds)) => {
            if xs.len() != ds.len() {
                return Err(ShapeError::LengthMismatch {
                    path: String::new(),
                    expected: ds.len(),
                    found: xs.len(),
                });
            }
            xs.iter()
                .zip(ds)
                .enumerate()
                .map(|(i, (x, d))| add_values(x, d).map_err(|e| e.within(&format!("[{i}]"))))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Seq)
        }
        (Value::Map(xs), Value::Map(ds)) => ds
            .iter()
            .map(|(key, d)| {
                let x = xs.get(key).ok_or_else(|| ShapeError::MissingKey {
                    path: String::new(),
                    key: key.clone(),
                })?;
                add_values(x, d)
                    .map(|v| (key.clone(), v))
                    .map_err(|e| e.within(key))
            })
            .collect::<Result<_, _>>()
            .map(Value::Map),
        _ => match (base.as_f64(), delta.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(a + b)),
            _ => Err(mismatch(delta, base)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_sequence_halfway() {
        let start = Value::from([0, 0, 0]);
        let end = Value::from([10, 20, 30]);
        let mid = lerp_value(&start, &end, 0.5).unwrap();
        assert_eq!(mid, Value::from([5, 10, 15]));
    }

    #[test]
    fn kind_follows_start_element() {
        let start = Value::seq([Value::i(0), Value::f(0.0)]);
        let end = Value::seq([Value::f(3.0), Value::f(3.0)]);
        let v = lerp_value(&start, &end, 0.5).unwrap();
        // 1.5 rounds half away from zero
        assert_eq!(v, Value::seq([Value::i(2), Value::f(1.5)]));
    }

    #[test]
    fn integral_rounding_is_nearest() {
        let v = lerp_value(&Value::i(0), &Value::i(10), 0.26).unwrap();
        assert_eq!(v, Value::i(3));
        let v = lerp_value(&Value::i(0), &Value::i(10), 0.24).unwrap();
        assert_eq!(v, Value::i(2));
        let v = lerp_value(&Value::i(0), &Value::i(-10), 0.25).unwrap();
        assert_eq!(v, Value::i(-3));
    }

    #[test]
    fn endpoints_are_exact() {
        let start = Value::f(0.1);
        let end = Value::f(0.7);
        assert_eq!(lerp_value(&start, &end, 0.0).unwrap(), start);
        assert_eq!(lerp_value(&start, &end, 1.0).unwrap(), end);
    }

    #[test]
    fn map_interpolation_and_missing_key() {
        let start = Value::map([("r", 0.0), ("g", 1.0)]);
        let end = Value::map([("r", 1.0), ("g", 0.0)]);
        assert_eq!(
            lerp_value(&start, &end, 0.25).unwrap(),
            Value::map([("r", 0.25), ("g", 0.75)])
        );
        let short = Value::map([("r", 1.0)]);
        let err = lerp_value(&start, &short, 0.5).unwrap_err();
        assert!(matches!(err, ShapeError::MissingKey { ref key, .. } if key == "g"));
    }

    #[test]
    fn scalar_against_sequence_is_a_mismatch() {
        let err = lerp_value(&Value::f(0.0), &Value::from([1.0]), 0.5).unwrap_err();
        assert!(matches!(err, ShapeError::Mismatch { .. }));
    }

    #[test]
    fn add_values_recurses() {
        let base = Value::map([("pos", Value::from([1, 2])), ("alpha", Value::f(0.5))]);
        let delta = Value::map([("pos", Value::from([10, 10]))]);
        assert_eq!(
            add_values(&base, &delta).unwrap(),
            Value::map([("pos", Value::from([11, 12]))])
        );
        assert_eq!(
            add_values(&Value::i(2), &Value::f(0.5)).unwrap(),
            Value::f(2.5)
        );
    }
}
