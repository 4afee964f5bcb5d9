//! Easing curves and the name → curve registry.
//!
//! Every curve maps normalized progress `p` in [0,1] to an eased factor. Most
//! curves stay within [0,1]; `back` and `elastic` overshoot on purpose.
//! Names follow the `ease_{in,out,in_out}_<family>` convention plus `linear`.

use std::f64::consts::PI;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::error::AnimationError;

/// Shared easing curve.
pub type EasingFn = Rc<dyn Fn(f64) -> f64>;

const BACK_S: f64 = 1.70158;
const BOUNCE_K: f64 = 7.5625;

#[inline]
pub fn linear(p: f64) -> f64 {
    p
}

#[inline]
pub fn ease_in_quad(p: f64) -> f64 {
    p * p
}

#[inline]
pub fn ease_out_quad(p: f64) -> f64 {
    -p * (p - 2.0)
}

pub fn ease_in_out_quad(p: f64) -> f64 {
    let mut q = p * 2.0;
    if q < 1.0 {
        return 0.5 * q * q;
    }
    q -= 1.0;
    -0.5 * (q * (q - 2.0) - 1.0)
}

#[inline]
pub fn ease_in_cubic(p: f64) -> f64 {
    p * p * p
}

#[inline]
pub fn ease_out_cubic(p: f64) -> f64 {
    let q = p - 1.0;
    q * q * q + 1.0
}

pub fn ease_in_out_cubic(p: f64) -> f64 {
    let mut q = p * 2.0;
    if q < 1.0 {
        return 0.5 * q * q * q;
    }
    q -= 2.0;
    0.5 * (q * q * q + 2.0)
}

#[inline]
pub fn ease_in_quart(p: f64) -> f64 {
    p * p * p * p
}

#[inline]
pub fn ease_out_quart(p: f64) -> f64 {
    let q = p - 1.0;
    -(q * q * q * q - 1.0)
}

pub fn ease_in_out_quart(p: f64) -> f64 {
    let mut q = p * 2.0;
    if q < 1.0 {
        return 0.5 * q * q * q * q;
    }
    q -= 2.0;
    -0.5 * (q * q * q * q - 2.0)
}

#[inline]
pub fn ease_in_quint(p: f64) -> f64 {
    p * p * p * p * p
}

#[inline]
pub fn ease_out_quint(p: f64) -> f64 {
    let q = p - 1.0;
    q * q * q * q * q + 1.0
}

pub fn ease_in_out_quint(p: f64) -> f64 {
    let mut q = p * 2.0;
    if q < 1.0 {
        return 0.5 * q * q * q * q * q;
    }
    q -= 2.0;
    0.5 * (q * q * q * q * q + 2.0)
}

#[inline]
pub fn ease_in_sine(p: f64) -> f64 {
    1.0 - (p * PI / 2.0).cos()
}

#[inline]
pub fn ease_out_sine(p: f64) -> f64 {
    (p * PI / 2.0).sin()
}

#[inline]
pub fn ease_in_out_sine(p: f64) -> f64 {
    -0.5 * ((PI * p).cos() - 1.0)
}

pub fn ease_in_expo(p: f64) -> f64 {
    if p == 0.0 {
        return 0.0;
    }
    2f64.powf(10.0 * (p - 1.0))
}

pub fn ease_out_expo(p: f64) -> f64 {
    if p == 1.0 {
        return 1.0;
    }
    1.0 - 2f64.powf(-10.0 * p)
}

pub fn ease_in_out_expo(p: f64) -> f64 {
    if p == 0.0 {
        return 0.0;
    }
    if p == 1.0 {
        return 1.0;
    }
    let mut q = p * 2.0;
    if q < 1.0 {
        return 0.5 * 2f64.powf(10.0 * (q - 1.0));
    }
    q -= 1.0;
    0.5 * (2.0 - 2f64.powf(-10.0 * q))
}

#[inline]
pub fn ease_in_circ(p: f64) -> f64 {
    -((1.0 - p * p).sqrt() - 1.0)
}

#[inline]
pub fn ease_out_circ(p: f64) -> f64 {
    let q = p - 1.0;
    (1.0 - q * q).sqrt()
}

pub fn ease_in_out_circ(p: f64) -> f64 {
    let mut q = p * 2.0;
    if q < 1.0 {
        return -0.5 * ((1.0 - q * q).sqrt() - 1.0);
    }
    q -= 2.0;
    0.5 * ((1.0 - q * q).sqrt() + 1.0)
}

/// Period 0.3 of the unit interval, phase shift a quarter period.
pub fn ease_in_elastic(p: f64) -> f64 {
    if p == 1.0 {
        return 1.0;
    }
    let period = 0.3;
    let shift = period / 4.0;
    let q = p - 1.0;
    -(2f64.powf(10.0 * q) * ((q - shift) * (2.0 * PI) / period).sin())
}

pub fn ease_out_elastic(p: f64) -> f64 {
    if p == 1.0 {
        return 1.0;
    }
    let period = 0.3;
    let shift = period / 4.0;
    2f64.powf(-10.0 * p) * ((p - shift) * (2.0 * PI) / period).sin() + 1.0
}

pub fn ease_in_out_elastic(p: f64) -> f64 {
    if p == 1.0 {
        return 1.0;
    }
    let period = 0.3 * 1.5;
    let shift = period / 4.0;
    let q = p * 2.0 - 1.0;
    let wave = ((q - shift) * (2.0 * PI) / period).sin();
    if q < 0.0 {
        -0.5 * (2f64.powf(10.0 * q) * wave)
    } else {
        2f64.powf(-10.0 * q) * wave * 0.5 + 1.0
    }
}

#[inline]
pub fn ease_in_back(p: f64) -> f64 {
    p * p * ((BACK_S + 1.0) * p - BACK_S)
}

#[inline]
pub fn ease_out_back(p: f64) -> f64 {
    let q = p - 1.0;
    q * q * ((BACK_S + 1.0) * q + BACK_S) + 1.0
}

pub fn ease_in_out_back(p: f64) -> f64 {
    let s = BACK_S * 1.525;
    let mut q = p * 2.0;
    if q < 1.0 {
        return 0.5 * (q * q * ((s + 1.0) * q - s));
    }
    q -= 2.0;
    0.5 * (q * q * ((s + 1.0) * q + s) + 2.0)
}

pub fn ease_out_bounce(p: f64) -> f64 {
    if p < 1.0 / 2.75 {
        BOUNCE_K * p * p
    } else if p < 2.0 / 2.75 {
        let q = p - 1.5 / 2.75;
        BOUNCE_K * q * q + 0.75
    } else if p < 2.5 / 2.75 {
        let q = p - 2.25 / 2.75;
        BOUNCE_K * q * q + 0.9375
    } else {
        let q = p - 2.625 / 2.75;
        BOUNCE_K * q * q + 0.984375
    }
}

#[inline]
pub fn ease_in_bounce(p: f64) -> f64 {
    1.0 - ease_out_bounce(1.0 - p)
}

pub fn ease_in_out_bounce(p: f64) -> f64 {
    if p < 0.5 {
        ease_in_bounce(p * 2.0) * 0.5
    } else {
        ease_out_bounce(p * 2.0 - 1.0) * 0.5 + 0.5
    }
}

/// Built-in curves, addressable by name.
pub const BUILTIN_EASINGS: &[(&str, fn(f64) -> f64)] = &[
    ("linear", linear),
    ("ease_in_quad", ease_in_quad),
    ("ease_out_quad", ease_out_quad),
    ("ease_in_out_quad", ease_in_out_quad),
    ("ease_in_cubic", ease_in_cubic),
    ("ease_out_cubic", ease_out_cubic),
    ("ease_in_out_cubic", ease_in_out_cubic),
    ("ease_in_quart", ease_in_quart),
    ("ease_out_quart", ease_out_quart),
    ("ease_in_out_quart", ease_in_out_quart),
    ("ease_in_quint", ease_in_quint),
    ("ease_out_quint", ease_out_quint),
    ("ease_in_out_quint", ease_in_out_quint),
    ("ease_in_sine", ease_in_sine),
    ("ease_out_sine", ease_out_sine),
    ("ease_in_out_sine", ease_in_out_sine),
    ("ease_in_expo", ease_in_expo),
    ("ease_out_expo", ease_out_expo),
    ("ease_in_out_expo", ease_in_out_expo),
    ("ease_in_circ", ease_in_circ),
    ("ease_out_circ", ease_out_circ),
    ("ease_in_out_circ", ease_in_out_circ),
    ("ease_in_elastic", ease_in_elastic),
    ("ease_out_elastic", ease_out_elastic),
    ("ease_in_out_elastic", ease_in_out_elastic),
    ("ease_in_back", ease_in_back),
    ("ease_out_back", ease_out_back),
    ("ease_in_out_back", ease_in_out_back),
    ("ease_in_bounce", ease_in_bounce),
    ("ease_out_bounce", ease_out_bounce),
    ("ease_in_out_bounce", ease_in_out_bounce),
];

/// A resolved, named easing curve.
#[derive(Clone)]
pub struct Easing {
    name: Rc<str>,
    func: EasingFn,
}

impl Easing {
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn apply(&self, progress: f64) -> f64 {
        (self.func)(progress)
    }
}

impl fmt::Debug for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Easing").field(&self.name).finish()
    }
}

/// Name → curve lookup. Starts with every built-in curve; hosts may add their own.
pub struct EasingRegistry {
    table: HashMap<String, EasingFn>,
}

impl EasingRegistry {
    pub fn new() -> Self {
        let mut table: HashMap<String, EasingFn> = HashMap::with_capacity(BUILTIN_EASINGS.len());
        for (name, f) in BUILTIN_EASINGS {
            table.insert((*name).to_string(), Rc::new(*f));
        }
        Self { table }
    }

    /// Register (or replace) a named curve.
    pub fn register<F>(&mut self, name: impl Into<String>, curve: F)
    where
        F: Fn(f64) -> f64 + 'static,
    {
        self.table.insert(name.into(), Rc::new(curve));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Resolve a curve by name; unknown names fail immediately.
    pub fn resolve(&self, name: &str) -> Result<Easing, AnimationError> {
        self.table
            .get(name)
            .map(|func| Easing {
                name: Rc::from(name),
                func: func.clone(),
            })
            .ok_or_else(|| AnimationError::UnknownEasing {
                name: name.to_string(),
            })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.table.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for EasingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EasingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EasingRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    #[test]
    fn linear_is_identity() {
        for i in 0..=100 {
            let f = i as f64 / 100.0;
            assert_eq!(linear(f), f);
        }
    }

    #[test]
    fn every_builtin_hits_its_endpoints() {
        for (name, f) in BUILTIN_EASINGS {
            approx(f(1.0), 1.0, 1e-9);
            // elastic-in starts with a tiny oscillation
            let eps = if name.contains("elastic") { 1e-3 } else { 1e-9 };
            approx(f(0.0), 0.0, eps);
        }
    }

    #[test]
    fn in_out_curves_are_symmetric_at_midpoint() {
        for (name, f) in BUILTIN_EASINGS {
            if name.starts_with("ease_in_out") && !name.contains("elastic") {
                approx(f(0.5), 0.5, 1e-9);
            }
        }
    }

    #[test]
    fn back_overshoots() {
        assert!(ease_in_back(0.2) < 0.0);
        assert!(ease_out_back(0.8) > 1.0);
    }

    #[test]
    fn registry_resolves_and_rejects() {
        let mut reg = EasingRegistry::new();
        assert_eq!(reg.names().len(), BUILTIN_EASINGS.len());
        let e = reg.resolve("ease_out_quad").unwrap();
        approx(e.apply(0.5), 0.75, 1e-12);
        assert!(matches!(
            reg.resolve("wobble"),
            Err(AnimationError::UnknownEasing { .. })
        ));
        reg.register("wobble", |p| p * p * p);
        approx(reg.resolve("wobble").unwrap().apply(0.5), 0.125, 1e-12);
    }
}
