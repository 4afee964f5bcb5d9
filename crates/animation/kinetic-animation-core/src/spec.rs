//! Animation descriptions: leaf configuration and the composite tree.
//!
//! Specs are immutable once registered with an [`crate::Animator`]. Per-target
//! execution state never lives here; see `engine`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::ids::AnimId;
use kinetic_api_core::Value;

/// How a leaf interprets its property table.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Property values are literal end values.
    #[default]
    Absolute,
    /// Property values are offsets added to the live value at each (re)start.
    Delta,
}

/// Repeat limit for [`crate::Animator::repeat`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatCount {
    Times(u32),
    Forever,
}

impl RepeatCount {
    /// `None` when unbounded.
    pub fn limit(self) -> Option<u32> {
        match self {
            RepeatCount::Times(n) => Some(n),
            RepeatCount::Forever => None,
        }
    }
}

impl From<Option<u32>> for RepeatCount {
    fn from(times: Option<u32>) -> Self {
        times.map_or(RepeatCount::Forever, RepeatCount::Times)
    }
}

/// Configuration for a leaf animation.
///
/// `duration` and `easing` fall back to [`crate::Config`] when unset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationCfg {
    pub duration: Option<f64>,
    pub easing: Option<String>,
    pub kind: Kind,
    pub generate_event: bool,
    pub properties: IndexMap<String, Value>,
}

impl Default for AnimationCfg {
    fn default() -> Self {
        Self {
            duration: None,
            easing: None,
            kind: Kind::Absolute,
            generate_event: true,
            properties: IndexMap::new(),
        }
    }
}

impl AnimationCfg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn easing(mut self, name: impl Into<String>) -> Self {
        self.easing = Some(name.into());
        self
    }

    pub fn kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    /// Shorthand for `kind(Kind::Delta)`.
    pub fn delta(self) -> Self {
        self.kind(Kind::Delta)
    }

    pub fn generate_event(mut self, enabled: bool) -> Self {
        self.generate_event = enabled;
        self
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

/// Validated leaf description.
#[derive(Clone, Debug)]
pub(crate) struct LeafSpec {
    pub duration: f64,
    pub easing: Easing,
    pub kind: Kind,
    pub generate_event: bool,
    pub properties: IndexMap<String, Value>,
}

#[derive(Clone, Debug)]
pub(crate) struct CompositeSpec {
    pub children: Vec<AnimId>,
    pub single_event: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct RepeatSpec {
    pub inner: AnimId,
    pub count: RepeatCount,
}

#[derive(Clone, Debug)]
pub(crate) enum Spec {
    Leaf(LeafSpec),
    Sequence(CompositeSpec),
    Parallel(CompositeSpec),
    Repeat(RepeatSpec),
}

impl Spec {
    /// Direct children, in declaration order.
    pub(crate) fn children(&self) -> &[AnimId] {
        match self {
            Spec::Leaf(_) => &[],
            Spec::Sequence(c) | Spec::Parallel(c) => &c.children,
            Spec::Repeat(r) => std::slice::from_ref(&r.inner),
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Spec::Leaf(_) => "leaf",
            Spec::Sequence(_) => "sequence",
            Spec::Parallel(_) => "parallel",
            Spec::Repeat(_) => "repeat",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cfg_builder_and_serde_defaults() {
        let cfg = AnimationCfg::new().duration(2.0).delta().property("x", 10.0);
        assert_eq!(cfg.kind, Kind::Delta);
        assert!(cfg.generate_event);
        assert_eq!(cfg.properties.get("x"), Some(&Value::f(10.0)));

        let parsed: AnimationCfg = serde_json::from_str(r#"{ "kind": "delta" }"#).unwrap();
        assert_eq!(parsed.kind, Kind::Delta);
        assert!(parsed.generate_event);
        assert!(parsed.duration.is_none());
    }

    #[test]
    fn repeat_count_limit() {
        assert_eq!(RepeatCount::Times(3).limit(), Some(3));
        assert_eq!(RepeatCount::Forever.limit(), None);
        assert_eq!(RepeatCount::from(None), RepeatCount::Forever);
    }
}
