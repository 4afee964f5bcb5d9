//! Leaf instance: per-(leaf, target) interpolation state advanced by ticks.
//!
//! Bindings are non-aliased snapshots of the target's live values (projected
//! onto the property template), so nothing here shares storage with the target.
//!
//! State machine: `Idle -> Running -> Finished`, with `Running <-> Paused`.

use indexmap::IndexMap;

use crate::clock::TickHandle;
use crate::easing::Easing;
use crate::error::AnimationError;
use crate::spec::{Kind, LeafSpec};
use crate::target::Target;
use kinetic_api_core::{add_values, ensure_same_shape, lerp_value, project, Value};

/// Slack used when comparing the accumulated frame pointer to the duration.
const FINISH_EPSILON: f64 = 1e-9;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Start and end value of one animated property.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Binding {
    pub start: Value,
    pub end: Value,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Running,
    Finished,
}

/// Values produced by one tick, to be written back to the target.
#[derive(Debug)]
pub(crate) struct Frame {
    pub values: Vec<(String, Value)>,
    pub outcome: TickOutcome,
}

#[derive(Debug)]
pub(crate) struct LeafInstance {
    duration: f64,
    kind: Kind,
    bindings: IndexMap<String, Binding>,
    frame_pointer: f64,
    // time delivered while the target could not be written
    carried: f64,
    phase: Phase,
    tick: Option<TickHandle>,
}

/// Build bindings for every property of `spec` from the live state of `target`.
fn capture(spec: &LeafSpec, target: &dyn Target) -> Result<IndexMap<String, Binding>, AnimationError> {
    let mut bindings = IndexMap::with_capacity(spec.properties.len());
    for (name, template) in &spec.properties {
        let live = target
            .get(name)
            .ok_or_else(|| AnimationError::MissingProperty {
                property: name.clone(),
            })?;
        let shape_err = |source| AnimationError::ShapeMismatch {
            property: name.clone(),
            source,
        };
        let start = project(&live, template).map_err(shape_err)?;
        let end = match spec.kind {
            Kind::Absolute => {
                ensure_same_shape(&start, template).map_err(shape_err)?;
                template.clone()
            }
            Kind::Delta => add_values(&start, template).map_err(shape_err)?,
        };
        bindings.insert(name.clone(), Binding { start, end });
    }
    Ok(bindings)
}

impl LeafInstance {
    /// Snapshot `target` for `spec`. Shape problems surface here, at attach.
    pub(crate) fn new(spec: &LeafSpec, target: &dyn Target) -> Result<Self, AnimationError> {
        Ok(Self {
            duration: spec.duration,
            kind: spec.kind,
            bindings: capture(spec, target)?,
            frame_pointer: 0.0,
            carried: 0.0,
            phase: Phase::Idle,
            tick: None,
        })
    }

    /// Transition to running. Returns `true` when a tick registration is needed.
    ///
    /// Delta leaves recapture from the live target on every (re)start. A
    /// finished Absolute leaf keeps its frame pointer, so it replays its final
    /// frame and finishes on the next tick.
    pub(crate) fn start(&mut self, spec: &LeafSpec, target: &dyn Target) -> Result<bool, AnimationError> {
        match self.phase {
            Phase::Running | Phase::Paused => Ok(false),
            Phase::Idle | Phase::Finished => {
                if self.kind == Kind::Delta {
                    self.bindings = capture(spec, target)?;
                    self.frame_pointer = 0.0;
                } else if self.phase == Phase::Idle {
                    self.frame_pointer = 0.0;
                }
                self.carried = 0.0;
                self.phase = Phase::Running;
                Ok(true)
            }
        }
    }

    /// Advance by `dt` and compute the values for this frame.
    ///
    /// Returns `None` unless running.
    pub(crate) fn advance(&mut self, dt: f64, easing: &Easing) -> Result<Option<Frame>, AnimationError> {
        if self.phase != Phase::Running {
            return Ok(None);
        }
        self.frame_pointer += dt.max(0.0) + std::mem::take(&mut self.carried);
        let finished = self.frame_pointer + FINISH_EPSILON >= self.duration;
        if finished {
            self.frame_pointer = self.duration;
        }
        let eased = easing.apply(self.progress());

        let mut values = Vec::with_capacity(self.bindings.len());
        for (name, binding) in &self.bindings {
            let value = lerp_value(&binding.start, &binding.end, eased).map_err(|source| {
                AnimationError::ShapeMismatch {
                    property: name.clone(),
                    source,
                }
            })?;
            values.push((name.clone(), value));
        }

        let outcome = if finished {
            self.phase = Phase::Finished;
            TickOutcome::Finished
        } else {
            TickOutcome::Running
        };
        Ok(Some(Frame { values, outcome }))
    }

    /// Keep `dt` for the next frame when this one had to be skipped.
    pub(crate) fn defer(&mut self, dt: f64) {
        if self.phase == Phase::Running {
            self.carried += dt.max(0.0);
        }
    }

    /// Rewind to idle. Idempotent; hands back the tick registration (if any)
    /// so the caller can unschedule it exactly once.
    pub(crate) fn stop(&mut self) -> Option<TickHandle> {
        self.phase = Phase::Idle;
        self.frame_pointer = 0.0;
        self.carried = 0.0;
        self.tick.take()
    }

    /// Delta: recapture start values from the live target and rewind.
    /// Absolute: no-op.
    pub(crate) fn reset(&mut self, spec: &LeafSpec, target: &dyn Target) -> Result<(), AnimationError> {
        if self.kind == Kind::Absolute {
            return Ok(());
        }
        self.rebase(spec, target)
    }

    /// Fresh capture from the live target for either kind, back to frame 0.
    pub(crate) fn rebase(&mut self, spec: &LeafSpec, target: &dyn Target) -> Result<(), AnimationError> {
        self.bindings = capture(spec, target)?;
        self.frame_pointer = 0.0;
        self.carried = 0.0;
        if self.phase != Phase::Running && self.phase != Phase::Paused {
            self.phase = Phase::Idle;
        }
        Ok(())
    }

    /// Freeze in place. Returns the tick registration to drop.
    pub(crate) fn pause(&mut self) -> Option<TickHandle> {
        if self.phase != Phase::Running {
            return None;
        }
        self.phase = Phase::Paused;
        self.tick.take()
    }

    /// Returns `true` when a tick registration is needed again.
    pub(crate) fn resume(&mut self) -> bool {
        if self.phase != Phase::Paused {
            return false;
        }
        self.phase = Phase::Running;
        true
    }

    pub(crate) fn set_tick(&mut self, handle: TickHandle) {
        self.tick = Some(handle);
    }

    /// Registration to drop once the leaf finished on its own.
    pub(crate) fn take_tick(&mut self) -> Option<TickHandle> {
        self.tick.take()
    }

    #[inline]
    pub(crate) fn progress(&self) -> f64 {
        (self.frame_pointer / self.duration).clamp(0.0, 1.0)
    }

    #[inline]
    pub(crate) fn frame_pointer(&self) -> f64 {
        self.frame_pointer
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub(crate) fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::EasingRegistry;
    use kinetic_api_core::ShapeError;

    struct Props(IndexMap<String, Value>);

    impl Target for Props {
        fn get(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }
        fn set(&mut self, name: &str, value: Value) {
            self.0.insert(name.to_string(), value);
        }
    }

    fn props(entries: &[(&str, Value)]) -> Props {
        Props(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    fn leaf(kind: Kind, entries: &[(&str, Value)]) -> LeafSpec {
        LeafSpec {
            duration: 1.0,
            easing: EasingRegistry::new().resolve("linear").unwrap(),
            kind,
            generate_event: true,
            properties: entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }

    fn linear() -> Easing {
        EasingRegistry::new().resolve("linear").unwrap()
    }

    #[test]
    fn absolute_clamps_and_finishes_on_exact_end() {
        let target = props(&[("x", Value::f(0.0))]);
        let spec = leaf(Kind::Absolute, &[("x", Value::f(100.0))]);
        let mut inst = LeafInstance::new(&spec, &target).unwrap();
        assert!(inst.start(&spec, &target).unwrap());

        let frame = inst.advance(0.5, &linear()).unwrap().unwrap();
        assert_eq!(frame.outcome, TickOutcome::Running);
        assert_eq!(frame.values[0].1, Value::f(50.0));

        let frame = inst.advance(0.75, &linear()).unwrap().unwrap();
        assert_eq!(frame.outcome, TickOutcome::Finished);
        assert_eq!(frame.values[0].1, Value::f(100.0));
        assert_eq!(inst.frame_pointer(), 1.0);
        assert_eq!(inst.phase(), Phase::Finished);
        assert!(inst.advance(0.1, &linear()).unwrap().is_none());
    }

    #[test]
    fn delta_end_is_start_plus_delta() {
        let target = props(&[("pos", Value::seq([1.0, 2.0]))]);
        let spec = leaf(Kind::Delta, &[("pos", Value::seq([10.0, 10.0]))]);
        let inst = LeafInstance::new(&spec, &target).unwrap();
        let b = inst.binding("pos").unwrap();
        assert_eq!(b.start, Value::seq([1.0, 2.0]));
        assert_eq!(b.end, Value::seq([11.0, 12.0]));
    }

    #[test]
    fn capture_rejects_mismatched_shapes() {
        let target = props(&[("pos", Value::seq([1.0, 2.0]))]);
        let spec = leaf(Kind::Absolute, &[("pos", Value::seq([1.0, 2.0, 3.0]))]);
        let err = LeafInstance::new(&spec, &target).unwrap_err();
        assert!(matches!(
            err,
            AnimationError::ShapeMismatch {
                source: ShapeError::LengthMismatch { .. },
                ..
            }
        ));

        let spec = leaf(Kind::Absolute, &[("missing", Value::f(1.0))]);
        assert_eq!(
            LeafInstance::new(&spec, &target).unwrap_err(),
            AnimationError::MissingProperty {
                property: "missing".into()
            }
        );
    }

    #[test]
    fn stop_is_idempotent_and_yields_handle_once() {
        let target = props(&[("x", Value::f(0.0))]);
        let spec = leaf(Kind::Absolute, &[("x", Value::f(1.0))]);
        let mut inst = LeafInstance::new(&spec, &target).unwrap();
        inst.start(&spec, &target).unwrap();
        inst.set_tick(TickHandle(7));
        assert_eq!(inst.stop(), Some(TickHandle(7)));
        assert_eq!(inst.stop(), None);
        assert_eq!(inst.phase(), Phase::Idle);
    }

    #[test]
    fn absolute_reset_is_noop_delta_reset_recaptures() {
        let mut target = props(&[("x", Value::f(0.0))]);
        let abs = leaf(Kind::Absolute, &[("x", Value::f(5.0))]);
        let del = leaf(Kind::Delta, &[("x", Value::f(5.0))]);
        let mut a = LeafInstance::new(&abs, &target).unwrap();
        let mut d = LeafInstance::new(&del, &target).unwrap();

        target.set("x", Value::f(5.0));
        a.reset(&abs, &target).unwrap();
        d.reset(&del, &target).unwrap();
        assert_eq!(a.binding("x").unwrap().start, Value::f(0.0));
        assert_eq!(d.binding("x").unwrap().start, Value::f(5.0));
        assert_eq!(d.binding("x").unwrap().end, Value::f(10.0));
    }

    #[test]
    fn pause_freezes_frame_pointer() {
        let target = props(&[("x", Value::f(0.0))]);
        let spec = leaf(Kind::Absolute, &[("x", Value::f(10.0))]);
        let mut inst = LeafInstance::new(&spec, &target).unwrap();
        inst.start(&spec, &target).unwrap();
        inst.set_tick(TickHandle(1));
        inst.advance(0.25, &linear()).unwrap();
        assert_eq!(inst.pause(), Some(TickHandle(1)));
        assert!(inst.advance(0.25, &linear()).unwrap().is_none());
        assert_eq!(inst.progress(), 0.25);
        assert!(inst.resume());
        assert!(!inst.resume());
        let frame = inst.advance(0.25, &linear()).unwrap().unwrap();
        assert_eq!(frame.values[0].1, Value::f(5.0));
    }

    #[test]
    fn deferred_time_joins_the_next_frame() {
        let target = props(&[("x", Value::f(0.0))]);
        let spec = leaf(Kind::Absolute, &[("x", Value::f(10.0))]);
        let mut inst = LeafInstance::new(&spec, &target).unwrap();
        inst.defer(0.5);
        inst.start(&spec, &target).unwrap();
        inst.defer(0.25);
        let frame = inst.advance(0.25, &linear()).unwrap().unwrap();
        assert_eq!(frame.values[0].1, Value::f(5.0));

        inst.defer(0.25);
        inst.stop();
        inst.start(&spec, &target).unwrap();
        inst.advance(0.25, &linear()).unwrap();
        assert_eq!(inst.frame_pointer(), 0.25);
    }

    #[test]
    fn integral_values_round_to_nearest() {
        let target = props(&[("n", Value::i(0))]);
        let spec = leaf(Kind::Absolute, &[("n", Value::i(5))]);
        let mut inst = LeafInstance::new(&spec, &target).unwrap();
        inst.start(&spec, &target).unwrap();
        let frame = inst.advance(0.5, &linear()).unwrap().unwrap();
        assert_eq!(frame.values[0].1, Value::i(3));
    }
}
