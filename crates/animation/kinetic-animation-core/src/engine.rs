//! Engine: spec library, per-(spec, target) run tables and tick glue.
//!
//! Methods:
//! - animation, delay, sequence, parallel, repeat (build specs)
//! - attach, start, animate, stop, detach, reset, pause, resume (run control)
//! - subscribe / unsubscribe (events)
//!
//! All execution state lives in one table keyed by `(AnimId, TargetKey)`, so a
//! spec driving several targets keeps fully independent counters per target.
//! Notifications are queued while state is updated and flushed once the
//! state borrow is released, which lets listeners call back into the engine.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::{HashMap, HashSet};
use log::{debug, trace, warn};

use crate::clock::{Clock, TickHandle};
use crate::config::Config;
use crate::easing::EasingRegistry;
use crate::error::AnimationError;
use crate::events::{AnimationEvent, Dispatch, ListenerTable};
use crate::ids::{AnimId, IdAllocator, ListenerId};
use crate::instance::{LeafInstance, TickOutcome};
use crate::spec::{AnimationCfg, CompositeSpec, LeafSpec, RepeatCount, RepeatSpec, Spec};
use crate::target::{AsTarget, TargetKey, TargetRef, WeakTarget};
use crate::Result;
use kinetic_api_core::overlay;

type RunKey = (AnimId, TargetKey);

/// Execution state of one node of a spec tree for one target.
#[derive(Debug)]
enum RunState {
    Leaf(LeafInstance),
    Sequence { index: usize },
    Parallel { done: usize },
    Repeat { count: u32 },
}

struct Run {
    /// Composite driving this run; `None` for the root of a tree.
    parent: Option<AnimId>,
    target: WeakTarget,
    active: bool,
    paused: bool,
    state: RunState,
}

#[derive(Copy, Clone)]
enum Combine {
    Sequence,
    Parallel,
}

#[derive(Copy, Clone)]
enum Rewind {
    /// Delta leaves recapture, Absolute leaves keep their snapshot.
    Reset,
    /// Every leaf recaptures from the live target.
    Rebase,
}

enum TickStep {
    Continue,
    Busy,
    Finished(Option<TickHandle>),
    Dropped,
    Failed(AnimationError),
}

enum ChildStep {
    Wait,
    Finish,
    Advance(AnimId),
    Restart(AnimId),
}

struct Core {
    config: Config,
    ids: IdAllocator,
    easings: EasingRegistry,
    specs: HashMap<AnimId, Spec>,
    runs: HashMap<RunKey, Run>,
    listeners: ListenerTable,
    queue: VecDeque<Dispatch>,
    clock: Rc<dyn Clock>,
    this: Weak<RefCell<Core>>,
}

fn schedule_tick(
    clock: &dyn Clock,
    this: &Weak<RefCell<Core>>,
    key: RunKey,
    interval: f64,
) -> TickHandle {
    let weak = this.clone();
    clock.schedule(
        Box::new(move |dt| {
            if let Some(core) = weak.upgrade() {
                Animator { core }.on_tick(key, dt);
            }
        }),
        interval,
    )
}

/// Advance one leaf and write its frame to the target.
fn advance_leaf(leaf: &LeafSpec, run: &mut Run, key: RunKey, dt: f64) -> TickStep {
    let RunState::Leaf(inst) = &mut run.state else {
        return TickStep::Continue;
    };
    let Some(target) = run.target.upgrade() else {
        return TickStep::Dropped;
    };
    let Ok(mut guard) = target.try_borrow_mut() else {
        inst.defer(dt);
        return TickStep::Busy;
    };
    let frame = match inst.advance(dt, &leaf.easing) {
        Ok(Some(frame)) => frame,
        Ok(None) => return TickStep::Continue,
        Err(err) => return TickStep::Failed(err),
    };
    for (name, partial) in frame.values {
        let next = match guard.get(&name) {
            Some(live) => overlay(&live, &partial),
            None => partial,
        };
        guard.set(&name, next);
    }
    trace!(
        "tick: {} on {} progress={:.4}",
        key.0,
        key.1,
        inst.progress()
    );
    match frame.outcome {
        TickOutcome::Running => TickStep::Continue,
        TickOutcome::Finished => TickStep::Finished(inst.take_tick()),
    }
}

impl Core {
    fn spec(&self, anim: AnimId) -> Result<&Spec> {
        self.specs
            .get(&anim)
            .ok_or(AnimationError::UnknownAnimation { anim })
    }

    /// Every id of the tree rooted at `root`, root first.
    fn tree(&self, root: AnimId) -> Vec<AnimId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(spec) = self.specs.get(&id) {
                stack.extend(spec.children().iter().rev());
            }
        }
        out
    }

    fn emit(&mut self, event: AnimationEvent) {
        self.queue.push_back(Dispatch::Event(event));
    }

    // ---------- spec construction ----------

    fn animation(&mut self, cfg: AnimationCfg) -> Result<AnimId> {
        let duration = cfg.duration.unwrap_or(self.config.default_duration);
        if !(duration.is_finite() && duration > 0.0) {
            return Err(AnimationError::InvalidDuration { duration });
        }
        let easing_name = cfg
            .easing
            .as_deref()
            .unwrap_or(self.config.default_easing.as_str());
        let easing = self.easings.resolve(easing_name)?;
        let id = self.ids.alloc_anim();
        debug!(
            "animation: {} ({:?}, {}s, {}, {} properties)",
            id,
            cfg.kind,
            duration,
            easing.name(),
            cfg.properties.len()
        );
        self.specs.insert(
            id,
            Spec::Leaf(LeafSpec {
                duration,
                easing,
                kind: cfg.kind,
                generate_event: cfg.generate_event,
                properties: cfg.properties,
            }),
        );
        Ok(id)
    }

    fn ensure_unique(&self, roots: &[AnimId]) -> Result<()> {
        let mut seen = HashSet::new();
        for &root in roots {
            for id in self.tree(root) {
                if !seen.insert(id) {
                    return Err(AnimationError::DuplicateChild { anim: id });
                }
            }
        }
        Ok(())
    }

    fn compose(&mut self, how: Combine, operands: &[AnimId], single_event: bool) -> Result<AnimId> {
        let label = match how {
            Combine::Sequence => "sequence",
            Combine::Parallel => "parallel",
        };
        if operands.len() < 2 {
            return Err(AnimationError::InvalidComposition {
                reason: format!("{label} needs at least two operands, got {}", operands.len()),
            });
        }
        let mut children = Vec::with_capacity(operands.len());
        for &op in operands {
            match (how, self.spec(op)?) {
                (Combine::Sequence, Spec::Sequence(inner))
                | (Combine::Parallel, Spec::Parallel(inner)) => {
                    children.extend_from_slice(&inner.children)
                }
                _ => children.push(op),
            }
        }
        self.ensure_unique(&children)?;

        let id = self.ids.alloc_anim();
        debug!("{label}: {} over {:?}", id, children);
        let composite = CompositeSpec {
            children,
            single_event,
        };
        self.specs.insert(
            id,
            match how {
                Combine::Sequence => Spec::Sequence(composite),
                Combine::Parallel => Spec::Parallel(composite),
            },
        );
        Ok(id)
    }

    fn repeat(&mut self, inner: AnimId, count: RepeatCount) -> Result<AnimId> {
        self.spec(inner)?;
        if count == RepeatCount::Times(0) {
            return Err(AnimationError::InvalidRepeatCount { times: 0 });
        }
        let id = self.ids.alloc_anim();
        debug!("repeat: {} wraps {} ({:?})", id, inner, count);
        self.specs
            .insert(id, Spec::Repeat(RepeatSpec { inner, count }));
        Ok(id)
    }

    fn duration_of(&self, anim: AnimId) -> Option<f64> {
        match self.specs.get(&anim)? {
            Spec::Leaf(leaf) => Some(leaf.duration),
            Spec::Sequence(c) => c.children.iter().map(|id| self.duration_of(*id)).sum(),
            Spec::Parallel(c) => c
                .children
                .iter()
                .map(|id| self.duration_of(*id))
                .try_fold(0.0_f64, |acc, d| d.map(|d| acc.max(d))),
            Spec::Repeat(r) => match r.count {
                RepeatCount::Times(n) => self.duration_of(r.inner).map(|d| d * f64::from(n)),
                RepeatCount::Forever => None,
            },
        }
    }

    // ---------- attach / detach ----------

    fn attach(&mut self, anim: AnimId, target: &TargetRef) -> Result<bool> {
        self.spec(anim)?;
        let tk = TargetKey::of(target);
        self.purge_dropped();

        if self.runs.get(&(anim, tk)).is_some_and(|run| run.parent.is_none()) {
            debug!("attach: {} already has state on {}", anim, tk);
            return Ok(false);
        }
        let tree = self.tree(anim);
        let mut owners: Vec<AnimId> = Vec::new();
        for id in &tree {
            if self.runs.contains_key(&(*id, tk)) {
                let root = self.root_of(*id, tk);
                if !owners.contains(&root) {
                    owners.push(root);
                }
            }
        }
        if let Some(busy) = owners
            .iter()
            .find(|root| self.runs.get(&(**root, tk)).is_some_and(|run| run.active))
        {
            debug!("attach: {} overlaps running {} on {}", anim, busy, tk);
            return Ok(false);
        }

        let guard = target
            .try_borrow()
            .map_err(|_| AnimationError::TargetUnavailable)?;
        // idle or finished trees sharing nodes with `anim` give way to it
        let mut displaced = Vec::new();
        for owner in owners {
            debug!("attach: {} replaces idle {} on {}", anim, owner, tk);
            self.stop_node(owner, tk);
            for id in self.tree(owner) {
                if let Some(run) = self.runs.remove(&(id, tk)) {
                    displaced.push(((id, tk), run));
                }
            }
        }
        let weak = Rc::downgrade(target);
        let mut created = Vec::with_capacity(tree.len());
        let result = self.create_runs(anim, None, &*guard, &weak, tk, &mut created);
        drop(guard);

        if let Err(err) = result {
            for key in created {
                self.runs.remove(&key);
            }
            self.runs.extend(displaced);
            debug!("attach: {} on {} rolled back ({})", anim, tk, err.category());
            return Err(err);
        }
        debug!("attach: {} on {} ({} runs)", anim, tk, created.len());
        Ok(true)
    }

    fn create_runs(
        &mut self,
        anim: AnimId,
        parent: Option<AnimId>,
        target: &dyn crate::Target,
        weak: &WeakTarget,
        tk: TargetKey,
        created: &mut Vec<RunKey>,
    ) -> Result<()> {
        let state = match self.spec(anim)? {
            Spec::Leaf(leaf) => RunState::Leaf(LeafInstance::new(leaf, target)?),
            Spec::Sequence(_) => RunState::Sequence { index: 0 },
            Spec::Parallel(_) => RunState::Parallel { done: 0 },
            Spec::Repeat(_) => RunState::Repeat { count: 0 },
        };
        self.runs.insert(
            (anim, tk),
            Run {
                parent,
                target: weak.clone(),
                active: false,
                paused: false,
                state,
            },
        );
        created.push((anim, tk));

        let children = self.spec(anim)?.children().to_vec();
        for child in children {
            self.create_runs(child, Some(anim), target, weak, tk, created)?;
        }
        Ok(())
    }

    /// Drop every tree whose target no longer exists.
    fn purge_dropped(&mut self) {
        let stale: Vec<RunKey> = self
            .runs
            .iter()
            .filter(|(_, run)| run.parent.is_none() && run.target.strong_count() == 0)
            .map(|(key, _)| *key)
            .collect();
        for (root, tk) in stale {
            warn!("attach: discarding stale state of {} on dropped {}", root, tk);
            self.remove_tree(root, tk);
        }
    }

    fn remove_tree(&mut self, anim: AnimId, tk: TargetKey) {
        self.stop_node(anim, tk);
        for id in self.tree(anim) {
            self.runs.remove(&(id, tk));
        }
        debug!("detach: {} from {}", anim, tk);
    }

    fn root_of(&self, anim: AnimId, tk: TargetKey) -> AnimId {
        let mut cur = anim;
        while let Some(parent) = self.runs.get(&(cur, tk)).and_then(|run| run.parent) {
            cur = parent;
        }
        cur
    }

    /// End the whole tree containing `anim` after an unrecoverable failure.
    fn abort_tree(&mut self, anim: AnimId, tk: TargetKey, reason: &str) {
        let root = self.root_of(anim, tk);
        warn!("abort: {} on {} ended ({})", root, tk, reason);
        self.remove_tree(root, tk);
    }

    fn top_level(&self, anim: AnimId, tk: TargetKey) -> Result<&Run> {
        self.spec(anim)?;
        let run = self
            .runs
            .get(&(anim, tk))
            .ok_or(AnimationError::NotAttached { anim, target: tk })?;
        match run.parent {
            Some(parent) => Err(AnimationError::NotTopLevel {
                anim,
                target: tk,
                parent,
            }),
            None => Ok(run),
        }
    }

    // ---------- running ----------

    fn start_node(&mut self, anim: AnimId, tk: TargetKey) -> Result<()> {
        let key = (anim, tk);
        let spec = self
            .specs
            .get(&anim)
            .ok_or(AnimationError::UnknownAnimation { anim })?;
        let label = spec.label();
        let run = self
            .runs
            .get_mut(&key)
            .ok_or(AnimationError::NotAttached { anim, target: tk })?;
        if run.active {
            return Ok(());
        }

        let children: Vec<AnimId> = match (spec, &mut run.state) {
            (Spec::Leaf(leaf), RunState::Leaf(inst)) => {
                let target = run
                    .target
                    .upgrade()
                    .ok_or(AnimationError::TargetUnavailable)?;
                let guard = target
                    .try_borrow()
                    .map_err(|_| AnimationError::TargetUnavailable)?;
                if inst.start(leaf, &*guard)? {
                    let handle =
                        schedule_tick(self.clock.as_ref(), &self.this, key, self.config.tick_interval);
                    inst.set_tick(handle);
                }
                Vec::new()
            }
            (Spec::Sequence(c), RunState::Sequence { index }) => {
                c.children.get(*index).copied().into_iter().collect()
            }
            (Spec::Parallel(c), RunState::Parallel { .. }) => c.children.clone(),
            (Spec::Repeat(r), RunState::Repeat { .. }) => vec![r.inner],
            _ => return Err(AnimationError::NotAttached { anim, target: tk }),
        };
        run.active = true;
        run.paused = false;

        debug!("start: {} {} on {}", label, anim, tk);
        self.emit(AnimationEvent::Started { anim, target: tk });
        for child in children {
            self.start_node(child, tk)?;
        }
        Ok(())
    }

    fn tick_leaf(&mut self, key: RunKey, dt: f64) {
        let (anim, tk) = key;
        let step = match (self.specs.get(&anim), self.runs.get_mut(&key)) {
            (Some(Spec::Leaf(leaf)), Some(run)) => advance_leaf(leaf, run, key, dt),
            _ => {
                trace!("tick: stale callback for {} on {}", anim, tk);
                return;
            }
        };
        match step {
            TickStep::Continue => {}
            TickStep::Busy => warn!("tick: {} busy, deferring frame of {}", tk, anim),
            TickStep::Finished(handle) => {
                if let Some(handle) = handle {
                    self.clock.unschedule(handle);
                }
                self.finish_node(anim, tk);
            }
            TickStep::Dropped => self.abort_tree(anim, tk, "target dropped"),
            TickStep::Failed(err) => self.abort_tree(anim, tk, &err.to_string()),
        }
    }

    /// True when `from` or any composite above it collapses notifications
    /// into a single aggregated one.
    fn muted(&self, from: Option<AnimId>, tk: TargetKey) -> bool {
        let mut cur = from;
        while let Some(id) = cur {
            if let Some(Spec::Sequence(c) | Spec::Parallel(c)) = self.specs.get(&id) {
                if c.single_event {
                    return true;
                }
            }
            cur = self.runs.get(&(id, tk)).and_then(|run| run.parent);
        }
        false
    }

    /// A node's run ended: emit its events, then report to the parent or,
    /// at the root, settle the tree's state.
    fn finish_node(&mut self, anim: AnimId, tk: TargetKey) {
        let Some(run) = self.runs.get_mut(&(anim, tk)) else {
            return;
        };
        run.active = false;
        run.paused = false;
        let parent = run.parent;
        let target = run.target.clone();
        let muted = self.muted(parent, tk);
        let completed = AnimationEvent::Completed { anim, target: tk };

        let mut discard = false;
        match self.specs.get(&anim) {
            Some(Spec::Leaf(leaf)) => {
                if leaf.generate_event {
                    if parent.is_none() {
                        self.queue.push_back(Dispatch::Notify { target, anim });
                    }
                    self.queue.push_back(Dispatch::Event(completed));
                } else {
                    discard = parent.is_none();
                }
            }
            Some(Spec::Sequence(c) | Spec::Parallel(c)) => {
                self.queue.push_back(Dispatch::Event(completed));
                if c.single_event && !muted {
                    self.queue.push_back(Dispatch::Notify { target, anim });
                }
            }
            Some(Spec::Repeat(_)) => {
                if !muted {
                    self.queue.push_back(Dispatch::Notify { target, anim });
                }
                self.queue.push_back(Dispatch::Event(completed));
                discard = parent.is_none();
            }
            None => return,
        }
        debug!("complete: {} on {}", anim, tk);

        match parent {
            Some(parent) => self.child_finished(parent, anim, tk),
            None if discard => self.remove_tree(anim, tk),
            None => {}
        }
    }

    fn child_finished(&mut self, parent: AnimId, child: AnimId, tk: TargetKey) {
        let forward = matches!(self.specs.get(&child), Some(Spec::Leaf(leaf)) if leaf.generate_event)
            && !self.muted(Some(parent), tk);
        let (Some(spec), Some(run)) = (self.specs.get(&parent), self.runs.get_mut(&(parent, tk))) else {
            return;
        };
        let per_child = Dispatch::Notify {
            target: run.target.clone(),
            anim: child,
        };

        let step = match (spec, &mut run.state) {
            (Spec::Sequence(c), RunState::Sequence { index }) => {
                if forward {
                    self.queue.push_back(per_child);
                }
                *index += 1;
                match c.children.get(*index) {
                    Some(next) => ChildStep::Advance(*next),
                    None => {
                        *index = 0;
                        ChildStep::Finish
                    }
                }
            }
            (Spec::Parallel(c), RunState::Parallel { done }) => {
                *done += 1;
                if *done < c.children.len() {
                    if forward {
                        self.queue.push_back(per_child);
                    }
                    ChildStep::Wait
                } else {
                    *done = 0;
                    ChildStep::Finish
                }
            }
            (Spec::Repeat(r), RunState::Repeat { count }) => {
                if forward {
                    self.queue.push_back(per_child);
                }
                *count += 1;
                self.queue
                    .push_back(Dispatch::Event(AnimationEvent::Repeated {
                        anim: parent,
                        target: tk,
                        count: *count,
                    }));
                match r.count.limit() {
                    Some(limit) if *count >= limit => {
                        *count = 0;
                        ChildStep::Finish
                    }
                    _ => ChildStep::Restart(r.inner),
                }
            }
            _ => ChildStep::Wait,
        };

        match step {
            ChildStep::Wait => {}
            ChildStep::Finish => self.finish_node(parent, tk),
            ChildStep::Advance(next) => {
                // the next child must see what earlier children did to the target
                let started = self
                    .rewind_node(next, tk, Rewind::Rebase)
                    .and_then(|()| self.start_node(next, tk));
                if let Err(err) = started {
                    self.abort_tree(parent, tk, &err.to_string());
                }
            }
            ChildStep::Restart(inner) => {
                trace!("repeat: {} restarting {} on {}", parent, inner, tk);
                let started = self
                    .rewind_node(inner, tk, Rewind::Reset)
                    .and_then(|()| self.start_node(inner, tk));
                if let Err(err) = started {
                    self.abort_tree(parent, tk, &err.to_string());
                }
            }
        }
    }

    // ---------- control ----------

    /// Halt and rewind a subtree. Idempotent, emits nothing.
    fn stop_node(&mut self, anim: AnimId, tk: TargetKey) {
        let Some(run) = self.runs.get_mut(&(anim, tk)) else {
            return;
        };
        run.active = false;
        run.paused = false;
        match &mut run.state {
            RunState::Leaf(inst) => {
                if let Some(handle) = inst.stop() {
                    self.clock.unschedule(handle);
                }
            }
            RunState::Sequence { index } => *index = 0,
            RunState::Parallel { done } => *done = 0,
            RunState::Repeat { count } => *count = 0,
        }
        let children = self
            .specs
            .get(&anim)
            .map(|spec| spec.children().to_vec())
            .unwrap_or_default();
        for child in children {
            self.stop_node(child, tk);
        }
    }

    fn rewind_node(&mut self, anim: AnimId, tk: TargetKey, mode: Rewind) -> Result<()> {
        let spec = self
            .specs
            .get(&anim)
            .ok_or(AnimationError::UnknownAnimation { anim })?;
        let run = self
            .runs
            .get_mut(&(anim, tk))
            .ok_or(AnimationError::NotAttached { anim, target: tk })?;
        match (spec, &mut run.state) {
            (Spec::Leaf(leaf), RunState::Leaf(inst)) => {
                let target = run
                    .target
                    .upgrade()
                    .ok_or(AnimationError::TargetUnavailable)?;
                let guard = target
                    .try_borrow()
                    .map_err(|_| AnimationError::TargetUnavailable)?;
                match mode {
                    Rewind::Reset => inst.reset(leaf, &*guard)?,
                    Rewind::Rebase => inst.rebase(leaf, &*guard)?,
                }
                return Ok(());
            }
            (_, RunState::Sequence { index }) => *index = 0,
            (_, RunState::Parallel { done }) => *done = 0,
            (_, RunState::Repeat { count }) => *count = 0,
            _ => return Ok(()),
        }
        let children = spec.children().to_vec();
        for child in children {
            self.rewind_node(child, tk, mode)?;
        }
        Ok(())
    }

    fn pause_node(&mut self, anim: AnimId, tk: TargetKey) {
        let Some(run) = self.runs.get_mut(&(anim, tk)) else {
            return;
        };
        if !run.active {
            return;
        }
        run.paused = true;
        if let RunState::Leaf(inst) = &mut run.state {
            if let Some(handle) = inst.pause() {
                self.clock.unschedule(handle);
            }
        }
        let children = self
            .specs
            .get(&anim)
            .map(|spec| spec.children().to_vec())
            .unwrap_or_default();
        for child in children {
            self.pause_node(child, tk);
        }
    }

    fn resume_node(&mut self, anim: AnimId, tk: TargetKey) {
        let key = (anim, tk);
        let Some(run) = self.runs.get_mut(&key) else {
            return;
        };
        if !run.paused {
            return;
        }
        run.paused = false;
        if let RunState::Leaf(inst) = &mut run.state {
            if inst.resume() {
                let handle =
                    schedule_tick(self.clock.as_ref(), &self.this, key, self.config.tick_interval);
                inst.set_tick(handle);
            }
        }
        let children = self
            .specs
            .get(&anim)
            .map(|spec| spec.children().to_vec())
            .unwrap_or_default();
        for child in children {
            self.resume_node(child, tk);
        }
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        for run in self.runs.values_mut() {
            if let RunState::Leaf(inst) = &mut run.state {
                if let Some(handle) = inst.take_tick() {
                    self.clock.unschedule(handle);
                }
            }
        }
    }
}

/// Owner of animation specs and of every per-target run.
///
/// Cheap to clone; clones share state. Not `Send`: everything runs on the
/// thread that drives the [`Clock`].
///
/// `Target::get`/`set` are called while the animator's state is borrowed, so
/// target implementations must not call back into the animator. Listeners
/// and `Target::on_animation_complete` may.
#[derive(Clone)]
pub struct Animator {
    core: Rc<RefCell<Core>>,
}

impl Animator {
    pub fn new(config: Config, clock: Rc<dyn Clock>) -> Self {
        let core = Rc::new_cyclic(|this| {
            RefCell::new(Core {
                config,
                ids: IdAllocator::new(),
                easings: EasingRegistry::new(),
                specs: HashMap::new(),
                runs: HashMap::new(),
                listeners: ListenerTable::default(),
                queue: VecDeque::new(),
                clock,
                this: this.clone(),
            })
        });
        Self { core }
    }

    /// Animator with [`Config::default`].
    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        Self::new(Config::default(), clock)
    }

    pub fn config(&self) -> Config {
        self.core.borrow().config.clone()
    }

    /// Make a custom easing curve available to later specs.
    pub fn register_easing<F>(&self, name: impl Into<String>, curve: F)
    where
        F: Fn(f64) -> f64 + 'static,
    {
        self.core.borrow_mut().easings.register(name, curve);
    }

    pub fn has_easing(&self, name: &str) -> bool {
        self.core.borrow().easings.contains(name)
    }

    // ---------- specs ----------

    /// Register a leaf animation. Duration and easing are validated here,
    /// before anything can be attached.
    pub fn animation(&self, cfg: AnimationCfg) -> Result<AnimId> {
        self.core.borrow_mut().animation(cfg)
    }

    /// A leaf that animates nothing for `seconds`; useful inside sequences.
    pub fn delay(&self, seconds: f64) -> Result<AnimId> {
        self.animation(AnimationCfg::new().duration(seconds))
    }

    /// Run `operands` one after another. Nested sequences are flattened.
    pub fn sequence(&self, operands: &[AnimId]) -> Result<AnimId> {
        self.sequence_with(operands, false)
    }

    /// As [`Animator::sequence`]; with `single_event` the target gets one
    /// aggregated notification instead of one per child.
    pub fn sequence_with(&self, operands: &[AnimId], single_event: bool) -> Result<AnimId> {
        self.core
            .borrow_mut()
            .compose(Combine::Sequence, operands, single_event)
    }

    /// Run `operands` together. Nested parallels are flattened.
    pub fn parallel(&self, operands: &[AnimId]) -> Result<AnimId> {
        self.parallel_with(operands, false)
    }

    pub fn parallel_with(&self, operands: &[AnimId], single_event: bool) -> Result<AnimId> {
        self.core
            .borrow_mut()
            .compose(Combine::Parallel, operands, single_event)
    }

    /// Restart `inner` until `count` runs completed (or forever).
    pub fn repeat(&self, inner: AnimId, count: RepeatCount) -> Result<AnimId> {
        self.core.borrow_mut().repeat(inner, count)
    }

    /// Nominal duration: sum over sequences, max over parallels, `None` for
    /// unknown ids and unbounded repeats.
    pub fn duration(&self, anim: AnimId) -> Option<f64> {
        self.core.borrow().duration_of(anim)
    }

    // ---------- runs ----------

    /// Create per-target state for `anim` and its whole tree.
    ///
    /// Returns `Ok(false)` (and changes nothing) when state already exists.
    /// On error nothing created by the attempt is kept.
    pub fn attach<T: AsTarget + ?Sized>(&self, anim: AnimId, target: &T) -> Result<bool> {
        let target = target.as_target();
        self.core.borrow_mut().attach(anim, &target)
    }

    /// Begin (or continue) the run of an attached top-level animation.
    pub fn start<T: AsTarget + ?Sized>(&self, anim: AnimId, target: &T) -> Result<()> {
        let result = self.start_top_level(anim, target.target_key());
        self.flush();
        result
    }

    fn start_top_level(&self, anim: AnimId, tk: TargetKey) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.top_level(anim, tk)?;
        core.start_node(anim, tk)
    }

    /// Attach and start on every target independently.
    ///
    /// Every target is attempted; returns how many started, or the first
    /// error encountered.
    pub fn animate<T: AsTarget>(&self, anim: AnimId, targets: &[T]) -> Result<usize> {
        let mut started = 0;
        let mut first_err = None;
        for target in targets {
            match self
                .attach(anim, target)
                .and_then(|_| self.start(anim, target))
            {
                Ok(()) => started += 1,
                Err(err) => {
                    debug!("animate: {} skipped a target ({})", anim, err);
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(started),
        }
    }

    /// Halt a top-level run and rewind it; it stays attached. Synchronously
    /// unschedules every tick beneath it. A second call is a no-op.
    pub fn stop<T: AsTarget + ?Sized>(&self, anim: AnimId, target: &T) -> Result<()> {
        let tk = target.target_key();
        let mut core = self.core.borrow_mut();
        core.top_level(anim, tk)?;
        core.stop_node(anim, tk);
        debug!("stop: {} on {}", anim, tk);
        Ok(())
    }

    /// Stop and discard all per-target state of a top-level run.
    pub fn detach<T: AsTarget + ?Sized>(&self, anim: AnimId, target: &T) -> Result<()> {
        let tk = target.target_key();
        let mut core = self.core.borrow_mut();
        core.top_level(anim, tk)?;
        core.remove_tree(anim, tk);
        Ok(())
    }

    /// Rewind a run for another pass: Delta leaves recapture from the live
    /// target, Absolute leaves keep their snapshot, counters go back to zero.
    /// A run in progress is stopped first.
    pub fn reset<T: AsTarget + ?Sized>(&self, anim: AnimId, target: &T) -> Result<()> {
        let tk = target.target_key();
        let mut core = self.core.borrow_mut();
        if core.top_level(anim, tk)?.active {
            core.stop_node(anim, tk);
        }
        core.rewind_node(anim, tk, Rewind::Reset)
    }

    /// Freeze a run in place; no time elapses until [`Animator::resume`].
    pub fn pause<T: AsTarget + ?Sized>(&self, anim: AnimId, target: &T) -> Result<()> {
        let tk = target.target_key();
        let mut core = self.core.borrow_mut();
        core.top_level(anim, tk)?;
        core.pause_node(anim, tk);
        debug!("pause: {} on {}", anim, tk);
        Ok(())
    }

    pub fn resume<T: AsTarget + ?Sized>(&self, anim: AnimId, target: &T) -> Result<()> {
        let tk = target.target_key();
        let mut core = self.core.borrow_mut();
        core.top_level(anim, tk)?;
        core.resume_node(anim, tk);
        debug!("resume: {} on {}", anim, tk);
        Ok(())
    }

    pub fn is_attached<T: AsTarget + ?Sized>(&self, anim: AnimId, target: &T) -> bool {
        let tk = target.target_key();
        self.core.borrow().runs.contains_key(&(anim, tk))
    }

    /// Active and not paused.
    pub fn is_running<T: AsTarget + ?Sized>(&self, anim: AnimId, target: &T) -> bool {
        let tk = target.target_key();
        self.core
            .borrow()
            .runs
            .get(&(anim, tk))
            .map_or(false, |run| run.active && !run.paused)
    }

    pub fn is_paused<T: AsTarget + ?Sized>(&self, anim: AnimId, target: &T) -> bool {
        let tk = target.target_key();
        self.core
            .borrow()
            .runs
            .get(&(anim, tk))
            .map_or(false, |run| run.paused)
    }

    /// Clamped progress of a leaf run in [0, 1].
    pub fn progress<T: AsTarget + ?Sized>(&self, anim: AnimId, target: &T) -> Option<f64> {
        let tk = target.target_key();
        match &self.core.borrow().runs.get(&(anim, tk))?.state {
            RunState::Leaf(inst) => Some(inst.progress()),
            _ => None,
        }
    }

    /// Seconds a leaf run has advanced, in [0, duration].
    pub fn elapsed<T: AsTarget + ?Sized>(&self, anim: AnimId, target: &T) -> Option<f64> {
        let tk = target.target_key();
        match &self.core.borrow().runs.get(&(anim, tk))?.state {
            RunState::Leaf(inst) => Some(inst.frame_pointer()),
            _ => None,
        }
    }

    /// Number of live per-(spec, target) run records.
    pub fn run_count(&self) -> usize {
        self.core.borrow().runs.len()
    }

    // ---------- events ----------

    pub fn subscribe<F>(&self, anim: AnimId, listener: F) -> ListenerId
    where
        F: Fn(&AnimationEvent) + 'static,
    {
        let mut core = self.core.borrow_mut();
        let id = core.ids.alloc_listener();
        core.listeners.add(id, anim, Rc::new(listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.core.borrow_mut().listeners.remove(id)
    }

    fn on_tick(&self, key: RunKey, dt: f64) {
        match self.core.try_borrow_mut() {
            Ok(mut core) => core.tick_leaf(key, dt),
            Err(_) => {
                warn!("tick: animator busy, skipping frame of {}", key.0);
                return;
            }
        };
        self.flush();
    }

    /// Deliver queued notifications in FIFO order with no state borrowed.
    fn flush(&self) {
        loop {
            let next = self.core.borrow_mut().queue.pop_front();
            let Some(dispatch) = next else {
                break;
            };
            match dispatch {
                Dispatch::Event(event) => {
                    let listeners = self.core.borrow().listeners.for_anim(event.anim());
                    for listener in listeners {
                        listener(&event);
                    }
                }
                Dispatch::Notify { target, anim } => {
                    let Some(target) = target.upgrade() else {
                        continue;
                    };
                    let delivered = match target.try_borrow_mut() {
                        Ok(mut t) => {
                            t.on_animation_complete(anim);
                            true
                        }
                        Err(_) => false,
                    };
                    if !delivered {
                        warn!("notify: target busy, dropped completion of {}", anim);
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Animator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.core.try_borrow() {
            Ok(core) => f
                .debug_struct("Animator")
                .field("specs", &core.specs.len())
                .field("runs", &core.runs.len())
                .field("listeners", &core.listeners.len())
                .finish(),
            Err(_) => f.write_str("Animator { <busy> }"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::spec::Kind;
    use crate::Target;
    use kinetic_api_core::Value;
    use std::cell::Cell;

    #[derive(Default)]
    struct Dot {
        x: f64,
        done: Vec<AnimId>,
    }

    impl Target for Dot {
        fn get(&self, name: &str) -> Option<Value> {
            (name == "x").then(|| Value::f(self.x))
        }
        fn set(&mut self, name: &str, value: Value) {
            if name == "x" {
                self.x = value.as_f64().unwrap_or(self.x);
            }
        }
        fn on_animation_complete(&mut self, anim: AnimId) {
            self.done.push(anim);
        }
    }

    fn setup() -> (Rc<ManualClock>, Animator) {
        let clock = Rc::new(ManualClock::new());
        let animator = Animator::with_clock(clock.clone());
        (clock, animator)
    }

    #[test]
    fn leaf_runs_and_notifies_once() {
        let (clock, animator) = setup();
        let dot = Rc::new(RefCell::new(Dot::default()));
        let anim = animator
            .animation(AnimationCfg::new().duration(1.0).property("x", 10.0))
            .unwrap();
        assert_eq!(animator.animate(anim, &[dot.clone()]).unwrap(), 1);
        assert_eq!(clock.scheduled(), 1);

        clock.run_for(1.5, 0.1);
        assert_eq!(dot.borrow().x, 10.0);
        assert_eq!(dot.borrow().done, vec![anim]);
        assert_eq!(clock.scheduled(), 0);
        assert!(!animator.is_running(anim, &dot));
    }

    #[test]
    fn silent_leaf_discards_state() {
        let (clock, animator) = setup();
        let dot = Rc::new(RefCell::new(Dot::default()));
        let anim = animator
            .animation(AnimationCfg::new().property("x", 1.0).generate_event(false))
            .unwrap();
        animator.animate(anim, &[dot.clone()]).unwrap();
        clock.run_for(2.0, 0.25);
        assert!(!animator.is_attached(anim, &dot));
        assert!(dot.borrow().done.is_empty());
    }

    #[test]
    fn child_runs_are_not_directly_controllable() {
        let (_clock, animator) = setup();
        let dot = Rc::new(RefCell::new(Dot::default()));
        let a = animator.animation(AnimationCfg::new().property("x", 1.0)).unwrap();
        let b = animator.animation(AnimationCfg::new().property("x", 2.0)).unwrap();
        let seq = animator.sequence(&[a, b]).unwrap();
        assert!(animator.attach(seq, &dot).unwrap());
        assert!(matches!(
            animator.stop(a, &dot),
            Err(AnimationError::NotTopLevel { parent, .. }) if parent == seq
        ));
        assert!(!animator.attach(a, &dot).unwrap());
    }

    #[test]
    fn listeners_may_reenter() {
        let (clock, animator) = setup();
        let dot = Rc::new(RefCell::new(Dot::default()));
        let anim = animator
            .animation(AnimationCfg::new().duration(0.5).kind(Kind::Delta).property("x", 1.0))
            .unwrap();
        let restarts = Rc::new(Cell::new(0));
        let (again, target, counter) = (animator.clone(), dot.clone(), restarts.clone());
        animator.subscribe(anim, move |event| {
            if matches!(event, AnimationEvent::Completed { .. }) && counter.get() < 2 {
                counter.set(counter.get() + 1);
                again.start(anim, &target).unwrap();
            }
        });
        animator.animate(anim, &[dot.clone()]).unwrap();
        clock.run_for(3.0, 0.25);
        assert_eq!(restarts.get(), 2);
        assert_eq!(dot.borrow().x, 3.0);
    }

    #[test]
    fn durations_compose() {
        let (_clock, animator) = setup();
        let a = animator.delay(1.0).unwrap();
        let b = animator.delay(2.0).unwrap();
        let c = animator.delay(0.5).unwrap();
        let par = animator.parallel(&[a, b]).unwrap();
        let seq = animator.sequence(&[par, c]).unwrap();
        assert_eq!(animator.duration(seq), Some(2.5));
        let rep = animator.repeat(seq, RepeatCount::Times(2)).unwrap();
        assert_eq!(animator.duration(rep), Some(5.0));
        let forever = animator.repeat(c, RepeatCount::Forever).unwrap();
        assert_eq!(animator.duration(forever), None);
    }

    #[test]
    fn dropping_the_animator_unschedules_ticks() {
        let (clock, animator) = setup();
        let dot = Rc::new(RefCell::new(Dot::default()));
        let anim = animator.animation(AnimationCfg::new().property("x", 1.0)).unwrap();
        animator.animate(anim, &[dot]).unwrap();
        assert_eq!(clock.scheduled(), 1);
        drop(animator);
        assert_eq!(clock.scheduled(), 0);
    }
}
