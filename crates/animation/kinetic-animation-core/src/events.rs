//! Notification contracts.
//!
//! Spec-level events go to listeners subscribed on an animation id.
//! Target-level notifications go to [`crate::Target::on_animation_complete`].
//! Both are queued while engine state is being updated and flushed in FIFO
//! order afterwards, on the same thread.

use std::rc::Rc;

use serde::Serialize;

use crate::ids::{AnimId, ListenerId};
use crate::target::{TargetKey, WeakTarget};

/// Discrete signals emitted by animations for a given target.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum AnimationEvent {
    /// A run began (once per run; repeats do not re-announce).
    Started { anim: AnimId, target: TargetKey },
    /// A run finished.
    Completed { anim: AnimId, target: TargetKey },
    /// A repeat controller finished iteration `count` (1-based).
    Repeated {
        anim: AnimId,
        target: TargetKey,
        count: u32,
    },
}

impl AnimationEvent {
    #[inline]
    pub fn anim(&self) -> AnimId {
        match self {
            AnimationEvent::Started { anim, .. }
            | AnimationEvent::Completed { anim, .. }
            | AnimationEvent::Repeated { anim, .. } => *anim,
        }
    }

    #[inline]
    pub fn target(&self) -> TargetKey {
        match self {
            AnimationEvent::Started { target, .. }
            | AnimationEvent::Completed { target, .. }
            | AnimationEvent::Repeated { target, .. } => *target,
        }
    }
}

/// Listener callback. Use interior mutability for listener-side state.
pub type Listener = Rc<dyn Fn(&AnimationEvent)>;

/// One queued notification.
pub(crate) enum Dispatch {
    Event(AnimationEvent),
    Notify { target: WeakTarget, anim: AnimId },
}

#[derive(Default)]
pub(crate) struct ListenerTable {
    entries: Vec<(ListenerId, AnimId, Listener)>,
}

impl ListenerTable {
    pub(crate) fn add(&mut self, id: ListenerId, anim: AnimId, listener: Listener) {
        self.entries.push((id, anim, listener));
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(lid, _, _)| *lid != id);
        self.entries.len() != before
    }

    /// Snapshot of the listeners for `anim`, in registration order.
    pub(crate) fn for_anim(&self, anim: AnimId) -> Vec<Listener> {
        self.entries
            .iter()
            .filter(|(_, a, _)| *a == anim)
            .map(|(_, _, l)| l.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
