//! Target capability: the objects whose named properties get animated.
//!
//! The engine never owns targets. It keeps `Weak` references for the
//! lifetime of a run and identifies targets by their allocation.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;

use crate::ids::AnimId;
use kinetic_api_core::Value;

/// Property access implemented by every animatable type.
///
/// `get`/`set` are called while the animator updates its own state, so
/// implementations must not call back into the [`crate::Animator`].
/// `on_animation_complete` runs after the state update and may.
pub trait Target {
    /// Current live value of a property, `None` when the target lacks it.
    fn get(&self, name: &str) -> Option<Value>;

    fn set(&mut self, name: &str, value: Value);

    /// Target-addressed "one animation unit finished" notification.
    fn on_animation_complete(&mut self, _anim: AnimId) {}
}

/// Shared handle to a target.
pub type TargetRef = Rc<RefCell<dyn Target>>;

pub(crate) type WeakTarget = Weak<RefCell<dyn Target>>;

/// Conversion into the shared, type-erased target handle.
pub trait AsTarget {
    fn as_target(&self) -> TargetRef;

    fn target_key(&self) -> TargetKey {
        TargetKey::of(&self.as_target())
    }
}

impl<T: Target + 'static> AsTarget for Rc<RefCell<T>> {
    fn as_target(&self) -> TargetRef {
        self.clone()
    }
}

impl AsTarget for Rc<RefCell<dyn Target>> {
    fn as_target(&self) -> TargetRef {
        self.clone()
    }
}

/// Opaque identity of a target, stable while the animator references it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct TargetKey(usize);

impl TargetKey {
    pub fn of<T: ?Sized>(target: &Rc<RefCell<T>>) -> Self {
        TargetKey(Rc::as_ptr(target) as *const () as usize)
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target@{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Dummy;

    impl Target for Dummy {
        fn get(&self, _name: &str) -> Option<Value> {
            None
        }
        fn set(&mut self, _name: &str, _value: Value) {}
    }

    #[test]
    fn key_survives_type_erasure() {
        let typed = Rc::new(RefCell::new(Dummy));
        let erased = typed.as_target();
        assert_eq!(TargetKey::of(&typed), TargetKey::of(&erased));

        let other = Rc::new(RefCell::new(Dummy));
        assert_ne!(TargetKey::of(&typed), TargetKey::of(&other));
    }
}
