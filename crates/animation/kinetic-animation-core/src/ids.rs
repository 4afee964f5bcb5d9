//! Identifiers and simple allocators for core entities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle to an animation spec (leaf or composite) owned by an [`crate::Animator`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AnimId(pub u32);

/// Handle to a registered event listener.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u32);

impl fmt::Display for AnimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anim#{}", self.0)
    }
}

/// Monotonic allocator for AnimId and ListenerId.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_anim: u32,
    next_listener: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_anim(&mut self) -> AnimId {
        let id = AnimId(self.next_anim);
        self.next_anim = self.next_anim.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_listener(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener = self.next_listener.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_anim(), AnimId(0));
        assert_eq!(alloc.alloc_anim(), AnimId(1));
        assert_eq!(alloc.alloc_listener(), ListenerId(0));
        assert_eq!(alloc.alloc_listener(), ListenerId(1));
        assert_eq!(AnimId(7).to_string(), "anim#7");
    }
}
