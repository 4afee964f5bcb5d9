//! Kinetic Animation Core (engine-agnostic)
//!
//! Interpolates named properties of host-owned targets over time. Leaf
//! animations (absolute or delta) compose into sequences, parallels and
//! repeats; an [`Animator`] keeps independent execution state for every
//! (animation, target) pair and is driven by an external [`Clock`].

pub mod clock;
pub mod config;
pub mod easing;
pub mod engine;
pub mod error;
pub mod events;
pub mod ids;
mod instance;
pub mod spec;
pub mod stored;
pub mod target;

// Re-exports for consumers (hosts and adapters)
pub use clock::{Clock, ManualClock, TickFn, TickHandle};
pub use config::Config;
pub use easing::{Easing, EasingFn, EasingRegistry, BUILTIN_EASINGS};
pub use engine::Animator;
pub use error::AnimationError;
pub use events::{AnimationEvent, Listener};
pub use ids::{AnimId, IdAllocator, ListenerId};
pub use spec::{AnimationCfg, Kind, RepeatCount};
pub use stored::{load_stored_json, load_stored_value};
pub use target::{AsTarget, Target, TargetKey, TargetRef};
pub use kinetic_api_core::{Value, ValueKind};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AnimationError>;
