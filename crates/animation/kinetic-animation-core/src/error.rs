//! Error types for the animation engine

use kinetic_api_core::ShapeError;

use crate::ids::AnimId;
use crate::target::TargetKey;

/// Error type for animation construction and run control
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AnimationError {
    /// Start and end values of a property disagree structurally
    #[error("Shape mismatch for property '{property}': {source}")]
    ShapeMismatch {
        property: String,
        #[source]
        source: ShapeError,
    },

    /// Duration must be strictly positive and finite
    #[error("Invalid duration: {duration} (must be > 0)")]
    InvalidDuration { duration: f64 },

    /// Easing name not present in the registry
    #[error("Unknown easing function: {name}")]
    UnknownEasing { name: String },

    /// No per-target state exists for this animation
    #[error("Animation {anim} is not attached to target {target}")]
    NotAttached { anim: AnimId, target: TargetKey },

    /// The run is owned by a composite and cannot be controlled directly
    #[error("Animation {anim} on target {target} is driven by composite {parent}")]
    NotTopLevel {
        anim: AnimId,
        target: TargetKey,
        parent: AnimId,
    },

    /// Id was never issued by this animator
    #[error("Unknown animation: {anim}")]
    UnknownAnimation { anim: AnimId },

    /// A composite tree references the same animation twice
    #[error("Animation {anim} appears more than once in a composite")]
    DuplicateChild { anim: AnimId },

    #[error("Invalid composition: {reason}")]
    InvalidComposition { reason: String },

    #[error("Invalid repeat count: {times} (must be >= 1)")]
    InvalidRepeatCount { times: u32 },

    /// Target does not expose an animated property
    #[error("Target has no property '{property}'")]
    MissingProperty { property: String },

    /// Target was dropped or is mutably borrowed elsewhere
    #[error("Target is unavailable (dropped or borrowed)")]
    TargetUnavailable,

    /// Stored animation description could not be parsed
    #[error("Stored animation error: {reason}")]
    Stored { reason: String },
}

impl AnimationError {
    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::ShapeMismatch { .. } | Self::MissingProperty { .. } => "shape",
            Self::InvalidDuration { .. }
            | Self::UnknownEasing { .. }
            | Self::InvalidRepeatCount { .. } => "validation",
            Self::DuplicateChild { .. }
            | Self::InvalidComposition { .. }
            | Self::UnknownAnimation { .. } => "composition",
            Self::NotAttached { .. } | Self::NotTopLevel { .. } => "run",
            Self::TargetUnavailable => "target",
            Self::Stored { .. } => "serialization",
        }
    }
}

impl From<serde_json::Error> for AnimationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Stored {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_categories() {
        let err = AnimationError::InvalidDuration { duration: 0.0 };
        assert_eq!(err.category(), "validation");
        let err = AnimationError::UnknownAnimation { anim: AnimId(3) };
        assert_eq!(err.category(), "composition");
        assert_eq!(AnimationError::TargetUnavailable.category(), "target");
    }

    #[test]
    fn shape_mismatch_keeps_source() {
        use std::error::Error as _;
        let err = AnimationError::ShapeMismatch {
            property: "pos".into(),
            source: ShapeError::LengthMismatch {
                path: String::new(),
                expected: 2,
                found: 3,
            },
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("'pos'"));
    }

    #[test]
    fn json_errors_become_stored() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AnimationError = json_err.into();
        assert_eq!(err.category(), "serialization");
    }
}
