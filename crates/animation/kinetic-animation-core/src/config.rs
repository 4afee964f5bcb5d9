//! Core configuration for kinetic-animation-core.

use serde::{Deserialize, Serialize};

/// Engine-wide defaults. Missing fields fall back to [`Config::default`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Interval (seconds) requested from the clock for each running leaf.
    pub tick_interval: f64,

    /// Duration used when an [`crate::AnimationCfg`] does not set one.
    pub default_duration: f64,

    /// Easing used when an [`crate::AnimationCfg`] does not name one.
    pub default_easing: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval: 1.0 / 60.0,
            default_duration: 1.0,
            default_easing: "linear".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "default_easing": "ease_out_quad" }"#).unwrap();
        assert_eq!(cfg.default_easing, "ease_out_quad");
        assert_eq!(cfg.default_duration, 1.0);
        assert!((cfg.tick_interval - 1.0 / 60.0).abs() < 1e-12);
    }
}
