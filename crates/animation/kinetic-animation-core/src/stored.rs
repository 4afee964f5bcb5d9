use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::engine::Animator;
use crate::error::AnimationError;
use crate::ids::AnimId;
use crate::spec::{AnimationCfg, Kind, RepeatCount};
use crate::Result;
use kinetic_api_core::json::parse_value;

/// Public API: build an animation tree from a stored JSON description and
/// register every node with `animator`. Returns the id of the root.
///
/// Nodes:
/// - `{ "type": "animation", "duration"?, "easing"?, "kind"?, "generate_event"?, "properties": {..} }`
/// - `{ "type": "delay", "duration" }`
/// - `{ "type": "sequence" | "parallel", "children": [..], "single_event"? }`
/// - `{ "type": "repeat", "animation": {..}, "times"? }` (missing/null = forever)
///
/// Property values accept plain JSON shorthand (numbers, arrays, objects).
pub fn load_stored_json(animator: &Animator, s: &str) -> Result<AnimId> {
    let node: StoredNode = serde_json::from_str(s)?;
    build(animator, node)
}

/// Same as [`load_stored_json`] for an already parsed document.
pub fn load_stored_value(animator: &Animator, value: JsonValue) -> Result<AnimId> {
    let node: StoredNode = serde_json::from_value(value)?;
    build(animator, node)
}

fn build(animator: &Animator, node: StoredNode) -> Result<AnimId> {
    match node {
        StoredNode::Animation {
            duration,
            easing,
            kind,
            generate_event,
            properties,
        } => {
            let mut cfg = AnimationCfg {
                duration,
                easing,
                kind,
                generate_event,
                properties: IndexMap::with_capacity(properties.len()),
            };
            for (name, raw) in properties {
                let value = parse_value(raw).map_err(|e| AnimationError::Stored {
                    reason: format!("property '{name}': {e}"),
                })?;
                cfg.properties.insert(name, value);
            }
            animator.animation(cfg)
        }
        StoredNode::Delay { duration } => animator.delay(duration),
        StoredNode::Sequence {
            children,
            single_event,
        } => {
            let ids = build_all(animator, children)?;
            animator.sequence_with(&ids, single_event)
        }
        StoredNode::Parallel {
            children,
            single_event,
        } => {
            let ids = build_all(animator, children)?;
            animator.parallel_with(&ids, single_event)
        }
        StoredNode::Repeat { animation, times } => {
            let inner = build(animator, *animation)?;
            animator.repeat(inner, RepeatCount::from(times))
        }
    }
}

fn build_all(animator: &Animator, nodes: Vec<StoredNode>) -> Result<Vec<AnimId>> {
    nodes.into_iter().map(|n| build(animator, n)).collect()
}

// Minimal serde model for stored descriptions.

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StoredNode {
    Animation {
        #[serde(default)]
        duration: Option<f64>,
        #[serde(default)]
        easing: Option<String>,
        #[serde(default)]
        kind: Kind,
        #[serde(default = "default_true")]
        generate_event: bool,
        #[serde(default)]
        properties: IndexMap<String, JsonValue>,
    },
    Delay {
        duration: f64,
    },
    Sequence {
        children: Vec<StoredNode>,
        #[serde(default)]
        single_event: bool,
    },
    Parallel {
        children: Vec<StoredNode>,
        #[serde(default)]
        single_event: bool,
    },
    Repeat {
        animation: Box<StoredNode>,
        #[serde(default)]
        times: Option<u32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use std::rc::Rc;

    fn animator() -> Animator {
        Animator::with_clock(Rc::new(ManualClock::new()))
    }

    #[test]
    fn builds_nested_tree() {
        let animator = animator();
        let doc = json!({
            "type": "repeat",
            "times": 2,
            "animation": {
                "type": "sequence",
                "children": [
                    { "type": "delay", "duration": 0.5 },
                    { "type": "animation", "duration": 1.0, "kind": "delta", "properties": { "x": 10 } }
                ]
            }
        });
        let id = load_stored_value(&animator, doc).unwrap();
        assert_eq!(animator.duration(id), Some(3.0));
    }

    #[test]
    fn unknown_easing_is_rejected() {
        let animator = animator();
        let err = load_stored_json(
            &animator,
            r#"{ "type": "animation", "easing": "wobble", "properties": { "x": 1 } }"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            AnimationError::UnknownEasing {
                name: "wobble".into()
            }
        );
    }

    #[test]
    fn malformed_json_maps_to_stored_error() {
        let animator = animator();
        let err = load_stored_json(&animator, r#"{ "type": "spin" }"#).unwrap_err();
        assert_eq!(err.category(), "serialization");
    }
}
