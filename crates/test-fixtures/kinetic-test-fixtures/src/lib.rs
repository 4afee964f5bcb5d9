//! Shared JSON fixtures for Kinetic tests, resolved through `fixtures/manifest.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    animations: BTreeMap<String, FixtureEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FixtureEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        expect: Option<serde_json::Value>,
    },
}

impl FixtureEntry {
    fn as_path(&self) -> &str {
        match self {
            FixtureEntry::Path(path) => path,
            FixtureEntry::Detailed { path, .. } => path,
        }
    }

    fn expect(&self) -> Option<&serde_json::Value> {
        match self {
            FixtureEntry::Path(_) => None,
            FixtureEntry::Detailed { expect, .. } => expect.as_ref(),
        }
    }
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup(name: &str) -> Result<&'static FixtureEntry> {
    MANIFEST
        .animations
        .get(name)
        .ok_or_else(|| anyhow!("unknown animation fixture '{name}'"))
}

pub mod animations {
    use super::*;

    /// Fixture names, sorted.
    pub fn keys() -> Vec<String> {
        MANIFEST.animations.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(lookup(name)?.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        super::load_json(lookup(name)?.as_path())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        Ok(resolve_path(lookup(name)?.as_path()))
    }

    /// Expected outcome recorded next to the fixture in the manifest, if any.
    pub fn expectation<T: DeserializeOwned>(name: &str) -> Result<Option<T>> {
        match lookup(name)?.expect() {
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .with_context(|| format!("failed to parse expectation of fixture {name}")),
            None => Ok(None),
        }
    }
}
