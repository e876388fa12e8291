//! Static response overrides keyed by `"Handler@method"`.
//!
//! An override replaces generated example responses entirely. The store is
//! read from the configured `custom_responses` file when it exists, otherwise
//! from the stub bundled with the crate.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;
use std::fs;
use std::path::Path;

const BUNDLED: &str = include_str!("../resources/custom-responses.json");

/// Literal response bodies by handler action key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticOverrides {
    responses: IndexMap<String, Value>,
}

impl StaticOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stub shipped with the crate.
    pub fn bundled() -> Self {
        match Self::from_json_str(BUNDLED) {
            Ok(overrides) => overrides,
            Err(e) => {
                warn!("Bundled response overrides are unreadable: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let responses = serde_json::from_str(content).context("Invalid JSON response overrides")?;
        Ok(Self { responses })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let responses = serde_yaml::from_str(content).context("Invalid YAML response overrides")?;
        Ok(Self { responses })
    }

    /// Loads a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read response overrides: {}", path.display()))?;
        let overrides = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
        .with_context(|| format!("Failed to load {}", path.display()))?;

        debug!("Loaded {} response overrides from {}", overrides.len(), path.display());
        Ok(overrides)
    }

    /// The configured file when present and readable, otherwise the bundled stub.
    pub fn resolve(configured: Option<&Path>) -> Self {
        match configured {
            Some(path) if path.exists() => Self::load(path).unwrap_or_else(|e| {
                warn!("{:#}; using bundled response overrides", e);
                Self::bundled()
            }),
            _ => Self::bundled(),
        }
    }

    pub fn insert(&mut self, action: &str, body: Value) -> &mut Self {
        self.responses.insert(action.to_string(), body);
        self
    }

    pub fn get(&self, action: &str) -> Option<&Value> {
        self.responses.get(action)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}
