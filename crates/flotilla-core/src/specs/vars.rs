//! Project variable layers.
//!
//! Layers are merged in declaration order, later keys winning. Hook output
//! capture always lands in the last layer.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ComposeError;

pub type VarMap = serde_json::Map<String, Value>;

/// One `{ envs: {...} }` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VarLayer {
    #[serde(default)]
    pub envs: VarMap,
}

impl VarLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.envs.insert(key.into(), value.into());
    }

    /// Add a `key=value` pair as given on the command line.
    pub fn add_kv(&mut self, pair: &str) -> anyhow::Result<()> {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ComposeError::InvalidVariable(format!("{pair} without =")).into());
        };
        if key.is_empty() {
            return Err(ComposeError::InvalidVariable(format!("{pair} with an empty key")).into());
        }
        self.envs
            .insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse variables file")
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read variables file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to load variables file: {}", path.display()))
    }
}

/// Ordered variable layers owned by a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarLayers(Vec<VarLayer>);

impl VarLayers {
    pub fn new(layers: Vec<VarLayer>) -> Self {
        Self(layers)
    }

    pub fn push(&mut self, layer: VarLayer) {
        self.0.push(layer);
    }

    pub fn layers(&self) -> &[VarLayer] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Later-wins merge of every layer.
    pub fn merged(&self) -> VarMap {
        let mut merged = VarMap::new();
        for layer in &self.0 {
            for (key, value) in &layer.envs {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Flatten to string values suitable for a process environment.
    pub fn env_map(&self) -> BTreeMap<String, String> {
        self.merged()
            .into_iter()
            .map(|(key, value)| (key, value_to_env(&value)))
            .collect()
    }

    /// Store a captured value into the most recent layer.
    pub fn capture(&mut self, key: &str, value: String) {
        if self.0.is_empty() {
            self.0.push(VarLayer::new());
        }
        if let Some(last) = self.0.last_mut() {
            last.envs.insert(key.to_string(), Value::String(value));
        }
    }
}

pub fn value_to_env(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
