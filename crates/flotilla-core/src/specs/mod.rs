//! Deployment tree: environment → project → group → node.
//!
//! The tree is deserialized once from YAML environment files and only mutated
//! afterwards through variable-layer appends, include-file appends and node
//! prefix propagation.

pub mod command;
pub mod hook;
pub mod vars;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use command::CommandSpec;
pub use hook::{HOST, Hook, HookTarget, events};
pub use vars::{VarLayer, VarLayers, VarMap};

/// Prefix value that opts a node out of an inherited prefix.
pub const NO_PREFIX: &str = "-";

/// Root of one environment file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub version: String,

    /// Path of the file this environment was loaded from.
    #[serde(skip)]
    pub file: PathBuf,

    #[serde(default)]
    pub template_engine: TemplateEngineSpec,

    #[serde(default)]
    pub projects: Vec<Project>,

    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateEngineSpec {
    #[serde(default = "default_engine")]
    pub engine: String,

    #[serde(default)]
    pub opts: Vec<String>,
}

impl Default for TemplateEngineSpec {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            opts: Vec::new(),
        }
    }
}

fn default_engine() -> String {
    "handlebars".to_string()
}

impl Environment {
    pub fn from_yaml(content: &str, file: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let file = file.into();
        let mut env: Environment = serde_yaml::from_str(content)
            .with_context(|| format!("Failed to parse environment file: {}", file.display()))?;
        env.file = file;
        Ok(env)
    }

    /// Absolute directory containing the environment file.
    pub fn base_dir(&self) -> anyhow::Result<PathBuf> {
        let dir = self
            .file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::path::absolute(dir)
            .with_context(|| format!("Failed to resolve directory of {}", self.file.display()))
    }

    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn project_mut(&mut self, name: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.name == name)
    }

    pub fn command(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|c| c.name == name)
    }
}

/// A named deployment unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_groups_files: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_env_files: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_hooks_files: Vec<String>,

    #[serde(default)]
    pub vars: VarLayers,

    #[serde(default)]
    pub groups: Vec<Group>,

    #[serde(default)]
    pub hooks: Vec<Hook>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_templates: Vec<ConfigTemplate>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nodes_prefix: String,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    pub fn add_vars(&mut self, layer: VarLayer) {
        self.vars.push(layer);
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Find a node by its effective (prefixed) name.
    pub fn find_node(&self, name: &str) -> Option<(&Group, &Node)> {
        self.groups.iter().find_map(|g| {
            g.nodes
                .iter()
                .find(|n| n.get_name() == name)
                .map(|n| (g, n))
        })
    }

    pub fn node_names(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|g| g.nodes.iter().map(Node::get_name))
            .collect()
    }

    /// Propagate a prefix to every group and node that has none of its own.
    pub fn set_nodes_prefix(&mut self, prefix: &str) {
        self.nodes_prefix = prefix.to_string();
        for group in &mut self.groups {
            if group.nodes_prefix.is_empty() {
                group.set_nodes_prefix(prefix);
            }
        }
    }
}

/// Nodes sharing one remote connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Remote endpoint name; empty means the default local remote.
    #[serde(default)]
    pub connection: String,

    #[serde(default)]
    pub common_profiles: Vec<String>,

    #[serde(default)]
    pub ephemeral: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nodes_prefix: String,

    /// Instance config shared by every node; node entries override it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_templates: Vec<ConfigTemplate>,

    #[serde(default)]
    pub hooks: Vec<Hook>,

    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Group {
    pub fn new(name: impl Into<String>, connection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection: connection.into(),
            ..Default::default()
        }
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse group file")
    }

    pub fn set_nodes_prefix(&mut self, prefix: &str) {
        self.nodes_prefix = prefix.to_string();
        for node in &mut self.nodes {
            if node.name_prefix.is_empty() {
                node.name_prefix = prefix.to_string();
            }
        }
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(Node::get_name).collect()
    }

    /// Whether the group passes the enable/disable name lists.
    ///
    /// A name in the disabled list always loses.
    pub fn to_process(&self, enabled: &[String], disabled: &[String]) -> bool {
        if disabled.iter().any(|g| g == &self.name) {
            return false;
        }
        enabled.is_empty() || enabled.iter().any(|g| g == &self.name)
    }
}

/// One instance to reconcile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name_prefix: String,

    #[serde(default)]
    pub image_source: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_remote_server: String,

    #[serde(default)]
    pub profiles: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_dir: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,

    /// Seconds to wait for an address after creation; 0 disables the wait.
    #[serde(default)]
    pub wait_ip: u64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sync_resources: Vec<SyncResource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_templates: Vec<ConfigTemplate>,

    #[serde(default)]
    pub hooks: Vec<Hook>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Instance name on the remote, with the prefix applied.
    pub fn get_name(&self) -> String {
        if self.name_prefix.is_empty() || self.name_prefix == NO_PREFIX {
            self.name.clone()
        } else {
            format!("{}-{}", self.name_prefix, self.name)
        }
    }

    pub fn is_source_path_relative(&self) -> bool {
        !Path::new(&self.source_dir).is_absolute()
    }

    /// Directory relative sources are resolved against.
    pub fn source_base_dir(&self, env_base_dir: &Path) -> PathBuf {
        if self.source_dir.is_empty() {
            env_base_dir.to_path_buf()
        } else if self.is_source_path_relative() {
            env_base_dir.join(&self.source_dir)
        } else {
            PathBuf::from(&self.source_dir)
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self)
            .with_context(|| format!("Failed to convert node {} to json", self.name))
    }

    /// Group config overlaid by node config, with labels as `user.<key>`.
    pub fn instance_config(&self, group_config: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut config = group_config.clone();
        config.extend(self.config.iter().map(|(k, v)| (k.clone(), v.clone())));
        for (key, value) in &self.labels {
            config.insert(format!("user.{key}"), value.clone());
        }
        config
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResource {
    pub source: String,
    #[serde(rename = "dst")]
    pub destination: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTemplate {
    pub source: String,
    #[serde(rename = "dst")]
    pub destination: String,
}
