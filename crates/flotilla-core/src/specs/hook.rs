//! Lifecycle hooks and their target selector.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle events a hook can be bound to.
pub mod events {
    pub const PRE_PROJECT: &str = "pre-project";
    pub const POST_PROJECT: &str = "post-project";
    pub const PRE_GROUP: &str = "pre-group";
    pub const POST_GROUP: &str = "post-group";
    pub const PRE_NODE_CREATION: &str = "pre-node-creation";
    pub const POST_NODE_CREATION: &str = "post-node-creation";
    pub const PRE_NODE_UPGRADE: &str = "pre-node-upgrade";
    pub const POST_NODE_UPGRADE: &str = "post-node-upgrade";
    pub const PRE_NODE_SYNC: &str = "pre-node-sync";
    pub const POST_NODE_SYNC: &str = "post-node-sync";

    pub const PRE_PROJECT_SHUTDOWN: &str = "pre-project-shutdown";
    pub const POST_PROJECT_SHUTDOWN: &str = "post-project-shutdown";
    pub const PRE_GROUP_SHUTDOWN: &str = "pre-group-shutdown";
    pub const POST_GROUP_SHUTDOWN: &str = "post-group-shutdown";
    pub const PRE_NODE_SHUTDOWN: &str = "pre-node-shutdown";
    pub const POST_NODE_SHUTDOWN: &str = "post-node-shutdown";

    /// Events that make sense on a single node.
    pub const NODE_EVENTS: &[&str] = &[
        PRE_NODE_CREATION,
        POST_NODE_CREATION,
        PRE_NODE_UPGRADE,
        POST_NODE_UPGRADE,
        PRE_NODE_SYNC,
        POST_NODE_SYNC,
        PRE_NODE_SHUTDOWN,
        POST_NODE_SHUTDOWN,
    ];

    /// Events a group may declare hooks for.
    pub const GROUP_EVENTS: &[&str] = &[
        PRE_GROUP,
        POST_GROUP,
        PRE_GROUP_SHUTDOWN,
        POST_GROUP_SHUTDOWN,
        PRE_NODE_CREATION,
        POST_NODE_CREATION,
        PRE_NODE_UPGRADE,
        POST_NODE_UPGRADE,
        PRE_NODE_SYNC,
        POST_NODE_SYNC,
        PRE_NODE_SHUTDOWN,
        POST_NODE_SHUTDOWN,
    ];
}

/// Name reserved for the orchestrating machine.
pub const HOST: &str = "host";

/// Who a hook is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum HookTarget {
    /// Empty selector: every node of the home group, never the host.
    #[default]
    GroupDefault,
    /// `*`: every node in the active node set.
    Broadcast,
    /// `host`: the orchestrating machine.
    Host,
    /// A concrete node name.
    Named(String),
}

impl HookTarget {
    pub fn parse(value: &str) -> Self {
        match value {
            "" => HookTarget::GroupDefault,
            "*" => HookTarget::Broadcast,
            HOST => HookTarget::Host,
            name => HookTarget::Named(name.to_string()),
        }
    }

    /// Whether a candidate node (or `host`) is selected by this target.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            HookTarget::GroupDefault => candidate != HOST,
            HookTarget::Broadcast => true,
            HookTarget::Host => candidate == HOST,
            HookTarget::Named(name) => name == candidate,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HookTarget::GroupDefault => "",
            HookTarget::Broadcast => "*",
            HookTarget::Host => HOST,
            HookTarget::Named(name) => name,
        }
    }
}

impl fmt::Display for HookTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HookTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HookTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| HookTarget::parse(&s)).unwrap_or_default())
    }
}

/// An executable lifecycle action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    pub event: String,

    #[serde(default)]
    pub node: HookTarget,

    #[serde(default)]
    pub commands: Vec<String>,

    #[serde(default)]
    pub flags: Vec<String>,

    /// Overrides the default shell entrypoint (e.g. `["/bin/sh", "-c"]`).
    #[serde(default)]
    pub entrypoint: Vec<String>,

    #[serde(default)]
    pub uid: u32,

    #[serde(default)]
    pub gid: u32,

    #[serde(default)]
    pub cwd: String,

    /// Store stdout into this project variable instead of the log sink.
    #[serde(default)]
    pub out2var: String,

    /// Store stderr into this project variable instead of the log sink.
    #[serde(default)]
    pub err2var: String,
}

impl Hook {
    pub fn new(event: impl Into<String>, node: HookTarget) -> Self {
        Self {
            event: event.into(),
            node,
            ..Default::default()
        }
    }

    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_out2var(mut self, var: impl Into<String>) -> Self {
        self.out2var = var.into();
        self
    }

    pub fn with_err2var(mut self, var: impl Into<String>) -> Self {
        self.err2var = var.into();
        self
    }

    pub fn captures_output(&self) -> bool {
        !self.out2var.is_empty() || !self.err2var.is_empty()
    }
}
