//! Per-invocation settings for apply and destroy.

use crate::hooks::FlagFilter;
use crate::specs::Group;

/// Group name filter; a disabled name always loses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFilter {
    enabled: Vec<String>,
    disabled: Vec<String>,
}

impl GroupFilter {
    pub fn new(enabled: Vec<String>, disabled: Vec<String>) -> Self {
        Self { enabled, disabled }
    }

    pub fn enabled(&self) -> &[String] {
        &self.enabled
    }

    pub fn disabled(&self) -> &[String] {
        &self.disabled
    }

    pub fn includes(&self, group: &Group) -> bool {
        group.to_process(&self.enabled, &self.disabled)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub flags: FlagFilter,
    pub groups: GroupFilter,
    /// Skip pushing sync resources.
    pub skip_sync: bool,
    /// Prefix stamped on nodes that have none.
    pub nodes_prefix: Option<String>,
    /// Recreate instances that already exist.
    pub upgrade: bool,
    /// Confirm each upgrade interactively.
    pub ask: bool,
}

impl ApplyOptions {
    pub fn with_flags_enabled(mut self, flags: Vec<String>) -> Self {
        self.flags.set_enabled(flags);
        self
    }

    pub fn with_flags_disabled(mut self, flags: Vec<String>) -> Self {
        self.flags.set_disabled(flags);
        self
    }

    pub fn with_groups_enabled(mut self, groups: Vec<String>) -> Self {
        self.groups.enabled = groups;
        self
    }

    pub fn with_groups_disabled(mut self, groups: Vec<String>) -> Self {
        self.groups.disabled = groups;
        self
    }

    pub fn with_skip_sync(mut self, skip: bool) -> Self {
        self.skip_sync = skip;
        self
    }

    pub fn with_nodes_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.nodes_prefix = Some(prefix.into());
        self
    }

    pub fn with_upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    pub fn with_ask(mut self, ask: bool) -> Self {
        self.ask = ask;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestroyOptions {
    pub flags: FlagFilter,
    pub groups: GroupFilter,
    pub nodes_prefix: Option<String>,
}

impl DestroyOptions {
    pub fn with_flags_enabled(mut self, flags: Vec<String>) -> Self {
        self.flags.set_enabled(flags);
        self
    }

    pub fn with_flags_disabled(mut self, flags: Vec<String>) -> Self {
        self.flags.set_disabled(flags);
        self
    }

    pub fn with_groups_enabled(mut self, groups: Vec<String>) -> Self {
        self.groups.enabled = groups;
        self
    }

    pub fn with_groups_disabled(mut self, groups: Vec<String>) -> Self {
        self.groups.disabled = groups;
        self
    }

    pub fn with_nodes_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.nodes_prefix = Some(prefix.into());
        self
    }
}
