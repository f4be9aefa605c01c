//! Hook selection for a lifecycle event.
//!
//! Resolution never mutates the declared hooks: every selected hook is
//! turned into a [`ResolvedHook`] carrying the concrete place it runs.

use crate::specs::{Group, HOST, Hook, HookTarget, Node, Project};

/// Where a resolved hook executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecTarget {
    /// The orchestrating machine.
    Host,
    /// One concrete instance.
    Node(String),
    /// Every node in the active node set of the stage.
    Fanout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHook {
    pub hook: Hook,
    pub target: ExecTarget,
}

impl ResolvedHook {
    pub fn new(hook: &Hook, target: ExecTarget) -> Self {
        Self {
            hook: hook.clone(),
            target,
        }
    }

    /// Keep the declared selector, expanding selectors that address many nodes.
    pub fn from_declared(hook: &Hook) -> Self {
        let target = match &hook.node {
            HookTarget::Host => ExecTarget::Host,
            HookTarget::Named(name) => ExecTarget::Node(name.clone()),
            HookTarget::GroupDefault | HookTarget::Broadcast => ExecTarget::Fanout,
        };
        Self::new(hook, target)
    }
}

/// Hooks bound to `event` whose selector matches at least one candidate.
pub fn resolve<'a, S: AsRef<str>>(hooks: &'a [Hook], event: &str, targets: &[S]) -> Vec<&'a Hook> {
    hooks
        .iter()
        .filter(|h| h.event == event)
        .filter(|h| targets.iter().any(|t| h.node.matches(t.as_ref())))
        .collect()
}

/// Stamp each matching hook with every concrete node it applies to.
///
/// The output is hook-major: all stamps of the first hook come before the
/// second hook, preserving declaration order.
pub fn filter_for_nodes<'a, I, S>(hooks: I, nodes: &[S]) -> Vec<ResolvedHook>
where
    I: IntoIterator<Item = &'a Hook>,
    S: AsRef<str>,
{
    let mut seen: Vec<&str> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if !seen.contains(&node.as_ref()) {
            seen.push(node.as_ref());
        }
    }

    let mut resolved = Vec::new();
    for hook in hooks {
        for node in &seen {
            if hook.node.matches(node) {
                let target = if *node == HOST {
                    ExecTarget::Host
                } else {
                    ExecTarget::Node(node.to_string())
                };
                resolved.push(ResolvedHook::new(hook, target));
            }
        }
    }
    resolved
}

/// Hooks explicitly addressed to `host`.
pub fn host_hooks(hooks: &[Hook], event: &str) -> Vec<ResolvedHook> {
    hooks
        .iter()
        .filter(|h| h.event == event && h.node == HookTarget::Host)
        .map(|h| ResolvedHook::new(h, ExecTarget::Host))
        .collect()
}

/// Project-scope hooks followed by group-scope hooks for a group-level event.
///
/// Candidates are the host plus every member of the group, so hooks naming
/// nodes of other groups are left out.
pub fn group_stage_hooks(project: &Project, group: &Group, event: &str) -> Vec<ResolvedHook> {
    let mut candidates = vec![HOST.to_string()];
    candidates.extend(group.node_names());

    resolve(&project.hooks, event, &candidates)
        .into_iter()
        .chain(resolve(&group.hooks, event, &candidates))
        .map(ResolvedHook::from_declared)
        .collect()
}

/// Hooks for a project-wide event addressed to the host or any active node.
pub fn project_stage_hooks<S: AsRef<str>>(project: &Project, event: &str, active: &[S]) -> Vec<ResolvedHook> {
    let mut candidates = vec![HOST.to_string()];
    candidates.extend(active.iter().map(|n| n.as_ref().to_string()));

    resolve(&project.hooks, event, &candidates)
        .into_iter()
        .map(ResolvedHook::from_declared)
        .collect()
}

/// Hooks for a node-level event: project, then group, then node scope.
///
/// Selectors matching the node are stamped with its name; host hooks stay on
/// the host.
pub fn node_stage_hooks(project: &Project, group: &Group, node: &Node, event: &str) -> Vec<ResolvedHook> {
    let name = node.get_name();
    [&project.hooks, &group.hooks, &node.hooks]
        .into_iter()
        .flat_map(|scope| scope.iter())
        .filter(|h| h.event == event)
        .filter_map(|h| match &h.node {
            HookTarget::Host => Some(ResolvedHook::new(h, ExecTarget::Host)),
            target if target.matches(&name) => {
                Some(ResolvedHook::new(h, ExecTarget::Node(name.clone())))
            }
            _ => None,
        })
        .collect()
}
