//! Hook execution.
//!
//! Commands run strictly in order and the first failure stops everything.
//! Captured output is written back into the project variables so that later
//! hooks and template compilation observe it.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use anyhow::Context;
use tracing::{debug, error};

use super::flags::FlagFilter;
use super::resolver::{ExecTarget, ResolvedHook};
use crate::error::ComposeError;
use crate::executor::{
    Capture, CommandOutcome, CommandRequest, CommandRunner, Executor, ExecutorFactory,
    ExecutorKey, connect_executor,
};
use crate::specs::{Group, HOST, Hook, Node, Project, VarLayers};

/// Project state a hook list runs against.
#[derive(Debug)]
pub struct HookScope<'a> {
    pub groups: &'a [Group],
    pub vars: &'a mut VarLayers,
    /// Node names a fan-out hook expands to.
    pub fanout: &'a [String],
}

impl<'a> HookScope<'a> {
    pub fn new(groups: &'a [Group], vars: &'a mut VarLayers, fanout: &'a [String]) -> Self {
        Self {
            groups,
            vars,
            fanout,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Place<'a> {
    Host,
    Node { group: &'a Group, node: &'a Node },
}

/// Runs resolved hooks, caching one executor per connection.
pub struct HookRunner<'f> {
    factory: &'f dyn ExecutorFactory,
    flags: FlagFilter,
    host: Box<dyn CommandRunner>,
    executors: HashMap<ExecutorKey, Box<dyn Executor>>,
}

impl<'f> HookRunner<'f> {
    pub fn new(factory: &'f dyn ExecutorFactory, flags: FlagFilter) -> Self {
        Self {
            factory,
            flags,
            host: factory.host(),
            executors: HashMap::new(),
        }
    }

    /// Executor for a connection, set up on first use.
    pub fn executor(&mut self, key: &ExecutorKey) -> anyhow::Result<&dyn Executor> {
        let executor = match self.executors.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("Connecting executor for '{}'", key.connection);
                entry.insert(connect_executor(self.factory, key)?)
            }
        };
        Ok(&**executor)
    }

    pub fn process(&mut self, hooks: &[ResolvedHook], scope: &mut HookScope<'_>) -> anyhow::Result<()> {
        let groups = scope.groups;
        for resolved in hooks {
            let hook = &resolved.hook;
            if !self.flags.should_run(&hook.flags) {
                debug!(
                    "Skipped hook for event {} on '{}' (flags: {:?})",
                    hook.event, hook.node, hook.flags
                );
                continue;
            }

            let targets = places(resolved, groups, scope.fanout)?;
            for command in &hook.commands {
                for place in &targets {
                    self.run(hook, *place, command, scope.vars)?;
                }
            }
        }
        Ok(())
    }

    fn run(&mut self, hook: &Hook, place: Place<'_>, command: &str, vars: &mut VarLayers) -> anyhow::Result<()> {
        let mut envs = vars.env_map();
        envs.entry("HOME".to_string())
            .or_insert_with(|| "/".to_string());
        let capture = Capture {
            stdout: !hook.out2var.is_empty(),
            stderr: !hook.err2var.is_empty(),
        };

        let (target, outcome) = match place {
            Place::Host => {
                let request = CommandRequest {
                    target: HOST.to_string(),
                    command: command.to_string(),
                    envs,
                    entrypoint: hook.entrypoint.clone(),
                    uid: hook.uid,
                    gid: hook.gid,
                    cwd: hook.cwd.clone(),
                    capture,
                };
                (HOST.to_string(), self.host.run_command(&request)?)
            }
            Place::Node { group, node } => {
                let name = node.get_name();
                envs.insert("node".to_string(), node.to_json()?);
                envs.extend(node.labels.iter().map(|(k, v)| (k.clone(), v.clone())));

                let entrypoint = if hook.entrypoint.is_empty() {
                    node.entrypoint.clone()
                } else {
                    hook.entrypoint.clone()
                };
                let request = CommandRequest {
                    target: name.clone(),
                    command: command.to_string(),
                    envs,
                    entrypoint,
                    uid: hook.uid,
                    gid: hook.gid,
                    cwd: hook.cwd.clone(),
                    capture,
                };
                let key = ExecutorKey::new(&group.connection, group.ephemeral);
                let outcome = self
                    .executor(&key)?
                    .run_command(&request)
                    .with_context(|| format!("Failed to run hook command on node {name}"))?;
                (name, outcome)
            }
        };

        store_output(hook, &target, command, outcome, vars)
    }
}

fn store_output(
    hook: &Hook,
    target: &str,
    command: &str,
    outcome: CommandOutcome,
    vars: &mut VarLayers,
) -> anyhow::Result<()> {
    if outcome.exit_code != 0 {
        error!(
            "Command on {target} exited with code {} for event {}",
            outcome.exit_code, hook.event
        );
        return Err(ComposeError::CommandFailed {
            command: command.to_string(),
            target: target.to_string(),
            exit_code: outcome.exit_code,
        }
        .into());
    }
    if !hook.out2var.is_empty() {
        vars.capture(&hook.out2var, outcome.stdout);
    }
    if !hook.err2var.is_empty() {
        vars.capture(&hook.err2var, outcome.stderr);
    }
    Ok(())
}

fn places<'a>(resolved: &ResolvedHook, groups: &'a [Group], fanout: &[String]) -> anyhow::Result<Vec<Place<'a>>> {
    let lookup = |name: &str| -> anyhow::Result<Place<'a>> {
        find_node(groups, name)
            .map(|(group, node)| Place::Node { group, node })
            .ok_or_else(|| {
                ComposeError::UnknownHookTarget {
                    event: resolved.hook.event.clone(),
                    node: name.to_string(),
                }
                .into()
            })
    };

    match &resolved.target {
        ExecTarget::Host => Ok(vec![Place::Host]),
        ExecTarget::Node(name) => Ok(vec![lookup(name)?]),
        ExecTarget::Fanout => fanout.iter().map(|name| lookup(name)).collect(),
    }
}

fn find_node<'a>(groups: &'a [Group], name: &str) -> Option<(&'a Group, &'a Node)> {
    groups.iter().find_map(|g| {
        g.nodes
            .iter()
            .find(|n| n.get_name() == name)
            .map(|n| (g, n))
    })
}

/// Run already resolved hooks against a project.
///
/// Fan-out hooks expand to every node of the project.
pub fn process_hooks(
    factory: &dyn ExecutorFactory,
    flags: &FlagFilter,
    project: &mut Project,
    hooks: &[ResolvedHook],
) -> anyhow::Result<()> {
    let fanout = project.node_names();
    let mut runner = HookRunner::new(factory, flags.clone());
    let mut scope = HookScope::new(&project.groups, &mut project.vars, &fanout);
    runner.process(hooks, &mut scope)
}
