//! Destroy pipeline.
//!
//! Only nodes present on the remote are touched. Hooks of the stages that
//! follow a deletion run on the host only, since the instances are gone.

use anyhow::Context;
use tracing::{debug, info};

use super::{DestroyOptions, run_hooks};
use crate::executor::{ExecutorFactory, ExecutorKey};
use crate::hooks::resolver::{group_stage_hooks, host_hooks, node_stage_hooks};
use crate::hooks::{ExecTarget, HookRunner, ResolvedHook};
use crate::specs::{Group, Node, Project, events};

pub(super) fn destroy_project(
    factory: &dyn ExecutorFactory,
    project: &mut Project,
    opts: &DestroyOptions,
) -> anyhow::Result<()> {
    if let Some(prefix) = &opts.nodes_prefix {
        project.set_nodes_prefix(prefix);
    }
    info!("Destroying project {}", project.name);
    let mut runner = HookRunner::new(factory, opts.flags.clone());

    let hooks = host_hooks(&project.hooks, events::PRE_PROJECT_SHUTDOWN);
    run_hooks(&mut runner, project, &hooks, &[])?;

    for group in project.groups.clone() {
        if !opts.groups.includes(&group) {
            debug!("Skipping group {}", group.name);
            continue;
        }
        destroy_group(&mut runner, project, &group)
            .with_context(|| format!("Failed to destroy group {}", group.name))?;
    }

    let hooks = host_hooks(&project.hooks, events::POST_PROJECT_SHUTDOWN);
    run_hooks(&mut runner, project, &hooks, &[])?;

    info!("Project {} destroyed", project.name);
    Ok(())
}

fn destroy_group(runner: &mut HookRunner<'_>, project: &mut Project, group: &Group) -> anyhow::Result<()> {
    let key = ExecutorKey::new(&group.connection, group.ephemeral);

    let mut present: Vec<&Node> = Vec::new();
    {
        let executor = runner.executor(&key)?;
        for node in &group.nodes {
            let name = node.get_name();
            if executor.is_present_instance(&name)? {
                present.push(node);
            } else {
                debug!("Node {name} is not present, nothing to destroy");
            }
        }
    }
    let present_names: Vec<String> = present.iter().map(|n| n.get_name()).collect();

    let hooks = reachable(
        group_stage_hooks(project, group, events::PRE_GROUP_SHUTDOWN),
        &present_names,
    );
    run_hooks(runner, project, &hooks, &present_names)?;

    for node in present {
        let name = node.get_name();
        let hooks = node_stage_hooks(project, group, node, events::PRE_NODE_SHUTDOWN);
        run_hooks(runner, project, &hooks, &[])?;

        info!("Destroying node {name}");
        runner
            .executor(&key)?
            .delete_instance(&name)
            .with_context(|| format!("Failed to destroy node {name}"))?;

        let hooks = host_only(node_stage_hooks(project, group, node, events::POST_NODE_SHUTDOWN));
        run_hooks(runner, project, &hooks, &[])?;
    }

    let hooks = host_only(group_stage_hooks(project, group, events::POST_GROUP_SHUTDOWN));
    run_hooks(runner, project, &hooks, &[])
}

/// Drop hooks addressed to nodes that do not exist remotely.
fn reachable(hooks: Vec<ResolvedHook>, present: &[String]) -> Vec<ResolvedHook> {
    hooks
        .into_iter()
        .filter(|h| match &h.target {
            ExecTarget::Node(name) => present.contains(name),
            ExecTarget::Host | ExecTarget::Fanout => true,
        })
        .collect()
}

fn host_only(hooks: Vec<ResolvedHook>) -> Vec<ResolvedHook> {
    hooks
        .into_iter()
        .filter(|h| h.target == ExecTarget::Host)
        .collect()
}
