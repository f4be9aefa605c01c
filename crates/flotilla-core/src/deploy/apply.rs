//! Apply pipeline.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info};

use super::profiles::{required_profiles, validate_profiles};
use super::{ApplyOptions, Confirmer, GroupFilter, Orchestrator, run_hooks};
use crate::error::ComposeError;
use crate::executor::{CreateInstance, ExecutorKey};
use crate::hooks::resolver::{group_stage_hooks, host_hooks, node_stage_hooks, project_stage_hooks};
use crate::hooks::{HookRunner, ResolvedHook};
use crate::specs::{Environment, Group, Node, Project, events};
use crate::template::{
    TemplateCompiler, compile_group_files, compile_node_files, compile_project_files, project_vars,
};

pub(super) struct ApplyRun<'r> {
    runner: HookRunner<'r>,
    compiler: Box<dyn TemplateCompiler>,
    confirmer: &'r dyn Confirmer,
    opts: &'r ApplyOptions,
    base_dir: PathBuf,
}

impl<'r> ApplyRun<'r> {
    pub(super) fn new(orch: &Orchestrator<'r>, env: &Environment, opts: &'r ApplyOptions) -> anyhow::Result<Self> {
        let base_dir = env.base_dir()?;
        let compiler = orch.engines.compiler(&env.template_engine, &base_dir)?;
        Ok(Self {
            runner: HookRunner::new(orch.factory, opts.flags.clone()),
            compiler,
            confirmer: orch.confirmer,
            opts,
            base_dir,
        })
    }

    pub(super) fn run(mut self, project: &mut Project) -> anyhow::Result<()> {
        if let Some(prefix) = &self.opts.nodes_prefix {
            project.set_nodes_prefix(prefix);
        }
        info!("Applying project {}", project.name);

        let active = active_nodes(project, &self.opts.groups);

        let hooks = host_hooks(&project.hooks, events::PRE_PROJECT);
        self.hooks(project, &hooks, &active)?;

        self.refresh_vars(project);
        compile_project_files(self.compiler.as_ref(), project, &self.base_dir, &[])?;

        for group in project.groups.clone() {
            if !self.opts.groups.includes(&group) {
                debug!("Skipping group {}", group.name);
                continue;
            }
            self.apply_group(project, &group)
                .with_context(|| format!("Failed to apply group {}", group.name))?;
        }

        let hooks = project_stage_hooks(project, events::POST_PROJECT, &active);
        self.hooks(project, &hooks, &active)?;

        info!("Project {} applied", project.name);
        Ok(())
    }

    fn hooks(&mut self, project: &mut Project, hooks: &[ResolvedHook], fanout: &[String]) -> anyhow::Result<()> {
        run_hooks(&mut self.runner, project, hooks, fanout)
    }

    /// Pick up variables captured by the hooks that just ran.
    fn refresh_vars(&mut self, project: &Project) {
        self.compiler.init_vars(project_vars(project, &self.base_dir));
    }

    fn apply_group(&mut self, project: &mut Project, group: &Group) -> anyhow::Result<()> {
        info!("Applying group {}", group.name);
        let members = group.node_names();

        let hooks = group_stage_hooks(project, group, events::PRE_GROUP);
        self.hooks(project, &hooks, &members)?;

        self.refresh_vars(project);
        compile_group_files(self.compiler.as_ref(), group, &self.base_dir, &[])?;

        let key = ExecutorKey::new(&group.connection, group.ephemeral);
        let available = self
            .runner
            .executor(&key)?
            .profiles()
            .with_context(|| format!("Failed to list profiles of connection '{}'", group.connection))?;

        for node in &group.nodes {
            self.apply_node(project, group, node, &key, &available)
                .with_context(|| format!("Failed to apply node {}", node.get_name()))?;
        }

        let hooks = group_stage_hooks(project, group, events::POST_GROUP);
        self.hooks(project, &hooks, &members)
    }

    fn apply_node(
        &mut self,
        project: &mut Project,
        group: &Group,
        node: &Node,
        key: &ExecutorKey,
        available: &[String],
    ) -> anyhow::Result<()> {
        let name = node.get_name();
        let present = self.runner.executor(key)?.is_present_instance(&name)?;

        if !present {
            validate_profiles(&name, available, &required_profiles(group, node))?;
            self.node_hooks(project, group, node, events::PRE_NODE_CREATION)?;
            self.create_instance(group, node, key)?;
            self.node_hooks(project, group, node, events::POST_NODE_CREATION)?;
        } else if self.opts.upgrade {
            self.upgrade_node(project, group, node, key, available)?;
        } else {
            let executor = self.runner.executor(key)?;
            if executor.is_running_instance(&name)? {
                debug!("Node {name} is already running");
            } else {
                info!("Starting node {name}");
                executor.start_instance(&name)?;
            }
        }

        self.sync_node(project, group, node, key)
    }

    fn upgrade_node(
        &mut self,
        project: &mut Project,
        group: &Group,
        node: &Node,
        key: &ExecutorKey,
        available: &[String],
    ) -> anyhow::Result<()> {
        let name = node.get_name();
        if self.opts.ask {
            let prompt = format!("Node {name} will be destroyed and recreated. Continue?");
            if !self.confirmer.confirm(&prompt)? {
                return Err(ComposeError::UpgradeDeclined { node: name }.into());
            }
        }
        validate_profiles(&name, available, &required_profiles(group, node))?;

        if self.runner.executor(key)?.is_running_instance(&name)? {
            self.node_hooks(project, group, node, events::PRE_NODE_UPGRADE)?;
        }

        info!("Upgrading node {name}");
        self.runner.executor(key)?.delete_instance(&name)?;
        self.create_instance(group, node, key)?;

        self.node_hooks(project, group, node, events::POST_NODE_UPGRADE)
    }

    fn create_instance(&mut self, group: &Group, node: &Node, key: &ExecutorKey) -> anyhow::Result<()> {
        let name = node.get_name();
        let request = CreateInstance {
            name: name.clone(),
            image_source: node.image_source.clone(),
            image_remote: node.image_remote_server.clone(),
            profiles: required_profiles(group, node),
            config: node.instance_config(&group.config),
        };

        info!("Creating node {name} from {}", node.image_source);
        let executor = self.runner.executor(key)?;
        executor.create_instance(&request)?;
        if node.wait_ip > 0 {
            debug!("Waiting up to {}s for an address on {name}", node.wait_ip);
            executor.wait_ip(&name, Duration::from_secs(node.wait_ip))?;
        }
        Ok(())
    }

    fn sync_node(&mut self, project: &mut Project, group: &Group, node: &Node, key: &ExecutorKey) -> anyhow::Result<()> {
        let name = node.get_name();
        self.node_hooks(project, group, node, events::PRE_NODE_SYNC)?;

        self.refresh_vars(project);
        compile_node_files(self.compiler.as_mut(), node, &self.base_dir, &[])?;

        if self.opts.skip_sync {
            debug!("[{name}] Sync skipped");
        } else if !node.sync_resources.is_empty() {
            let source_dir = node.source_base_dir(&self.base_dir);
            debug!("[{name}] Using sync source basedir {}", source_dir.display());

            let total = node.sync_resources.len();
            info!("[{name}] Syncing {total} resources...");
            let executor = self.runner.executor(key)?;
            for (idx, resource) in node.sync_resources.iter().enumerate() {
                debug!("[{name}] {} => {}", resource.source, resource.destination);
                executor
                    .push_resource(&name, &source_dir.join(&resource.source), &resource.destination)
                    .with_context(|| format!("Failed to sync {} to node {name}", resource.source))?;
                info!("[{name}] - [{:2}/{:2}] {}", idx + 1, total, resource.destination);
            }
        }

        self.node_hooks(project, group, node, events::POST_NODE_SYNC)
    }

    fn node_hooks(&mut self, project: &mut Project, group: &Group, node: &Node, event: &str) -> anyhow::Result<()> {
        let hooks = node_stage_hooks(project, group, node, event);
        self.hooks(project, &hooks, &[])
    }
}

/// Nodes of the groups selected for this run.
fn active_nodes(project: &Project, groups: &GroupFilter) -> Vec<String> {
    project
        .groups
        .iter()
        .filter(|g| groups.includes(g))
        .flat_map(Group::node_names)
        .collect()
}
