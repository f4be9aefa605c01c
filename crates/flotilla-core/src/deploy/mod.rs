//! Lifecycle orchestration: apply and destroy a project.
//!
//! Projects, groups and nodes are processed one at a time in declaration
//! order. The first failure aborts the project; nothing already done is
//! rolled back.

mod apply;
mod destroy;
pub mod options;
pub mod profiles;

use anyhow::Context;
use tracing::error;

use crate::error::ComposeError;
use crate::executor::ExecutorFactory;
use crate::hooks::{FlagFilter, HookRunner, HookScope, ResolvedHook};
use crate::loader::Inventory;
use crate::specs::{CommandSpec, Environment, Project};
use crate::template::CompilerFactory;

pub use options::{ApplyOptions, DestroyOptions, GroupFilter};
pub use profiles::{required_profiles, validate_profiles};

/// Asks the operator before a destructive step.
pub trait Confirmer {
    fn confirm(&self, prompt: &str) -> anyhow::Result<bool>;
}

/// Confirmer for unattended runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&self, _prompt: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}

pub struct Orchestrator<'a> {
    factory: &'a dyn ExecutorFactory,
    engines: &'a dyn CompilerFactory,
    confirmer: &'a dyn Confirmer,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        factory: &'a dyn ExecutorFactory,
        engines: &'a dyn CompilerFactory,
        confirmer: &'a dyn Confirmer,
    ) -> Self {
        Self {
            factory,
            engines,
            confirmer,
        }
    }

    /// Bring every instance of a project to its declared state.
    pub fn apply(&self, inventory: &mut Inventory, project: &str, opts: &ApplyOptions) -> anyhow::Result<()> {
        let env = find_environment(inventory, project)?;
        let run = apply::ApplyRun::new(self, env, opts)?;
        let target = env
            .project_mut(project)
            .ok_or_else(|| ComposeError::ProjectNotFound(project.to_string()))?;
        run.run(target)
    }

    /// Remove every instance of a project.
    pub fn destroy(&self, inventory: &mut Inventory, project: &str, opts: &DestroyOptions) -> anyhow::Result<()> {
        let target = find_environment(inventory, project)?
            .project_mut(project)
            .ok_or_else(|| ComposeError::ProjectNotFound(project.to_string()))?;
        destroy::destroy_project(self.factory, target, opts)
    }

    /// Apply the project of a named command.
    ///
    /// With `destroy` set the project is destroyed afterwards, even when the
    /// apply failed. A failing destroy is logged, not returned.
    pub fn run_command(&self, inventory: &mut Inventory, cmd: &CommandSpec, ask: bool) -> anyhow::Result<()> {
        let opts = cmd.apply_options().with_ask(ask);
        let applied = self.apply(inventory, &cmd.project, &opts);

        if cmd.destroy
            && let Err(err) = self.destroy(inventory, &cmd.project, &cmd.destroy_options())
        {
            error!("Error on destroy project {}: {err:#}", cmd.project);
        }
        applied.with_context(|| format!("Error on apply project {}", cmd.project))
    }

    /// Run already resolved hooks against a project outside a pipeline.
    pub fn process_hooks(&self, project: &mut Project, hooks: &[ResolvedHook], flags: &FlagFilter) -> anyhow::Result<()> {
        crate::hooks::process_hooks(self.factory, flags, project, hooks)
    }
}

fn find_environment<'i>(inventory: &'i mut Inventory, project: &str) -> anyhow::Result<&'i mut Environment> {
    inventory
        .environment_for_project_mut(project)
        .ok_or_else(|| ComposeError::ProjectNotFound(project.to_string()).into())
}

fn run_hooks(
    runner: &mut HookRunner<'_>,
    project: &mut Project,
    hooks: &[ResolvedHook],
    fanout: &[String],
) -> anyhow::Result<()> {
    if hooks.is_empty() {
        return Ok(());
    }
    let mut scope = HookScope::new(&project.groups, &mut project.vars, fanout);
    runner.process(hooks, &mut scope)
}
