//! Consistency checks across every loaded environment.

use std::collections::HashSet;

use tracing::warn;

use super::Inventory;
use crate::error::ComposeError;
use crate::specs::{HookTarget, events};

/// Findings collected when validation runs with errors ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub duplicated_projects: usize,
    pub duplicated_groups: usize,
    pub duplicated_nodes: usize,
    pub duplicated_commands: usize,
    pub invalid_hooks: usize,
    pub invalid_commands: usize,
    pub messages: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.messages.is_empty()
    }

    fn record(&mut self, ignore_errors: bool, error: anyhow::Error) -> anyhow::Result<()> {
        if !ignore_errors {
            return Err(error);
        }
        warn!("{error}");
        self.messages.push(error.to_string());
        Ok(())
    }
}

impl Inventory {
    /// Check names for duplicates and hooks for events/targets their scope
    /// cannot honor.
    ///
    /// Fails on the first finding unless `ignore_errors` is set, in which
    /// case every finding is logged and counted.
    pub fn validate(&self, ignore_errors: bool) -> anyhow::Result<ValidationReport> {
        let mut report = ValidationReport::default();
        let mut projects = HashSet::new();
        let mut groups = HashSet::new();
        let mut nodes = HashSet::new();
        let mut commands = HashSet::new();

        for env in self.environments() {
            for cmd in &env.commands {
                if !commands.insert(cmd.name.as_str()) {
                    report.duplicated_commands += 1;
                    report.record(ignore_errors, anyhow::anyhow!("Duplicated command {}", cmd.name))?;
                }
                if cmd.project.is_empty() {
                    report.invalid_commands += 1;
                    report.record(
                        ignore_errors,
                        anyhow::anyhow!("Command {} with an empty project", cmd.name),
                    )?;
                }
                if !cmd.apply_alias {
                    report.invalid_commands += 1;
                    report.record(
                        ignore_errors,
                        anyhow::anyhow!("Command {} with apply_alias disabled is not supported", cmd.name),
                    )?;
                }
            }

            for project in &env.projects {
                if !projects.insert(project.name.as_str()) {
                    report.duplicated_projects += 1;
                    report.record(ignore_errors, anyhow::anyhow!("Duplicated project {}", project.name))?;
                }

                for hook in &project.hooks {
                    let host_only = hook.event == events::PRE_PROJECT || hook.event == events::PRE_GROUP;
                    if host_only && hook.node != HookTarget::Host {
                        report.invalid_hooks += 1;
                        report.record(
                            ignore_errors,
                            ComposeError::InvalidHook(format!(
                                "{} hook of project {} targets '{}', only host is admitted",
                                hook.event, project.name, hook.node
                            ))
                            .into(),
                        )?;
                    }
                }

                for group in &project.groups {
                    if !groups.insert(group.name.as_str()) {
                        report.duplicated_groups += 1;
                        report.record(ignore_errors, anyhow::anyhow!("Duplicated group {}", group.name))?;
                    }

                    for hook in &group.hooks {
                        if !events::GROUP_EVENTS.contains(&hook.event.as_str()) {
                            report.invalid_hooks += 1;
                            report.record(
                                ignore_errors,
                                ComposeError::InvalidHook(format!(
                                    "event {} is not allowed on group {}",
                                    hook.event, group.name
                                ))
                                .into(),
                            )?;
                        }
                    }

                    for node in &group.nodes {
                        let name = node.get_name();
                        if !nodes.insert(name.clone()) {
                            report.duplicated_nodes += 1;
                            report.record(ignore_errors, anyhow::anyhow!("Duplicated node {name}"))?;
                        }

                        for hook in &node.hooks {
                            if !matches!(hook.node, HookTarget::GroupDefault | HookTarget::Host) {
                                report.invalid_hooks += 1;
                                report.record(
                                    ignore_errors,
                                    ComposeError::InvalidHook(format!(
                                        "hook on node {name} addresses '{}'",
                                        hook.node
                                    ))
                                    .into(),
                                )?;
                            }
                            if !events::NODE_EVENTS.contains(&hook.event.as_str()) {
                                report.invalid_hooks += 1;
                                report.record(
                                    ignore_errors,
                                    ComposeError::InvalidHook(format!(
                                        "event {} is not allowed on node {name}",
                                        hook.event
                                    ))
                                    .into(),
                                )?;
                            }
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}
