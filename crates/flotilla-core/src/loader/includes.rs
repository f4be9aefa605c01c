//! Project include files: groups, variable layers and hooks kept in
//! separate files next to the environment.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::specs::{Environment, Group, Hook, Project, VarLayer};

#[derive(Debug, Deserialize)]
struct HooksFile {
    #[serde(default)]
    hooks: Vec<Hook>,
}

pub(super) fn load_includes(env: &mut Environment) -> anyhow::Result<()> {
    let base_dir = env.base_dir()?;
    for project in &mut env.projects {
        load_project_includes(project, &base_dir)?;
    }
    Ok(())
}

fn load_project_includes(project: &mut Project, base_dir: &Path) -> anyhow::Result<()> {
    for file in project.include_groups_files.clone() {
        if let Some(content) = read_include(&project.name, base_dir, &file)? {
            let group = Group::from_yaml(&content)
                .with_context(|| format!("Failed to load group file {file} of project {}", project.name))?;
            debug!("Project {}: added group {} from {}", project.name, group.name, file);
            project.add_group(group);
        }
    }

    for file in project.include_env_files.clone() {
        if let Some(content) = read_include(&project.name, base_dir, &file)? {
            let layer = VarLayer::from_yaml(&content)
                .with_context(|| format!("Failed to load env file {file} of project {}", project.name))?;
            debug!("Project {}: loaded variables file {}", project.name, file);
            project.add_vars(layer);
        }
    }

    for file in project.include_hooks_files.clone() {
        if let Some(content) = read_include(&project.name, base_dir, &file)? {
            let parsed: HooksFile = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to load hooks file {file} of project {}", project.name))?;
            debug!(
                "Project {}: added {} hooks from {}",
                project.name,
                parsed.hooks.len(),
                file
            );
            project.hooks.extend(parsed.hooks);
        }
    }
    Ok(())
}

/// Read an include file, or `None` when it does not exist.
fn read_include(project: &str, base_dir: &Path, file: &str) -> anyhow::Result<Option<String>> {
    let path: PathBuf = base_dir.join(file);
    if !path.exists() {
        warn!("Project {project}: included file {file} is not present");
        return Ok(None);
    }
    std::fs::read_to_string(&path)
        .map(Some)
        .with_context(|| format!("Failed to read include file: {}", path.display()))
}
