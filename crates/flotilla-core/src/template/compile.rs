//! Compilation of the config templates declared at each level of a project.

use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tracing::debug;

use super::{TemplateCompiler, compiler_for};
use crate::error::ComposeError;
use crate::loader::Inventory;
use crate::specs::{ConfigTemplate, Group, Node, Project, VarMap};

/// Variable snapshot for a project: merged layers plus `project` and `env_base_dir`.
pub fn project_vars(project: &Project, env_base_dir: &Path) -> VarMap {
    let mut vars = project.vars.merged();
    vars.insert("project".to_string(), Value::String(project.name.clone()));
    vars.insert(
        "env_base_dir".to_string(),
        Value::String(env_base_dir.display().to_string()),
    );
    vars
}

fn compile_targets(
    compiler: &dyn TemplateCompiler,
    templates: &[ConfigTemplate],
    base_dir: &Path,
    sources_filter: &[String],
) -> anyhow::Result<usize> {
    let mut compiled = 0;
    for template in templates {
        if !sources_filter.is_empty()
            && !sources_filter.iter().any(|prefix| template.source.starts_with(prefix.as_str()))
        {
            debug!("Skipping template {} (filtered out)", template.source);
            continue;
        }
        compiler.compile(
            &base_dir.join(&template.source),
            &base_dir.join(&template.destination),
        )?;
        compiled += 1;
    }
    Ok(compiled)
}

pub fn compile_project_files(
    compiler: &dyn TemplateCompiler,
    project: &Project,
    env_base_dir: &Path,
    sources_filter: &[String],
) -> anyhow::Result<usize> {
    compile_targets(compiler, &project.config_templates, env_base_dir, sources_filter)
        .with_context(|| format!("Failed to compile templates of project {}", project.name))
}

pub fn compile_group_files(
    compiler: &dyn TemplateCompiler,
    group: &Group,
    env_base_dir: &Path,
    sources_filter: &[String],
) -> anyhow::Result<usize> {
    compile_targets(compiler, &group.config_templates, env_base_dir, sources_filter)
        .with_context(|| format!("Failed to compile templates of group {}", group.name))
}

/// Node templates see the node itself as `node`.
pub fn compile_node_files(
    compiler: &mut dyn TemplateCompiler,
    node: &Node,
    env_base_dir: &Path,
    sources_filter: &[String],
) -> anyhow::Result<usize> {
    if node.config_templates.is_empty() {
        return Ok(0);
    }
    let value = serde_json::to_value(node)
        .with_context(|| format!("Failed to convert node {} to json", node.name))?;
    compiler.vars_mut().insert("node".to_string(), value);

    let base = node.source_base_dir(env_base_dir);
    let result = compile_targets(compiler, &node.config_templates, &base, sources_filter)
        .with_context(|| format!("Failed to compile templates of node {}", node.get_name()));
    // Group templates compiled afterwards must not see this node.
    compiler.vars_mut().remove("node");
    result
}

/// Compile every template of a project without touching any instance.
pub fn compile_project(inventory: &Inventory, project_name: &str, sources_filter: &[String]) -> anyhow::Result<usize> {
    let env = inventory
        .environment_for_project(project_name)
        .ok_or_else(|| ComposeError::ProjectNotFound(project_name.to_string()))?;
    let project = env
        .project(project_name)
        .ok_or_else(|| ComposeError::ProjectNotFound(project_name.to_string()))?;
    let base = env.base_dir()?;

    let mut compiler = compiler_for(&env.template_engine, &base)?;
    compiler.init_vars(project_vars(project, &base));

    let mut compiled = compile_project_files(compiler.as_ref(), project, &base, sources_filter)?;
    for group in &project.groups {
        compiled += compile_group_files(compiler.as_ref(), group, &base, sources_filter)?;
        for node in &group.nodes {
            compiled += compile_node_files(compiler.as_mut(), node, &base, sources_filter)?;
        }
    }
    Ok(compiled)
}
