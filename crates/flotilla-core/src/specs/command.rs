//! Reusable, named apply/destroy invocations declared in an environment.

use serde::{Deserialize, Serialize};

use crate::deploy::{ApplyOptions, DestroyOptions};
use crate::specs::{Project, VarLayer};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub project: String,

    /// Only commands usable as an apply alias are supported.
    #[serde(default = "default_apply_alias")]
    pub apply_alias: bool,

    #[serde(default)]
    pub envs: VarLayer,

    #[serde(default)]
    pub vars_files: Vec<String>,

    #[serde(default)]
    pub enable_flags: Vec<String>,

    #[serde(default)]
    pub disable_flags: Vec<String>,

    #[serde(default)]
    pub enable_groups: Vec<String>,

    #[serde(default)]
    pub disable_groups: Vec<String>,

    #[serde(default)]
    pub skip_sync: bool,

    #[serde(default)]
    pub nodes_prefix: String,

    #[serde(default)]
    pub upgrade: bool,

    /// Destroy the project once the apply is done.
    #[serde(default)]
    pub destroy: bool,
}

fn default_apply_alias() -> bool {
    true
}

impl CommandSpec {
    /// Append the command's variable files and inline envs to the project.
    ///
    /// Relative var files resolve against `base_dir`.
    pub fn prepare_project(&self, project: &mut Project, base_dir: &std::path::Path) -> anyhow::Result<()> {
        for file in &self.vars_files {
            let path = base_dir.join(file);
            project.add_vars(VarLayer::from_file(&path)?);
        }
        if !self.envs.envs.is_empty() {
            project.add_vars(self.envs.clone());
        }
        Ok(())
    }

    pub fn apply_options(&self) -> ApplyOptions {
        let mut opts = ApplyOptions::default()
            .with_flags_enabled(self.enable_flags.clone())
            .with_flags_disabled(self.disable_flags.clone())
            .with_groups_enabled(self.enable_groups.clone())
            .with_groups_disabled(self.disable_groups.clone())
            .with_skip_sync(self.skip_sync)
            .with_upgrade(self.upgrade);
        if !self.nodes_prefix.is_empty() {
            opts = opts.with_nodes_prefix(self.nodes_prefix.clone());
        }
        opts
    }

    pub fn destroy_options(&self) -> DestroyOptions {
        let mut opts = DestroyOptions::default()
            .with_flags_enabled(self.enable_flags.clone())
            .with_flags_disabled(self.disable_flags.clone())
            .with_groups_enabled(self.enable_groups.clone())
            .with_groups_disabled(self.disable_groups.clone());
        if !self.nodes_prefix.is_empty() {
            opts = opts.with_nodes_prefix(self.nodes_prefix.clone());
        }
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prepare_project_appends_inline_envs_last() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("extra.yml"), "envs:\n  a: from-file\n  b: file\n").unwrap();

        let mut cmd = CommandSpec {
            name: "deploy-dev".into(),
            project: "p1".into(),
            vars_files: vec!["extra.yml".into()],
            ..Default::default()
        };
        cmd.envs.insert("a", "inline");

        let mut project = Project::new("p1");
        cmd.prepare_project(&mut project, temp.path()).unwrap();

        let merged = project.vars.merged();
        assert_eq!(project.vars.len(), 2);
        assert_eq!(merged["a"], json!("inline"));
        assert_eq!(merged["b"], json!("file"));
    }

    #[test]
    fn apply_options_carry_filters() {
        let cmd = CommandSpec {
            name: "c".into(),
            project: "p1".into(),
            enable_flags: vec!["setup".into()],
            disable_groups: vec!["db".into()],
            nodes_prefix: "ci".into(),
            upgrade: true,
            ..Default::default()
        };
        let opts = cmd.apply_options();
        assert_eq!(opts.flags.enabled(), ["setup".to_string()]);
        assert_eq!(opts.groups.disabled(), ["db".to_string()]);
        assert_eq!(opts.nodes_prefix.as_deref(), Some("ci"));
        assert!(opts.upgrade);
        assert!(!opts.skip_sync);
    }
}
