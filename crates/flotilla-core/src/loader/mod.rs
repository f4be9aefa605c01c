//! Environment discovery and lookup.
//!
//! Every `.yml`/`.yaml` file found directly inside a configured environment
//! directory is an [`Environment`]. Include files referenced by projects are
//! merged in at load time and node prefixes are propagated before anything
//! else sees the tree.

mod includes;
mod validate;

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::specs::{CommandSpec, Environment, Project};

pub use validate::ValidationReport;

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    environments: Vec<Environment>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every environment file of the given directories.
    ///
    /// Directories that cannot be read are skipped; files that fail to parse
    /// are errors.
    pub fn load_dirs<P: AsRef<Path>>(dirs: &[P]) -> anyhow::Result<Self> {
        if dirs.is_empty() {
            anyhow::bail!("No environment directories configured");
        }

        let mut inventory = Self::new();
        for dir in dirs {
            let dir = dir.as_ref();
            debug!("Checking directory {}", dir.display());
            for file in environment_files(dir) {
                inventory.load_file(&file)?;
            }
        }
        Ok(inventory)
    }

    pub fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read environment file: {}", path.display()))?;
        let env = Environment::from_yaml(&content, path)?;
        self.add_environment(env)
    }

    /// Resolve includes and prefixes, then register the environment.
    pub fn add_environment(&mut self, mut env: Environment) -> anyhow::Result<()> {
        includes::load_includes(&mut env)?;
        apply_prefixes(&mut env);
        debug!("Loaded environment file {}", env.file.display());
        self.environments.push(env);
        Ok(())
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    pub fn environment_for_project(&self, name: &str) -> Option<&Environment> {
        self.environments
            .iter()
            .find(|env| env.project(name).is_some())
    }

    pub fn environment_for_project_mut(&mut self, name: &str) -> Option<&mut Environment> {
        self.environments
            .iter_mut()
            .find(|env| env.project(name).is_some())
    }

    pub fn project(&self, name: &str) -> Option<&Project> {
        self.environments.iter().find_map(|env| env.project(name))
    }

    pub fn project_mut(&mut self, name: &str) -> Option<&mut Project> {
        self.environments
            .iter_mut()
            .find_map(|env| env.project_mut(name))
    }

    pub fn project_names(&self) -> Vec<String> {
        self.environments
            .iter()
            .flat_map(|env| env.projects.iter().map(|p| p.name.clone()))
            .collect()
    }

    pub fn find_command(&self, name: &str) -> Option<(&Environment, &CommandSpec)> {
        self.environments
            .iter()
            .find_map(|env| env.command(name).map(|cmd| (env, cmd)))
    }
}

/// Environment files directly inside `dir`, sorted by name.
fn environment_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("yml" | "yaml")
            )
        })
        .collect();
    files.sort();
    files
}

/// Group prefixes first, then the project prefix for groups without one.
fn apply_prefixes(env: &mut Environment) {
    for project in &mut env.projects {
        for group in &mut project.groups {
            if !group.nodes_prefix.is_empty() {
                let prefix = group.nodes_prefix.clone();
                group.set_nodes_prefix(&prefix);
            }
        }
        if !project.nodes_prefix.is_empty() {
            let prefix = project.nodes_prefix.clone();
            project.set_nodes_prefix(&prefix);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ENV: &str = r#"
version: "1"
projects:
  - name: p1
    nodes_prefix: dev
    groups:
      - name: g1
        connection: local
        nodes:
          - name: n1
          - name: n2
            name_prefix: "-"
      - name: g2
        nodes_prefix: ci
        nodes:
          - name: n3
commands:
  - name: deploy-p1
    project: p1
"#;

    #[test]
    fn load_dirs_reads_only_yaml_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("env.yml"), ENV).unwrap();
        std::fs::write(temp.path().join("notes.txt"), "not yaml: [").unwrap();
        std::fs::create_dir(temp.path().join("nested.yml")).unwrap();

        let inventory = Inventory::load_dirs(&[temp.path()]).unwrap();
        assert_eq!(inventory.environments().len(), 1);
        assert_eq!(inventory.project_names(), vec!["p1"]);
    }

    #[test]
    fn missing_directories_are_skipped() {
        let temp = TempDir::new().unwrap();
        let inventory = Inventory::load_dirs(&[temp.path().join("absent")]).unwrap();
        assert!(inventory.environments().is_empty());
    }

    #[test]
    fn unparsable_environment_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("broken.yml"), "projects: {{").unwrap();
        assert!(Inventory::load_dirs(&[temp.path()]).is_err());
    }

    #[test]
    fn prefixes_propagate_at_load() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("env.yaml"), ENV).unwrap();
        let inventory = Inventory::load_dirs(&[temp.path()]).unwrap();

        let project = inventory.project("p1").unwrap();
        assert_eq!(project.node_names(), vec!["dev-n1", "n2", "ci-n3"]);
    }

    #[test]
    fn lookups_by_project_and_command() {
        let mut inventory = Inventory::new();
        inventory
            .add_environment(Environment::from_yaml(ENV, "/tmp/flotilla-env.yml").unwrap())
            .unwrap();

        assert!(inventory.environment_for_project("p1").is_some());
        assert!(inventory.project("p2").is_none());
        let (env, cmd) = inventory.find_command("deploy-p1").unwrap();
        assert_eq!(cmd.project, "p1");
        assert_eq!(env.file, PathBuf::from("/tmp/flotilla-env.yml"));
    }
}
