//! Environment loading, validation and template compilation from disk.

mod support;

use std::fs;
use std::path::Path;

use flotilla_core::deploy::{AssumeYes, Orchestrator};
use flotilla_core::error::ComposeError;
use flotilla_core::loader::Inventory;
use flotilla_core::specs::HookTarget;
use flotilla_core::template::compile_project;
use serde_json::json;
use support::{FakeRemote, RecordingEngines};
use tempfile::TempDir;

const ENV_FILE: &str = r#"
version: "1"
template_engine:
  engine: handlebars
projects:
  - name: web
    include_groups_files: [groups/frontend.yml, groups/missing.yml]
    include_env_files: [vars/common.yml]
    include_hooks_files: [hooks/web.yml]
    vars:
      - envs:
          domain: example.org
    config_templates:
      - source: templates/project.conf
        dst: out/project.conf
    groups:
      - name: backend
        nodes_prefix: be
        nodes:
          - name: api
            config_templates:
              - source: api.conf.tmpl
                dst: api.conf
            source_dir: nodes/api
commands:
  - name: deploy-canary
    project: web
    enable_groups: [frontend]
    nodes_prefix: canary
    vars_files: [vars/canary.yml]
    envs:
      envs:
        release: "2"
"#;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn seed(dir: &Path) {
    write(dir, "web.yml", ENV_FILE);
    write(
        dir,
        "groups/frontend.yml",
        "name: frontend\nconnection: local\nconfig_templates:\n  - source: templates/frontend.conf\n    dst: out/frontend.conf\nnodes:\n  - name: fe1\n",
    );
    write(dir, "vars/common.yml", "envs:\n  domain: override.org\n  replicas: 3\n");
    write(dir, "vars/canary.yml", "envs:\n  release: \"1\"\n  channel: canary\n");
    write(
        dir,
        "hooks/web.yml",
        "hooks:\n  - event: pre-project\n    node: host\n    commands: [\"echo included\"]\n",
    );
    write(dir, "templates/project.conf", "domain={{domain}} replicas={{replicas}}\n");
    write(dir, "templates/frontend.conf", "node=[{{node.name}}]\n");
    write(
        dir,
        "nodes/api/api.conf.tmpl",
        "name={{node.name}} project={{project}} <{{domain}}>\n",
    );
    write(dir, "notes.txt", "not an environment");
}

#[test]
fn load_dirs_resolves_includes_and_prefixes() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());

    let inv = Inventory::load_dirs(&[temp.path()]).unwrap();
    assert_eq!(inv.environments().len(), 1);
    assert_eq!(inv.project_names(), vec!["web".to_string()]);

    let project = inv.project("web").unwrap();
    let groups: Vec<&str> = project.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(groups, vec!["backend", "frontend"]);
    assert_eq!(project.node_names(), vec!["be-api".to_string(), "fe1".to_string()]);

    let vars = project.vars.merged();
    assert_eq!(vars["domain"], json!("override.org"));
    assert_eq!(vars["replicas"], json!(3));

    assert_eq!(project.hooks.len(), 1);
    assert_eq!(project.hooks[0].node, HookTarget::Host);
}

#[test]
fn unreadable_dirs_are_skipped_and_bad_files_fail() {
    let temp = TempDir::new().unwrap();
    let inv = Inventory::load_dirs(&[temp.path().join("absent")]).unwrap();
    assert!(inv.environments().is_empty());

    write(temp.path(), "broken.yaml", "projects: [");
    assert!(Inventory::load_dirs(&[temp.path()]).is_err());

    let none: [&Path; 0] = [];
    assert!(Inventory::load_dirs(&none).is_err());
}

#[test]
fn compile_project_renders_every_level() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());
    let inv = Inventory::load_dirs(&[temp.path()]).unwrap();

    let compiled = compile_project(&inv, "web", &[]).unwrap();
    assert_eq!(compiled, 3);

    let project_conf = fs::read_to_string(temp.path().join("out/project.conf")).unwrap();
    assert_eq!(project_conf, "domain=override.org replicas=3\n");

    // Node templates resolve against the node's source directory.
    let api_conf = fs::read_to_string(temp.path().join("nodes/api/api.conf")).unwrap();
    assert_eq!(api_conf, "name=api project=web <override.org>\n");

    // The frontend group follows backend, whose node must not leak into it.
    let frontend_conf = fs::read_to_string(temp.path().join("out/frontend.conf")).unwrap();
    assert_eq!(frontend_conf, "node=[]\n");
}

#[test]
fn compile_project_honours_source_filter() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());
    let inv = Inventory::load_dirs(&[temp.path()]).unwrap();

    let compiled = compile_project(&inv, "web", &["api.conf.tmpl".to_string()]).unwrap();
    assert_eq!(compiled, 1);
    assert!(!temp.path().join("out/project.conf").exists());
    assert!(temp.path().join("nodes/api/api.conf").exists());

    // Filters match source prefixes, so a directory selects everything below it.
    let compiled = compile_project(&inv, "web", &["templates/".to_string()]).unwrap();
    assert_eq!(compiled, 2);
    assert!(temp.path().join("out/project.conf").exists());
    assert!(temp.path().join("out/frontend.conf").exists());

    let err = compile_project(&inv, "nope", &[]).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ComposeError>(),
        Some(&ComposeError::ProjectNotFound("nope".into()))
    );
}

#[test]
fn validation_reports_duplicates_across_files() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());
    write(
        temp.path(),
        "zz-copy.yml",
        r#"
projects:
  - name: web
    hooks:
      - event: pre-project
        node: n1
        commands: ["bad target"]
    groups:
      - name: frontend
        hooks:
          - event: post-project
            commands: ["bad event"]
        nodes:
          - name: fe1
commands:
  - name: deploy-canary
    project: web
"#,
    );
    let inv = Inventory::load_dirs(&[temp.path()]).unwrap();

    assert!(inv.validate(false).is_err());

    let report = inv.validate(true).unwrap();
    assert!(!report.is_clean());
    assert_eq!(report.duplicated_projects, 1);
    assert_eq!(report.duplicated_groups, 1);
    assert_eq!(report.duplicated_nodes, 1);
    assert_eq!(report.duplicated_commands, 1);
    assert_eq!(report.invalid_hooks, 2);
}

#[test]
fn clean_environment_validates() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());
    let inv = Inventory::load_dirs(&[temp.path()]).unwrap();

    let report = inv.validate(false).unwrap();
    assert!(report.is_clean());
}

#[test]
fn named_command_prepares_project_and_options() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());
    let mut inv = Inventory::load_dirs(&[temp.path()]).unwrap();

    let (env, cmd) = inv.find_command("deploy-canary").unwrap();
    let cmd = cmd.clone();
    let base = env.base_dir().unwrap();
    assert!(inv.find_command("unknown").is_none());

    let project = inv.project_mut(&cmd.project).unwrap();
    cmd.prepare_project(project, &base).unwrap();
    let vars = project.vars.merged();
    assert_eq!(vars["release"], json!("2"));
    assert_eq!(vars["channel"], json!("canary"));

    let opts = cmd.apply_options();
    assert_eq!(opts.nodes_prefix.as_deref(), Some("canary"));
    assert_eq!(opts.groups.enabled(), ["frontend".to_string()]);

    let remote = FakeRemote::new(&[]);
    let engines = RecordingEngines::default();
    Orchestrator::new(&remote, &engines, &AssumeYes)
        .apply(&mut inv, &cmd.project, &opts)
        .unwrap();

    // Groups with their own prefix keep it; only the enabled group is applied.
    let instances = remote.instances();
    assert!(instances.contains_key("canary-fe1"));
    assert!(!instances.contains_key("be-api"));
    assert_eq!(
        remote.executed(),
        vec![("host".to_string(), "echo included".to_string())]
    );
}
