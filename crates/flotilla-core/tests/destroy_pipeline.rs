//! Destroy pipeline against an in-memory remote.

mod support;

use flotilla_core::deploy::{AssumeYes, DestroyOptions, Orchestrator};
use flotilla_core::error::ComposeError;
use support::{Call, FakeRemote, RecordingEngines, inventory};
use tempfile::TempDir;

const FLEET: &str = r#"
projects:
  - name: p1
    hooks:
      - event: pre-project-shutdown
        node: host
        commands: ["drain"]
      - event: pre-project-shutdown
        node: "*"
        commands: ["never on nodes"]
      - event: post-project-shutdown
        node: host
        commands: ["cleanup"]
    groups:
      - name: web
        hooks:
          - event: pre-group-shutdown
            node: "*"
            commands: ["stop services"]
          - event: pre-group-shutdown
            node: w2
            commands: ["w2 is gone"]
          - event: post-group-shutdown
            node: host
            commands: ["group gone"]
          - event: post-group-shutdown
            node: "*"
            commands: ["unreachable"]
        nodes:
          - name: w1
            hooks:
              - event: pre-node-shutdown
                commands: ["flush"]
              - event: post-node-shutdown
                commands: ["instance deleted"]
              - event: post-node-shutdown
                node: host
                commands: ["forget w1"]
          - name: w2
"#;

fn exec(target: &str, command: &str) -> (String, String) {
    (target.to_string(), command.to_string())
}

#[test]
fn destroy_removes_only_present_nodes_in_hook_order() {
    let temp = TempDir::new().unwrap();
    let mut inv = inventory(temp.path(), FLEET);
    let remote = FakeRemote::new(&[]).with_instance("w1", true);
    let engines = RecordingEngines::default();

    Orchestrator::new(&remote, &engines, &AssumeYes)
        .destroy(&mut inv, "p1", &DestroyOptions::default())
        .unwrap();

    assert_eq!(
        remote.executed(),
        vec![
            exec("host", "drain"),
            exec("w1", "stop services"),
            exec("w1", "flush"),
            exec("host", "forget w1"),
            exec("host", "group gone"),
            exec("host", "cleanup"),
        ]
    );

    let deletes: Vec<Call> = remote
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Delete(_)))
        .collect();
    assert_eq!(deletes, vec![Call::Delete("w1".into())]);
    assert!(remote.instances().is_empty());
    assert!(engines.compiled.borrow().is_empty());
}

#[test]
fn destroy_with_nothing_present_runs_host_hooks_only() {
    let temp = TempDir::new().unwrap();
    let mut inv = inventory(temp.path(), FLEET);
    let remote = FakeRemote::new(&[]);
    let engines = RecordingEngines::default();

    Orchestrator::new(&remote, &engines, &AssumeYes)
        .destroy(&mut inv, "p1", &DestroyOptions::default())
        .unwrap();

    assert_eq!(
        remote.executed(),
        vec![
            exec("host", "drain"),
            exec("host", "group gone"),
            exec("host", "cleanup"),
        ]
    );
    assert!(!remote.calls().iter().any(|c| matches!(c, Call::Delete(_))));
}

#[test]
fn destroy_respects_group_filter_and_prefix() {
    let yaml = r#"
projects:
  - name: p1
    groups:
      - name: web
        nodes:
          - name: w1
      - name: db
        nodes:
          - name: d1
"#;
    let temp = TempDir::new().unwrap();
    let mut inv = inventory(temp.path(), yaml);
    let remote = FakeRemote::new(&[])
        .with_instance("ci-w1", true)
        .with_instance("ci-d1", false);
    let engines = RecordingEngines::default();
    let opts = DestroyOptions::default()
        .with_groups_disabled(vec!["db".into()])
        .with_nodes_prefix("ci");

    Orchestrator::new(&remote, &engines, &AssumeYes)
        .destroy(&mut inv, "p1", &opts)
        .unwrap();

    let instances = remote.instances();
    assert!(!instances.contains_key("ci-w1"));
    assert!(instances.contains_key("ci-d1"));
}

#[test]
fn destroy_hooks_honour_flags() {
    let yaml = r#"
projects:
  - name: p1
    hooks:
      - event: pre-project-shutdown
        node: host
        flags: [backup]
        commands: ["backup"]
      - event: pre-project-shutdown
        node: host
        commands: ["always"]
"#;
    let temp = TempDir::new().unwrap();
    let mut inv = inventory(temp.path(), yaml);
    let remote = FakeRemote::new(&[]);
    let engines = RecordingEngines::default();
    let opts = DestroyOptions::default().with_flags_disabled(vec!["backup".into()]);

    Orchestrator::new(&remote, &engines, &AssumeYes)
        .destroy(&mut inv, "p1", &opts)
        .unwrap();

    assert_eq!(remote.executed(), vec![exec("host", "always")]);
}

#[test]
fn failing_shutdown_hook_keeps_the_instance() {
    let yaml = r#"
projects:
  - name: p1
    hooks:
      - event: post-project-shutdown
        node: host
        commands: ["cleanup"]
    groups:
      - name: g1
        connection: local
        nodes:
          - name: n1
            hooks:
              - event: pre-node-shutdown
                commands: ["boom", "never"]
              - event: post-node-shutdown
                node: host
                commands: ["forget n1"]
"#;
    let temp = TempDir::new().unwrap();
    let mut inv = inventory(temp.path(), yaml);
    let remote = FakeRemote::new(&[]).with_instance("n1", true).failing("boom");
    let engines = RecordingEngines::default();

    let err = Orchestrator::new(&remote, &engines, &AssumeYes)
        .destroy(&mut inv, "p1", &DestroyOptions::default())
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ComposeError>(),
        Some(ComposeError::CommandFailed { exit_code: 1, .. })
    ));
    assert_eq!(remote.executed(), vec![exec("n1", "boom")]);
    assert!(!remote.calls().iter().any(|c| matches!(c, Call::Delete(_))));
    assert_eq!(remote.instances().get("n1"), Some(&true));
}
