//! Seams to the instance-management service and the local shell.
//!
//! The orchestrator only talks to these traits. `LxcExecutorFactory` is the
//! production implementation driving the `lxc` client; tests substitute an
//! in-memory recorder.

pub mod host;
pub mod lxc;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub use host::HostRunner;
pub use lxc::{LxcExecutor, LxcExecutorFactory};

/// Identity of a cached executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutorKey {
    pub connection: String,
    pub ephemeral: bool,
}

impl ExecutorKey {
    pub fn new(connection: impl Into<String>, ephemeral: bool) -> Self {
        Self {
            connection: connection.into(),
            ephemeral,
        }
    }
}

/// Which output streams the caller wants back instead of logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capture {
    pub stdout: bool,
    pub stderr: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRequest {
    /// Instance name; ignored by host runners.
    pub target: String,
    pub command: String,
    pub envs: BTreeMap<String, String>,
    /// Empty means the runner's default shell.
    pub entrypoint: Vec<String>,
    pub uid: u32,
    pub gid: u32,
    pub cwd: String,
    pub capture: Capture,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub exit_code: i32,
    /// Populated only when requested through [`Capture`].
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandRunner {
    fn run_command(&self, request: &CommandRequest) -> anyhow::Result<CommandOutcome>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateInstance {
    pub name: String,
    pub image_source: String,
    pub image_remote: String,
    pub profiles: Vec<String>,
    pub config: BTreeMap<String, String>,
}

/// Instance lifecycle operations against one remote.
pub trait Executor: CommandRunner {
    fn setup(&mut self) -> anyhow::Result<()>;
    fn is_present_instance(&self, name: &str) -> anyhow::Result<bool>;
    fn is_running_instance(&self, name: &str) -> anyhow::Result<bool>;
    fn create_instance(&self, request: &CreateInstance) -> anyhow::Result<()>;
    fn delete_instance(&self, name: &str) -> anyhow::Result<()>;
    fn start_instance(&self, name: &str) -> anyhow::Result<()>;
    /// Block until a non link-local IPv4 address shows up or `timeout` passes.
    fn wait_ip(&self, name: &str, timeout: Duration) -> anyhow::Result<()>;
    fn profiles(&self) -> anyhow::Result<Vec<String>>;
    fn push_resource(&self, name: &str, source: &Path, destination: &str) -> anyhow::Result<()>;
}

pub trait ExecutorFactory {
    /// Build an executor for a connection. `setup` is left to the caller.
    fn connect(&self, key: &ExecutorKey) -> anyhow::Result<Box<dyn Executor>>;

    fn host(&self) -> Box<dyn CommandRunner>;
}

/// Connect and set up an executor in one step.
pub fn connect_executor(
    factory: &dyn ExecutorFactory,
    key: &ExecutorKey,
) -> anyhow::Result<Box<dyn Executor>> {
    use anyhow::Context;

    let mut executor = factory.connect(key)?;
    executor
        .setup()
        .with_context(|| format!("Failed to initialize executor for connection '{}'", key.connection))?;
    Ok(executor)
}
