//! Executor backed by the `lxc` command line client.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::host::capture_or_log;
use super::{
    CommandOutcome, CommandRequest, CommandRunner, CreateInstance, Executor, ExecutorFactory,
    ExecutorKey, HostRunner,
};

const DEFAULT_ENTRYPOINT: &[&str] = &["/bin/sh", "-c"];
const WAIT_IP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct LxcExecutorFactory {
    lxd_confdir: Option<PathBuf>,
    show_output: bool,
}

impl LxcExecutorFactory {
    pub fn new(lxd_confdir: Option<PathBuf>, show_output: bool) -> Self {
        Self {
            lxd_confdir,
            show_output,
        }
    }
}

impl ExecutorFactory for LxcExecutorFactory {
    fn connect(&self, key: &ExecutorKey) -> anyhow::Result<Box<dyn Executor>> {
        Ok(Box::new(LxcExecutor::new(
            key.clone(),
            self.lxd_confdir.clone(),
            self.show_output,
        )))
    }

    fn host(&self) -> Box<dyn super::CommandRunner> {
        Box::new(HostRunner::new(self.lxd_confdir.clone(), self.show_output))
    }
}

#[derive(Debug, Clone)]
pub struct LxcExecutor {
    key: ExecutorKey,
    lxd_confdir: Option<PathBuf>,
    show_output: bool,
}

#[derive(Debug, Deserialize)]
struct InstanceEntry {
    name: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProfileEntry {
    Name(String),
    Object { name: String },
}

impl LxcExecutor {
    pub fn new(key: ExecutorKey, lxd_confdir: Option<PathBuf>, show_output: bool) -> Self {
        Self {
            key,
            lxd_confdir,
            show_output,
        }
    }

    /// `remote:` prefix for CLI arguments, empty for the default remote.
    fn remote_prefix(&self) -> String {
        if self.key.connection.is_empty() {
            String::new()
        } else {
            format!("{}:", self.key.connection)
        }
    }

    fn instance_ref(&self, name: &str) -> String {
        format!("{}{}", self.remote_prefix(), name)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("lxc");
        if let Some(dir) = &self.lxd_confdir {
            cmd.env("LXD_CONF", dir);
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    fn output(&self, args: &[&str]) -> anyhow::Result<Output> {
        debug!("lxc {}", args.join(" "));
        self.command()
            .args(args)
            .output()
            .with_context(|| format!("Failed to run lxc {:?}", args))
    }

    /// Run an lxc subcommand that must succeed, returning its stdout.
    fn run_lxc(&self, args: &[&str]) -> anyhow::Result<String> {
        let output = self.output(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("lxc command failed {:?}: {}", args, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Subcommand args with the remote appended when one is configured.
    fn remote_args<'a>(&self, head: &[&'a str], remote: &'a str) -> Vec<&'a str> {
        let mut args = head.to_vec();
        if !remote.is_empty() {
            args.push(remote);
        }
        args.extend(["--format", "json"]);
        args
    }

    fn instances(&self) -> anyhow::Result<Vec<InstanceEntry>> {
        let remote = self.remote_prefix();
        let stdout = self.run_lxc(&self.remote_args(&["list"], &remote))?;
        serde_json::from_str(&stdout).context("Failed to parse lxc list output")
    }

    fn instance(&self, name: &str) -> anyhow::Result<Option<InstanceEntry>> {
        Ok(self.instances()?.into_iter().find(|i| i.name == name))
    }

    fn stop_instance(&self, name: &str) -> anyhow::Result<()> {
        self.run_lxc(&["stop", self.instance_ref(name).as_str()])?;
        Ok(())
    }

    fn has_global_ipv4(state: &Value) -> bool {
        let Some(networks) = state.get("network").and_then(Value::as_object) else {
            return false;
        };
        networks
            .iter()
            .filter(|(iface, _)| iface.as_str() != "lo")
            .filter_map(|(_, net)| net.get("addresses").and_then(Value::as_array))
            .flatten()
            .any(|addr| {
                addr.get("family").and_then(Value::as_str) == Some("inet")
                    && addr.get("scope").and_then(Value::as_str) == Some("global")
            })
    }
}

impl CommandRunner for LxcExecutor {
    fn run_command(&self, request: &CommandRequest) -> anyhow::Result<CommandOutcome> {
        info!("[{}] {}", request.target, request.command);

        let target = self.instance_ref(&request.target);
        let uid = request.uid.to_string();
        let gid = request.gid.to_string();

        let mut cmd = self.command();
        cmd.args(["exec", target.as_str(), "--user", uid.as_str(), "--group", gid.as_str()]);
        if !request.cwd.is_empty() {
            cmd.args(["--cwd", request.cwd.as_str()]);
        }
        for (key, value) in &request.envs {
            cmd.arg("--env").arg(format!("{key}={value}"));
        }
        cmd.arg("--");
        if request.entrypoint.is_empty() {
            cmd.args(DEFAULT_ENTRYPOINT);
        } else {
            cmd.args(&request.entrypoint);
        }
        cmd.arg(&request.command);

        let output = cmd
            .output()
            .with_context(|| format!("Failed to exec on {}: {}", target, request.command))?;
        let exit_code = output.status.code().unwrap_or(1);
        debug!("[{}] exit code {exit_code}", request.target);

        Ok(CommandOutcome {
            exit_code,
            stdout: capture_or_log(
                request.capture.stdout,
                String::from_utf8_lossy(&output.stdout).into_owned(),
                "stdout",
                self.show_output,
            ),
            stderr: capture_or_log(
                request.capture.stderr,
                String::from_utf8_lossy(&output.stderr).into_owned(),
                "stderr",
                self.show_output,
            ),
        })
    }
}

impl Executor for LxcExecutor {
    fn setup(&mut self) -> anyhow::Result<()> {
        let stdout = self.run_lxc(&["remote", "list", "--format", "json"])?;
        if self.key.connection.is_empty() {
            return Ok(());
        }
        let remotes: serde_json::Map<String, Value> =
            serde_json::from_str(&stdout).context("Failed to parse lxc remote list output")?;
        if !remotes.contains_key(&self.key.connection) {
            anyhow::bail!("Remote {} is not configured", self.key.connection);
        }
        Ok(())
    }

    fn is_present_instance(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.instance(name)?.is_some())
    }

    fn is_running_instance(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self
            .instance(name)?
            .map(|i| i.status.eq_ignore_ascii_case("running"))
            .unwrap_or(false))
    }

    fn create_instance(&self, request: &CreateInstance) -> anyhow::Result<()> {
        let image = if request.image_remote.is_empty() {
            request.image_source.clone()
        } else {
            format!("{}:{}", request.image_remote, request.image_source)
        };
        let target = self.instance_ref(&request.name);

        let mut args: Vec<String> = vec!["init".into(), image, target.clone()];
        for profile in &request.profiles {
            args.push("--profile".into());
            args.push(profile.clone());
        }
        for (key, value) in &request.config {
            args.push("--config".into());
            args.push(format!("{key}={value}"));
        }
        if self.key.ephemeral {
            args.push("--ephemeral".into());
        }

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_lxc(&args)
            .with_context(|| format!("Failed to create instance {}", request.name))?;
        self.run_lxc(&["start", target.as_str()])
            .with_context(|| format!("Failed to start instance {}", request.name))?;
        Ok(())
    }

    fn delete_instance(&self, name: &str) -> anyhow::Result<()> {
        if self.key.ephemeral {
            // Ephemeral instances are reclaimed by the server once stopped.
            if self.is_running_instance(name)? {
                self.stop_instance(name)?;
            }
            return Ok(());
        }
        self.run_lxc(&["delete", "--force", self.instance_ref(name).as_str()])?;
        Ok(())
    }

    fn start_instance(&self, name: &str) -> anyhow::Result<()> {
        self.run_lxc(&["start", self.instance_ref(name).as_str()])?;
        Ok(())
    }

    fn wait_ip(&self, name: &str, timeout: Duration) -> anyhow::Result<()> {
        let path = format!("{}/1.0/instances/{}/state", self.remote_prefix(), name);
        let deadline = Instant::now() + timeout;
        loop {
            let stdout = self.run_lxc(&["query", path.as_str()])?;
            let state: Value =
                serde_json::from_str(&stdout).context("Failed to parse instance state")?;
            if Self::has_global_ipv4(&state) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                anyhow::bail!(
                    "Timeout waiting for an IP address on {} after {}s",
                    name,
                    timeout.as_secs()
                );
            }
            std::thread::sleep(WAIT_IP_INTERVAL);
        }
    }

    fn profiles(&self) -> anyhow::Result<Vec<String>> {
        let remote = self.remote_prefix();
        let stdout = self.run_lxc(&self.remote_args(&["profile", "list"], &remote))?;
        let entries: Vec<ProfileEntry> =
            serde_json::from_str(&stdout).context("Failed to parse lxc profile list output")?;
        Ok(entries
            .into_iter()
            .map(|e| match e {
                ProfileEntry::Name(name) | ProfileEntry::Object { name } => name,
            })
            .collect())
    }

    fn push_resource(&self, name: &str, source: &Path, destination: &str) -> anyhow::Result<()> {
        let target = if destination.starts_with('/') {
            format!("{}{}", self.instance_ref(name), destination)
        } else {
            format!("{}/{}", self.instance_ref(name), destination)
        };
        let source_arg = source.to_string_lossy();

        let mut args = vec!["file", "push", "--create-dirs"];
        if source.is_dir() {
            args.push("--recursive");
        }
        args.push(&*source_arg);
        args.push(target.as_str());
        self.run_lxc(&args)
            .with_context(|| format!("Failed to push {} to {}", source.display(), target))?;
        Ok(())
    }
}
