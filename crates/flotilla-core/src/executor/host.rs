//! Commands executed on the orchestrating machine.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::Context;
use tracing::{debug, info};

use super::{CommandOutcome, CommandRequest, CommandRunner};

const DEFAULT_ENTRYPOINT: &[&str] = &["/bin/bash", "-c"];

#[derive(Debug, Clone, Default)]
pub struct HostRunner {
    lxd_confdir: Option<PathBuf>,
    show_output: bool,
}

impl HostRunner {
    pub fn new(lxd_confdir: Option<PathBuf>, show_output: bool) -> Self {
        Self {
            lxd_confdir,
            show_output,
        }
    }

    fn build(&self, request: &CommandRequest) -> anyhow::Result<Command> {
        let entrypoint: Vec<String> = if request.entrypoint.is_empty() {
            DEFAULT_ENTRYPOINT.iter().map(|s| s.to_string()).collect()
        } else {
            request.entrypoint.clone()
        };
        let (program, args) = entrypoint
            .split_first()
            .context("Empty entrypoint for host command")?;

        let mut cmd = Command::new(program);
        cmd.args(args).arg(&request.command);
        // The process environment is inherited; hook variables are layered on top.
        cmd.envs(&request.envs);
        if let Some(dir) = &self.lxd_confdir {
            cmd.env("LXD_CONF", dir);
        }
        if !request.cwd.is_empty() {
            cmd.current_dir(&request.cwd);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(cmd)
    }
}

impl CommandRunner for HostRunner {
    fn run_command(&self, request: &CommandRequest) -> anyhow::Result<CommandOutcome> {
        info!("[host] {}", request.command);

        let output = self
            .build(request)?
            .output()
            .with_context(|| format!("Failed to run host command: {}", request.command))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        // Signals leave no exit code; report them as a generic failure.
        let exit_code = output.status.code().unwrap_or(1);
        debug!("[host] exit code {exit_code}");

        Ok(CommandOutcome {
            exit_code,
            stdout: capture_or_log(request.capture.stdout, stdout, "stdout", self.show_output),
            stderr: capture_or_log(request.capture.stderr, stderr, "stderr", self.show_output),
        })
    }
}

/// Hand back captured output, or log it and return nothing.
pub(crate) fn capture_or_log(capture: bool, output: String, stream: &str, show: bool) -> String {
    if capture {
        return output;
    }
    if !output.is_empty() {
        if show {
            info!(">>> [{stream}]\n{}", output.trim_end());
        } else {
            debug!(">>> [{stream}]\n{}", output.trim_end());
        }
    }
    String::new()
}
