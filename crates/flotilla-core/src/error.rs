//! Typed failures raised by the orchestration core.
//!
//! Public operations return `anyhow::Result`; these values travel inside the
//! `anyhow::Error` and can be recovered with `downcast_ref::<ComposeError>()`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("no project found with name {0}")]
    ProjectNotFound(String),

    #[error("hook for event {event} is addressed to unknown node {node}")]
    UnknownHookTarget { event: String, node: String },

    #[error("node {node} requires profile {profile} which is not available on the remote")]
    MissingProfile { node: String, profile: String },

    #[error("command `{command}` on {target} exited with code {exit_code}")]
    CommandFailed {
        command: String,
        target: String,
        exit_code: i32,
    },

    #[error("upgrade stopped by user on node {node}")]
    UpgradeDeclined { node: String },

    #[error("invalid hook: {0}")]
    InvalidHook(String),

    #[error("invalid variable: {0}")]
    InvalidVariable(String),

    #[error("invalid template engine {0}")]
    UnknownTemplateEngine(String),
}
