//! Configuration schema for the flotilla tool config.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root of `config.toml` / `.flotilla.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlotillaConfig {
    /// Directories scanned for environment files
    #[serde(default = "default_env_dirs")]
    pub env_dirs: Vec<PathBuf>,

    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub debug: bool,

    /// Exported as `LXD_CONF` to host commands and the `lxc` client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lxd_confdir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log command output at info level instead of debug
    #[serde(default = "default_true")]
    pub cmds_output: bool,
}

impl Default for FlotillaConfig {
    fn default() -> Self {
        Self {
            env_dirs: default_env_dirs(),
            general: GeneralConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { cmds_output: true }
    }
}

fn default_env_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("./envs")]
}

fn default_true() -> bool {
    true
}

impl FlotillaConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.env_dirs.is_empty() {
            anyhow::bail!("env_dirs must list at least one directory");
        }
        Ok(())
    }
}
