//! Tool configuration.
//!
//! Searched in order: an explicit path, `./.flotilla.toml`, then
//! `<config dir>/flotilla/config.toml`. Without any file the defaults apply.

pub mod parser;
pub mod schema;

use std::path::{Path, PathBuf};

use tracing::debug;

pub use parser::{parse_config, parse_config_str};
pub use schema::{FlotillaConfig, GeneralConfig, LoggingConfig};

pub const LOCAL_CONFIG_FILE: &str = ".flotilla.toml";

/// Candidate config files, most specific first.
pub fn config_search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(path) = explicit {
        paths.push(path.to_path_buf());
    }
    paths.push(PathBuf::from(LOCAL_CONFIG_FILE));
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("flotilla").join("config.toml"));
    }
    paths
}

/// Load the first config found.
///
/// An explicit path must exist; the implicit locations are optional.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<FlotillaConfig> {
    if let Some(path) = explicit
        && !path.exists()
    {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    for path in config_search_paths(explicit) {
        if path.is_file() {
            debug!("Using config file {}", path.display());
            return parse_config(&path);
        }
    }
    debug!("No config file found, using defaults");
    Ok(FlotillaConfig::default())
}
