//! TOML parser with helpful error messages

use super::schema::FlotillaConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse a config file with detailed error messages
pub fn parse_config(path: &Path) -> Result<FlotillaConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn parse_config_str(content: &str) -> Result<FlotillaConfig> {
    let config: FlotillaConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;
    config.validate()?;
    Ok(config)
}

/// Enhance TOML parsing errors with the offending lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let error_msg = error.to_string();

    let line_hint = error_msg
        .lines()
        .find(|line| line.contains("line "))
        .and_then(|line| {
            line.split("line ")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.trim_end_matches(',').parse::<usize>().ok())
        });

    match line_hint {
        Some(line_num) => anyhow::anyhow!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            get_line_context(content, line_num),
            error_msg
        ),
        None => anyhow::anyhow!("TOML parsing error: {}", error_msg),
    }
}

fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2).min(lines.len());
    let end = (line_num + 1).min(lines.len());

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
env_dirs = ["./envs", "/srv/envs"]

[general]
debug = true
lxd_confdir = "/etc/lxd-client"

[logging]
cmds_output = false
"#;
        let config = parse_config_str(toml).unwrap();
        assert!(config.general.debug);
        assert_eq!(config.general.lxd_confdir, Some(PathBuf::from("/etc/lxd-client")));
        assert_eq!(config.env_dirs.len(), 2);
        assert!(!config.logging.cmds_output);
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config, FlotillaConfig::default());
        assert_eq!(config.env_dirs, vec![PathBuf::from("./envs")]);
        assert!(config.logging.cmds_output);
    }

    #[test]
    fn test_empty_env_dirs_rejected() {
        assert!(parse_config_str("env_dirs = []").is_err());
    }

    #[test]
    fn test_parse_error_has_line_context() {
        let toml = "env_dirs = [\"a\"]\n[general\ndebug = true\n";
        let err = parse_config_str(toml).unwrap_err();
        assert!(err.to_string().contains("TOML parsing error"));
    }

    #[test]
    fn test_line_context_marks_line() {
        let context = get_line_context("a\nb\nc\nd", 3);
        assert!(context.contains(">>>    3 | c"));
        assert!(context.contains("      2 | b"));
    }

    #[test]
    fn test_parse_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[general]\ndebug = true").unwrap();

        let config = parse_config(file.path()).unwrap();
        assert!(config.general.debug);
        assert_eq!(config.env_dirs, vec![PathBuf::from("./envs")]);
    }
}
