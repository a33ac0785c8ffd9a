pub mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};

use cs_domain::config::Config;

/// Courtside: basketball analytics chat API with usage governance.
#[derive(Debug, Parser)]
#[command(name = "courtside", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from `CS_CONFIG` (or `config.toml`). A missing
/// file yields the defaults. Returns the config and the path used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("CS_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(path: &str) -> anyhow::Result<Config> {
    if !std::path::Path::new(path).exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    toml::from_str(&raw).with_context(|| format!("parsing {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let config = load_config_from("/nonexistent/courtside.toml").unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = 1").unwrap();
        let err = load_config_from(path.to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["courtside", "config", "validate"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Config(ConfigCommand::Validate))));
        let cli = Cli::try_parse_from(["courtside"]).unwrap();
        assert!(cli.command.is_none());
    }
}
