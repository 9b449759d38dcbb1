use clap::{Parser, Subcommand};

/// agent-gateway — a provider-agnostic tool-calling gateway.
#[derive(Debug, Parser)]
#[command(name = "gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
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

/// Load the configuration from the path named by `AGW_CONFIG` (or
/// `config.toml` by default). Shared by `serve` and `config` subcommands.
pub fn load_config() -> anyhow::Result<(agw_domain::config::Config, String)> {
    let (config, path) = agw_domain::config::Config::load()?;
    Ok((config, path))
}

pub mod config {
    use agw_domain::config::{Config, ConfigSeverity};

    pub fn validate(config: &Config, path: &str) -> bool {
        let issues = config.validate();
        for issue in &issues {
            match issue.severity {
                ConfigSeverity::Warning => println!("[WARN] {issue}"),
                ConfigSeverity::Error => println!("[ERROR] {issue}"),
            }
        }
        let ok = !issues.iter().any(|i| i.severity == ConfigSeverity::Error);
        if ok {
            println!(
                "{path}: OK ({} warning(s))",
                issues
                    .iter()
                    .filter(|i| i.severity == ConfigSeverity::Warning)
                    .count()
            );
        } else {
            println!("{path}: FAILED");
        }
        ok
    }

    pub fn show(config: &Config) {
        match toml::to_string_pretty(config) {
            Ok(s) => print!("{s}"),
            Err(e) => eprintln!("failed to render config as TOML: {e}"),
        }
    }
}
