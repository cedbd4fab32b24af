pub mod config;

use clap::{Parser, Subcommand};

/// chatrelay — a multi-tenant chat-session gateway.
#[derive(Debug, Parser)]
#[command(name = "chatrelay", version, about)]
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

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `CHATRELAY_CONFIG` (or
/// `config.toml` by default), then apply env overrides. Returns the
/// parsed [`Config`](cr_domain::config::Config) and the path used.
pub fn load_config() -> anyhow::Result<(cr_domain::config::Config, String)> {
    let config_path =
        std::env::var("CHATRELAY_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let mut config: cr_domain::config::Config =
        if std::path::Path::new(&config_path).exists() {
            let raw = std::fs::read_to_string(&config_path)
                .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
            toml::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
        } else {
            cr_domain::config::Config::default()
        };

    config.apply_env();

    Ok((config, config_path))
}
