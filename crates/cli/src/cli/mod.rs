pub mod config;
pub mod producers;
pub mod rewrite;

use clap::{Parser, Subcommand};

/// wsrp-consumer: remote portlet consumer tooling.
#[derive(Debug, Parser)]
#[command(name = "wsrp-consumer", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Inspect or edit persisted producer state.
    #[command(subcommand)]
    Producers(ProducersCommand),
    /// Rewrite WSRP tokens in markup read from stdin.
    Rewrite {
        /// Window namespace substituted for `wsrp_rewrite_`.
        #[arg(long)]
        namespace: String,
        /// Base URL for rewritten consumer URLs.
        #[arg(long, default_value = "/")]
        base_url: String,
    },
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

#[derive(Debug, Subcommand)]
pub enum ProducersCommand {
    /// List persisted producer records.
    List {
        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Forget the local registration of a producer.
    Erase {
        /// Producer id from the config.
        id: String,
    },
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from `WC_CONFIG` (or `consumer.toml`). A missing
/// file yields the defaults. Returns the config and the path that was used.
pub fn load_config() -> anyhow::Result<(wc_domain::config::Config, String)> {
    let config_path = std::env::var("WC_CONFIG").unwrap_or_else(|_| "consumer.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        wc_domain::config::Config::default()
    };

    Ok((config, config_path))
}
