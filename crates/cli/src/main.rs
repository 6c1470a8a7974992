use clap::Parser;
use tracing_subscriber::EnvFilter;

use wc_cli::cli::{Cli, Command, ConfigCommand, ProducersCommand};
use wc_domain::config::LoggingConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = wc_cli::cli::load_config()?;
            init_cli_tracing(&config.logging);
            if !wc_cli::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _) = wc_cli::cli::load_config()?;
            wc_cli::cli::config::show(&config)
        }
        Command::Producers(ProducersCommand::List { json }) => {
            let (config, _) = wc_cli::cli::load_config()?;
            init_cli_tracing(&config.logging);
            wc_cli::cli::producers::list(&config, json)
        }
        Command::Producers(ProducersCommand::Erase { id }) => {
            let (config, _) = wc_cli::cli::load_config()?;
            init_cli_tracing(&config.logging);
            wc_cli::cli::producers::erase(&config, &id)
        }
        Command::Rewrite {
            namespace,
            base_url,
        } => {
            init_cli_tracing(&LoggingConfig::default());
            wc_cli::cli::rewrite::run(&namespace, &base_url)
        }
        Command::Version => {
            println!("wsrp-consumer {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Stderr-only tracing so diagnostics never mix with command output.
///
/// `RUST_LOG` wins over the configured filter.
fn init_cli_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
