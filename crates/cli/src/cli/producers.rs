use anyhow::Context;

use wc_domain::config::Config;
use wc_registry::{FileRegistry, ProducerRecord, ProducerRegistry};

fn open_registry(config: &Config) -> anyhow::Result<FileRegistry> {
    FileRegistry::open(&config.registry.state_path).with_context(|| {
        format!(
            "opening producer registry under {}",
            config.registry.state_path.display()
        )
    })
}

pub fn list(config: &Config, json: bool) -> anyhow::Result<()> {
    let records = open_registry(config)?.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No persisted producers.");
        return Ok(());
    }
    for record in &records {
        println!("{}", summary_line(record));
    }
    Ok(())
}

/// Erase the local registration of `id`. Properties are kept.
pub fn erase(config: &Config, id: &str) -> anyhow::Result<()> {
    let registry = open_registry(config)?;
    let mut record = registry
        .load(id)?
        .with_context(|| format!("no persisted state for producer '{id}'"))?;

    record.registration.erase();
    record.active = false;
    record.touch();
    registry.save(&record)?;

    println!("Erased local registration of '{id}'.");
    Ok(())
}

fn summary_line(record: &ProducerRecord) -> String {
    format!(
        "{:<20} {:<8} {:<14} handle={:<12} {}  (updated {})",
        record.id,
        if record.active { "active" } else { "inactive" },
        format!("{:?}", record.registration.requirement()).to_lowercase(),
        record.registration.handle().unwrap_or("-"),
        record.endpoint.address,
        record.updated_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wc_domain::config::{EndpointConfig, RegistryConfig};
    use wc_domain::registration::RegistrationState;

    fn config_in(dir: &std::path::Path) -> Config {
        Config {
            registry: RegistryConfig {
                state_path: dir.to_path_buf(),
            },
            ..Config::default()
        }
    }

    #[test]
    fn erase_clears_handle_and_deactivates() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let mut state = RegistrationState::new("c");
        state.mark_registered("h".into(), None);
        let registry = FileRegistry::open(dir.path()).unwrap();
        registry
            .save(&ProducerRecord::new(
                "p",
                EndpointConfig::new("http://a"),
                state,
                60,
                true,
            ))
            .unwrap();

        erase(&config, "p").unwrap();

        let record = FileRegistry::open(dir.path()).unwrap().load("p").unwrap().unwrap();
        assert!(record.registration.handle().is_none());
        assert!(record.registration.is_undetermined());
        assert!(!record.active);
    }

    #[test]
    fn erase_unknown_producer_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(erase(&config_in(dir.path()), "ghost").is_err());
    }

    #[test]
    fn summary_shows_handle_and_address() {
        let mut state = RegistrationState::new("c");
        state.mark_registered("h-1".into(), None);
        let record = ProducerRecord::new("p", EndpointConfig::new("http://a"), state, 60, true);
        let line = summary_line(&record);
        assert!(line.contains("handle=h-1"));
        assert!(line.contains("http://a"));
        assert!(line.contains("required"));
    }
}
