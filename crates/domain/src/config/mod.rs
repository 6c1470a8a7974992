mod consumer;
mod logging;
mod producer;
mod registry;

pub use consumer::*;
pub use logging::*;
pub use producer::*;
pub use registry::*;

use crate::registration::QName;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub producers: Vec<ProducerConfig>,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.consumer.name.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "consumer.name".into(),
                message: "consumer name must not be empty".into(),
            });
        }

        if self.producers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "producers".into(),
                message: "no producers configured".into(),
            });
        }

        let mut seen = HashSet::new();
        for (i, producer) in self.producers.iter().enumerate() {
            if producer.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("producers[{i}].id"),
                    message: "producer id must not be empty".into(),
                });
            } else if !seen.insert(producer.id.as_str()) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("producers[{i}].id"),
                    message: format!("duplicate producer id '{}'", producer.id),
                });
            }

            if producer.endpoint.address.split_whitespace().next().is_none() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("producers[{i}].endpoint.address"),
                    message: "endpoint address must not be empty".into(),
                });
            }

            if producer.cache_ttl_secs <= 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("producers[{i}].cache_ttl_secs"),
                    message: "metadata caching disabled; every call refreshes".into(),
                });
            }

            for key in producer.registration.properties.keys() {
                if let Err(e) = key.parse::<QName>() {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("producers[{i}].registration.properties"),
                        message: e,
                    });
                }
            }
        }

        errors
    }
}
