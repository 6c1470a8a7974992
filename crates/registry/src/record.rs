use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wc_domain::config::{EndpointConfig, ProducerConfig};
use wc_domain::registration::RegistrationState;

/// Everything about a producer that survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerRecord {
    pub id: String,
    pub endpoint: EndpointConfig,
    pub registration: RegistrationState,
    pub cache_ttl_secs: i64,
    #[serde(default)]
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl ProducerRecord {
    /// A fresh record for a configured producer that was never persisted.
    pub fn from_config(config: &ProducerConfig, consumer_name: &str) -> Self {
        Self {
            id: config.id.clone(),
            endpoint: config.endpoint.clone(),
            registration: RegistrationState::new(consumer_name),
            cache_ttl_secs: config.cache_ttl_secs,
            active: false,
            updated_at: Utc::now(),
        }
    }

    /// Snapshot of live producer state, stamped now.
    pub fn new(
        id: impl Into<String>,
        endpoint: EndpointConfig,
        registration: RegistrationState,
        cache_ttl_secs: i64,
        active: bool,
    ) -> Self {
        Self {
            id: id.into(),
            endpoint,
            registration,
            cache_ttl_secs,
            active,
            updated_at: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
