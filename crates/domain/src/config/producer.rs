use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Producers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Default per-operation timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Built-in endpoint cooldown when neither config nor environment set one.
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

/// Environment override for the process-wide default cooldown.
pub const COOLDOWN_ENV: &str = "WC_ENDPOINT_COOLDOWN_SECS";

/// One remote producer the consumer talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub id: String,
    pub endpoint: EndpointConfig,
    /// Metadata cache lifetime. `<= 0` disables caching.
    #[serde(default = "d_cache_ttl")]
    pub cache_ttl_secs: i64,
    #[serde(default)]
    pub registration: RegistrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// A single URL or a whitespace-separated list of URLs (load balancing).
    pub address: String,
    /// Per-operation timeout. Negative values fall back to the default.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: i64,
    /// How long a failed endpoint stays out of rotation. Non-positive
    /// values fall back to the process default.
    #[serde(default)]
    pub cooldown_secs: i64,
}

impl EndpointConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout_ms: d_timeout_ms(),
            cooldown_secs: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        if self.timeout_ms < 0 {
            Duration::from_millis(DEFAULT_TIMEOUT_MS)
        } else {
            Duration::from_millis(self.timeout_ms as u64)
        }
    }

    pub fn cooldown(&self) -> Duration {
        if self.cooldown_secs <= 0 {
            Duration::from_secs(default_cooldown_secs())
        } else {
            Duration::from_secs(self.cooldown_secs as u64)
        }
    }
}

/// Registration properties configured up-front for a producer.
///
/// Keys are qualified names in `{namespace}local` form.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistrationConfig {
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Process-wide default cooldown, read once from [`COOLDOWN_ENV`].
pub fn default_cooldown_secs() -> u64 {
    static COOLDOWN: OnceLock<u64> = OnceLock::new();
    *COOLDOWN.get_or_init(|| {
        std::env::var(COOLDOWN_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_COOLDOWN_SECS)
    })
}

// ── serde default helpers ───────────────────────────────────────────

fn d_cache_ttl() -> i64 {
    300
}
fn d_timeout_ms() -> i64 {
    DEFAULT_TIMEOUT_MS as i64
}
