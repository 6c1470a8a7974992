use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Consumer identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How this consumer introduces itself to producers when registering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default = "d_name")]
    pub name: String,
    #[serde(default = "d_agent")]
    pub agent: String,
    /// Whether markup URLs may be requested with GET.
    #[serde(default)]
    pub method_get_supported: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            name: d_name(),
            agent: d_agent(),
            method_get_supported: false,
        }
    }
}

fn d_name() -> String {
    "wsrp-consumer".into()
}

fn d_agent() -> String {
    concat!("wsrp-consumer.", env!("CARGO_PKG_VERSION")).into()
}
