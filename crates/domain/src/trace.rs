use serde::Serialize;

/// Structured trace events emitted across all consumer crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    EndpointFailed {
        producer: String,
        endpoint: String,
        remaining: usize,
        cooldown_secs: u64,
    },
    EndpointReinstated {
        producer: String,
        endpoint: String,
    },
    MetadataRefreshed {
        producer: String,
        status: String,
        forced: bool,
        offered_items: usize,
        duration_ms: u64,
    },
    RegistrationNegotiated {
        producer: String,
        status: String,
        registered: bool,
        issues: usize,
    },
    Registered {
        producer: String,
        modified: bool,
    },
    InvocationRetried {
        producer: String,
        operation: String,
        item: String,
        attempt: u32,
        fault: String,
    },
    InvocationFailed {
        producer: String,
        operation: String,
        item: String,
        attempts: u32,
        reason: String,
    },
    ProducerPersisted {
        producer: String,
        active: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "wc_event");
    }
}
