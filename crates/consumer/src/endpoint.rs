//! Failover / load-balanced endpoint pool.
//!
//! [`EndpointPool`] holds the configured producer addresses in order and
//! hands them out round-robin via [`EndpointPool::select_endpoint`]. Two
//! independent cursors are kept, one for authenticated callers and one for
//! anonymous callers, so the two populations do not collide on small pools.
//!
//! When an endpoint fails, [`EndpointPool::mark_failed`] takes it out of
//! rotation and asks the shared [`CooldownScheduler`] to put it back once
//! the cooldown has elapsed. Removing the last available endpoint is refused
//! with [`Error::NoEndpoint`]; the pool is never silently emptied.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use wc_domain::config::EndpointConfig;
use wc_domain::error::{Error, Result};
use wc_domain::trace::TraceEvent;

use crate::scheduler::CooldownScheduler;

/// Longest cooldown actually waited; larger values are clamped to it.
const MAX_COOLDOWN: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// When a cooldown started `now` ends, clamped to what an `Instant` holds.
fn cooldown_deadline(now: Instant, cooldown: Duration) -> Instant {
    now.checked_add(cooldown.min(MAX_COOLDOWN))
        .or_else(|| now.checked_add(Duration::from_secs(24 * 60 * 60)))
        .unwrap_or(now)
}

/// One producer address and its availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    /// `Some` while the endpoint sits out its cooldown.
    pub cooldown_until: Option<Instant>,
}

impl Endpoint {
    fn new(address: String) -> Self {
        Self {
            address,
            cooldown_until: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.cooldown_until.is_none()
    }
}

struct PoolState {
    /// Configured order; defines the round-robin sequence.
    endpoints: Vec<Endpoint>,
    logged_cursor: usize,
    anonymous_cursor: usize,
    /// Available addresses joined by a single space.
    composite: String,
    cooldown: Duration,
    timeout: Duration,
    timeout_ms: i64,
    cooldown_secs: i64,
}

impl PoolState {
    fn recompute_composite(&mut self) {
        self.composite = self
            .endpoints
            .iter()
            .filter(|e| e.is_available())
            .map(|e| e.address.as_str())
            .collect::<Vec<_>>()
            .join(" ");
    }

    fn available(&self) -> Vec<&Endpoint> {
        self.endpoints.iter().filter(|e| e.is_available()).collect()
    }
}

/// Thread-safe round-robin endpoint pool with failure cooldown.
pub struct EndpointPool {
    producer_id: String,
    state: Mutex<PoolState>,
    scheduler: Arc<CooldownScheduler>,
    me: Weak<EndpointPool>,
}

impl EndpointPool {
    /// Build a pool from an endpoint configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the address list is empty.
    pub fn new(
        producer_id: impl Into<String>,
        config: &EndpointConfig,
        scheduler: Arc<CooldownScheduler>,
    ) -> Result<Arc<Self>> {
        let endpoints = parse_addresses(&config.address);
        if endpoints.is_empty() {
            return Err(Error::Config(
                "endpoint address list must contain at least one address".into(),
            ));
        }

        let mut state = PoolState {
            endpoints: endpoints.into_iter().map(Endpoint::new).collect(),
            logged_cursor: 0,
            anonymous_cursor: 0,
            composite: String::new(),
            cooldown: config.cooldown(),
            timeout: config.timeout(),
            timeout_ms: config.timeout_ms,
            cooldown_secs: config.cooldown_secs,
        };
        state.recompute_composite();

        Ok(Arc::new_cyclic(|me| Self {
            producer_id: producer_id.into(),
            state: Mutex::new(state),
            scheduler,
            me: me.clone(),
        }))
    }

    // ── selection ──────────────────────────────────────────────────

    /// Pick the next available endpoint for this kind of caller.
    ///
    /// `index = cursor mod available`, then the caller's cursor advances.
    pub fn select_endpoint(&self, authenticated: bool) -> Result<Endpoint> {
        let mut state = self.state.lock();
        let len = state.available().len();
        if len == 0 {
            return Err(Error::NoEndpoint(format!(
                "producer '{}' has no available endpoint",
                self.producer_id
            )));
        }

        let cursor = if authenticated {
            &mut state.logged_cursor
        } else {
            &mut state.anonymous_cursor
        };
        let index = *cursor % len;
        *cursor = cursor.wrapping_add(1);

        Ok(state.available()[index].clone())
    }

    /// Take `address` out of rotation for the cooldown period.
    ///
    /// Both cursors are moved so they keep pointing at the endpoint they
    /// would have picked next, or at the successor of the removed one.
    /// Marking an endpoint that is already out of rotation is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::NoEndpoint`] if `address` is the last available endpoint;
    /// the pool is left untouched in that case.
    pub fn mark_failed(&self, address: &str) -> Result<()> {
        let (due, remaining, cooldown) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let available = state.available();
            let len = available.len();
            let Some(position) = available.iter().position(|e| e.address == address) else {
                return Ok(());
            };
            if len == 1 {
                return Err(Error::NoEndpoint(format!(
                    "endpoint '{}' of producer '{}' failed and no other endpoint is available",
                    address, self.producer_id
                )));
            }

            let due = cooldown_deadline(Instant::now(), state.cooldown);
            if let Some(ep) = state.endpoints.iter_mut().find(|e| e.address == address) {
                ep.cooldown_until = Some(due);
            }

            state.logged_cursor = skip_removed(state.logged_cursor, len, position);
            state.anonymous_cursor = skip_removed(state.anonymous_cursor, len, position);
            state.recompute_composite();

            (due, len - 1, state.cooldown)
        };

        tracing::warn!(
            producer_id = %self.producer_id,
            endpoint = %address,
            remaining,
            cooldown_secs = cooldown.as_secs(),
            "endpoint marked as failed, entering cooldown"
        );
        TraceEvent::EndpointFailed {
            producer: self.producer_id.clone(),
            endpoint: address.to_owned(),
            remaining,
            cooldown_secs: cooldown.as_secs(),
        }
        .emit();

        let pool = self.me.clone();
        let owned = address.to_owned();
        let scheduled = self.scheduler.schedule_at(due, move || {
            if let Some(pool) = pool.upgrade() {
                pool.reinstate(&owned);
            }
        });
        if !scheduled {
            tracing::error!(
                producer_id = %self.producer_id,
                endpoint = %address,
                "cooldown scheduler is gone, endpoint will not be reinstated"
            );
        }

        Ok(())
    }

    /// Put an endpoint back into rotation if its cooldown has elapsed.
    fn reinstate(&self, address: &str) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let Some(ep) = state.endpoints.iter_mut().find(|e| e.address == address) else {
            // Removed by a reconfiguration in the meantime.
            return;
        };
        match ep.cooldown_until {
            Some(until) if until <= now => ep.cooldown_until = None,
            _ => return,
        }
        state.recompute_composite();
        drop(state);

        tracing::info!(
            producer_id = %self.producer_id,
            endpoint = %address,
            "endpoint reinstated after cooldown"
        );
        TraceEvent::EndpointReinstated {
            producer: self.producer_id.clone(),
            endpoint: address.to_owned(),
        }
        .emit();
    }

    // ── configuration ──────────────────────────────────────────────

    /// Replace the address list (single URL or whitespace-separated list).
    ///
    /// First-seen order is kept, duplicates are dropped, and addresses that
    /// were already configured keep their cooldown state. Both cursors are
    /// reset to zero.
    pub fn configure(&self, addresses: &str) -> Result<()> {
        let parsed = parse_addresses(addresses);
        if parsed.is_empty() {
            return Err(Error::Config(
                "endpoint address list must contain at least one address".into(),
            ));
        }

        let mut state = self.state.lock();
        let mut endpoints: Vec<Endpoint> = parsed
            .into_iter()
            .map(|address| {
                state
                    .endpoints
                    .iter()
                    .find(|e| e.address == address)
                    .cloned()
                    .unwrap_or_else(|| Endpoint::new(address))
            })
            .collect();

        if endpoints.iter().all(|e| !e.is_available()) {
            tracing::warn!(
                producer_id = %self.producer_id,
                "every configured endpoint is cooling down, reinstating all"
            );
            for ep in &mut endpoints {
                ep.cooldown_until = None;
            }
        }

        state.endpoints = endpoints;
        state.logged_cursor = 0;
        state.anonymous_cursor = 0;
        state.recompute_composite();
        Ok(())
    }

    pub fn set_cooldown_secs(&self, secs: i64) {
        let config = EndpointConfig {
            cooldown_secs: secs,
            ..EndpointConfig::new("")
        };
        let mut state = self.state.lock();
        state.cooldown_secs = secs;
        state.cooldown = config.cooldown();
    }

    /// Set the per-operation timeout; negative values reset to the default.
    pub fn set_timeout_ms(&self, timeout_ms: i64) {
        let config = EndpointConfig {
            timeout_ms,
            ..EndpointConfig::new("")
        };
        let mut state = self.state.lock();
        state.timeout_ms = timeout_ms;
        state.timeout = config.timeout();
    }

    // ── accessors ──────────────────────────────────────────────────

    /// More than one address is configured.
    pub fn is_load_balancing(&self) -> bool {
        self.state.lock().endpoints.len() > 1
    }

    /// Available addresses in pool order, joined by a single space.
    pub fn composite_address(&self) -> String {
        self.state.lock().composite.clone()
    }

    /// Snapshot of every configured endpoint.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.state.lock().endpoints.clone()
    }

    pub fn available_count(&self) -> usize {
        self.state.lock().available().len()
    }

    pub fn timeout(&self) -> Duration {
        self.state.lock().timeout
    }

    pub fn cooldown(&self) -> Duration {
        self.state.lock().cooldown
    }

    /// Persistable configuration: every configured address, cooling down or not.
    pub fn config(&self) -> EndpointConfig {
        let state = self.state.lock();
        EndpointConfig {
            address: state
                .endpoints
                .iter()
                .map(|e| e.address.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            timeout_ms: state.timeout_ms,
            cooldown_secs: state.cooldown_secs,
        }
    }
}

impl std::fmt::Debug for EndpointPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EndpointPool")
            .field("producer_id", &self.producer_id)
            .field("composite", &state.composite)
            .field("configured", &state.endpoints.len())
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Split on whitespace, keeping first-seen order without duplicates.
fn parse_addresses(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for address in raw.split_whitespace() {
        if !out.iter().any(|a| a == address) {
            out.push(address.to_owned());
        }
    }
    out
}

/// New cursor after removing `removed` from a rotation of `len` entries.
fn skip_removed(cursor: usize, len: usize, removed: usize) -> usize {
    let index = cursor % len;
    if index > removed {
        index - 1
    } else {
        index
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(addresses: &str, cooldown_secs: i64) -> Arc<EndpointPool> {
        let config = EndpointConfig {
            cooldown_secs,
            ..EndpointConfig::new(addresses)
        };
        EndpointPool::new("test", &config, CooldownScheduler::spawn()).unwrap()
    }

    fn pick(pool: &EndpointPool, authenticated: bool) -> String {
        pool.select_endpoint(authenticated).unwrap().address
    }

    #[tokio::test]
    async fn round_robin_wraps_at_pool_size() {
        let pool = pool("http://a http://b", 60);
        assert_eq!(pick(&pool, true), "http://a");
        assert_eq!(pick(&pool, true), "http://b");
        assert_eq!(pick(&pool, true), "http://a");
    }

    #[tokio::test]
    async fn round_robin_is_fair() {
        let pool = pool("http://a http://b http://c", 60);
        let mut counts = std::collections::HashMap::new();
        for _ in 0..10 {
            *counts.entry(pick(&pool, true)).or_insert(0) += 1;
        }
        for count in counts.values() {
            assert!(*count == 3 || *count == 4, "unfair split: {counts:?}");
        }
        assert_eq!(counts.len(), 3);
    }

    #[tokio::test]
    async fn cursors_are_independent() {
        let pool = pool("http://a http://b", 60);
        assert_eq!(pick(&pool, true), "http://a");
        assert_eq!(pick(&pool, false), "http://a");
        assert_eq!(pick(&pool, true), "http://b");
        assert_eq!(pick(&pool, false), "http://b");
    }

    #[tokio::test]
    async fn configure_parses_dedupes_and_resets_cursors() {
        let pool = pool("http://a", 60);
        assert!(!pool.is_load_balancing());
        pick(&pool, true);

        pool.configure("  http://b\thttp://a\nhttp://b  ").unwrap();
        assert!(pool.is_load_balancing());
        assert_eq!(pool.composite_address(), "http://b http://a");
        assert_eq!(pick(&pool, true), "http://b");
        assert_eq!(pick(&pool, false), "http://b");
    }

    #[tokio::test]
    async fn configure_rejects_empty_list() {
        let pool = pool("http://a", 60);
        assert!(pool.configure("   ").is_err());
        assert_eq!(pool.composite_address(), "http://a");
    }

    #[tokio::test]
    async fn configure_preserves_cooldown_of_kept_addresses() {
        let pool = pool("http://a http://b", 60);
        pool.mark_failed("http://a").unwrap();
        pool.configure("http://a http://b http://c").unwrap();

        let eps = pool.endpoints();
        assert!(!eps[0].is_available());
        assert!(eps[1].is_available());
        assert_eq!(pool.composite_address(), "http://b http://c");
    }

    #[tokio::test]
    async fn mark_failed_skips_endpoint_and_updates_composite() {
        let pool = pool("http://a http://b http://c", 60);
        assert_eq!(pick(&pool, true), "http://a");

        pool.mark_failed("http://b").unwrap();
        assert_eq!(pool.composite_address(), "http://a http://c");
        assert_eq!(pool.available_count(), 2);

        // The cursor pointed at b; it now points at b's successor.
        assert_eq!(pick(&pool, true), "http://c");
        assert_eq!(pick(&pool, true), "http://a");
    }

    #[tokio::test]
    async fn mark_failed_on_last_endpoint_is_fatal_and_leaves_pool() {
        let pool = pool("http://a http://b", 60);
        pool.mark_failed("http://a").unwrap();

        let err = pool.mark_failed("http://b").unwrap_err();
        assert!(matches!(err, Error::NoEndpoint(_)));
        assert!(err.is_fatal());
        assert_eq!(pool.composite_address(), "http://b");
        assert_eq!(pick(&pool, true), "http://b");
    }

    #[tokio::test]
    async fn mark_failed_unknown_address_is_noop() {
        let pool = pool("http://a", 60);
        pool.mark_failed("http://zzz").unwrap();
        assert_eq!(pool.available_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_endpoint_returns_after_cooldown() {
        let pool = pool("http://a http://b", 30);
        pool.mark_failed("http://a").unwrap();

        tokio::time::sleep(Duration::from_secs(29)).await;
        for _ in 0..4 {
            assert_eq!(pick(&pool, true), "http://b");
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(pool.composite_address(), "http://a http://b");
        let picks: Vec<_> = (0..2).map(|_| pick(&pool, false)).collect();
        assert!(picks.contains(&"http://a".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn second_failure_extends_cooldown() {
        let pool = pool("http://a http://b", 10);
        pool.mark_failed("http://a").unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(pool.available_count(), 2);

        pool.mark_failed("http://a").unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(pool.available_count(), 1);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(pool.available_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_cooldown_is_clamped() {
        let pool = pool("http://a http://b", i64::MAX);
        pool.mark_failed("http://a").unwrap();
        assert_eq!(pool.available_count(), 1);

        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        assert_eq!(pool.available_count(), 1);
        assert_eq!(pick(&pool, true), "http://b");
    }

    #[test]
    fn mark_failed_survives_stopped_scheduler() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let scheduler = runtime.block_on(async { CooldownScheduler::spawn() });
        drop(runtime);
        assert!(!scheduler.schedule_at(Instant::now(), || {}));

        let config = EndpointConfig::new("http://a http://b");
        let pool = EndpointPool::new("test", &config, scheduler).unwrap();
        pool.mark_failed("http://a").unwrap();
        assert_eq!(pool.composite_address(), "http://b");
    }

    #[test]
    fn cooldown_deadline_saturates() {
        let now = Instant::now();
        assert_eq!(
            cooldown_deadline(now, Duration::from_secs(5)),
            now + Duration::from_secs(5)
        );
        assert_eq!(cooldown_deadline(now, Duration::MAX), now + MAX_COOLDOWN);
    }

    #[tokio::test]
    async fn config_round_trips_all_configured_addresses() {
        let pool = pool("http://a http://b", 45);
        pool.mark_failed("http://a").unwrap();
        pool.set_timeout_ms(-1);
        let cfg = pool.config();
        assert_eq!(cfg.address, "http://a http://b");
        assert_eq!(cfg.cooldown_secs, 45);
        assert_eq!(pool.timeout(), Duration::from_millis(wc_domain::config::DEFAULT_TIMEOUT_MS));
    }
}
