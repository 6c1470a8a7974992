//! Provider metadata and its time-bounded cache.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use wc_domain::registration::QName;

use crate::protocol::{
    CookieProtocol, EventDescription, ExtensionDescription, OfferedItem, ServiceDescription,
};

/// Immutable snapshot of what a producer declared.
///
/// Replaced wholesale on every successful refresh; never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderMetadata {
    /// Insertion order of the producer's response.
    offered_items: Vec<OfferedItem>,
    custom_modes: Vec<ExtensionDescription>,
    custom_window_states: Vec<ExtensionDescription>,
    events: BTreeMap<QName, EventDescription>,
    supported_options: Vec<String>,
    cookie_protocol: CookieProtocol,
}

impl ProviderMetadata {
    pub fn offered_items(&self) -> &[OfferedItem] {
        &self.offered_items
    }

    pub fn offered_item(&self, handle: &str) -> Option<&OfferedItem> {
        self.offered_items.iter().find(|i| i.handle == handle)
    }

    pub fn custom_modes(&self) -> &[ExtensionDescription] {
        &self.custom_modes
    }

    pub fn custom_window_states(&self) -> &[ExtensionDescription] {
        &self.custom_window_states
    }

    pub fn event(&self, name: &QName) -> Option<&EventDescription> {
        self.events.get(name)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn supports_option(&self, option: &str) -> bool {
        self.supported_options.iter().any(|o| o == option)
    }

    pub fn cookie_protocol(&self) -> CookieProtocol {
        self.cookie_protocol
    }
}

impl From<&ServiceDescription> for ProviderMetadata {
    fn from(desc: &ServiceDescription) -> Self {
        let mut offered_items: Vec<OfferedItem> = Vec::with_capacity(desc.offered_items.len());
        for item in &desc.offered_items {
            // First declaration of a handle wins.
            if !offered_items.iter().any(|i| i.handle == item.handle) {
                offered_items.push(item.clone());
            }
        }

        Self {
            offered_items,
            custom_modes: desc.custom_modes.clone(),
            custom_window_states: desc.custom_window_states.clone(),
            events: desc
                .events
                .iter()
                .map(|e| (e.name.clone(), e.clone()))
                .collect(),
            supported_options: desc.supported_options.clone(),
            cookie_protocol: desc.requires_init_cookie,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct CacheSlot {
    metadata: Option<Arc<ProviderMetadata>>,
    ttl_secs: i64,
    stored_at: Option<Instant>,
    expires_at: Option<Instant>,
    invalidated: bool,
}

/// Holds the latest [`ProviderMetadata`] with a TTL.
///
/// A TTL of zero or less disables caching: [`MetadataCache::is_stale`] is
/// then always true, but the last payload is still served by
/// [`MetadataCache::get`].
pub struct MetadataCache {
    slot: RwLock<CacheSlot>,
}

impl MetadataCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            slot: RwLock::new(CacheSlot {
                metadata: None,
                ttl_secs,
                stored_at: None,
                expires_at: None,
                invalidated: false,
            }),
        }
    }

    pub fn is_stale(&self) -> bool {
        let slot = self.slot.read();
        if slot.ttl_secs <= 0 || slot.metadata.is_none() || slot.invalidated {
            return true;
        }
        // No expiry with a positive TTL: the window is beyond what an
        // `Instant` can represent.
        slot.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    /// Replace the payload and restart the TTL window.
    pub fn store(&self, metadata: ProviderMetadata) -> Arc<ProviderMetadata> {
        let metadata = Arc::new(metadata);
        let mut slot = self.slot.write();
        let now = Instant::now();
        slot.stored_at = Some(now);
        slot.expires_at = ttl_duration(slot.ttl_secs).and_then(|ttl| now.checked_add(ttl));
        slot.metadata = Some(metadata.clone());
        slot.invalidated = false;
        metadata
    }

    /// Force the next [`is_stale`](Self::is_stale) to be true, keeping the payload.
    pub fn invalidate(&self) {
        self.slot.write().invalidated = true;
    }

    /// Change the TTL, keeping the start of the current window, so time
    /// already elapsed counts against the new TTL.
    pub fn set_ttl(&self, ttl_secs: i64) {
        let mut slot = self.slot.write();
        slot.ttl_secs = ttl_secs;
        slot.expires_at = match (slot.stored_at, ttl_duration(ttl_secs)) {
            (Some(stored_at), Some(ttl)) => stored_at.checked_add(ttl),
            _ => None,
        };
    }

    pub fn ttl_secs(&self) -> i64 {
        self.slot.read().ttl_secs
    }

    pub fn get(&self) -> Option<Arc<ProviderMetadata>> {
        self.slot.read().metadata.clone()
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.read();
        f.debug_struct("MetadataCache")
            .field("ttl_secs", &slot.ttl_secs)
            .field("populated", &slot.metadata.is_some())
            .field("invalidated", &slot.invalidated)
            .finish()
    }
}

fn ttl_duration(ttl_secs: i64) -> Option<Duration> {
    (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProviderMetadata {
        let desc = ServiceDescription {
            offered_items: vec![
                OfferedItem::new("b"),
                OfferedItem::new("a"),
                OfferedItem::new("b"),
            ],
            requires_init_cookie: CookieProtocol::PerUser,
            supported_options: vec!["wsrp:events".into()],
            ..Default::default()
        };
        ProviderMetadata::from(&desc)
    }

    #[test]
    fn metadata_keeps_insertion_order_and_dedupes() {
        let md = sample();
        let handles: Vec<_> = md.offered_items().iter().map(|i| i.handle.as_str()).collect();
        assert_eq!(handles, vec!["b", "a"]);
        assert!(md.supports_option("wsrp:events"));
        assert_eq!(md.cookie_protocol(), CookieProtocol::PerUser);
    }

    #[tokio::test(start_paused = true)]
    async fn staleness_lifecycle() {
        let cache = MetadataCache::new(60);
        assert!(cache.is_stale());

        cache.store(sample());
        assert!(!cache.is_stale());

        cache.invalidate();
        assert!(cache.is_stale());
        assert!(cache.get().is_some());

        cache.store(sample());
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_disables_caching() {
        let cache = MetadataCache::new(0);
        cache.store(sample());
        assert!(cache.is_stale());
        assert!(cache.get().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn huge_ttl_keeps_cache_fresh() {
        let cache = MetadataCache::new(i64::MAX);
        cache.store(sample());
        assert!(!cache.is_stale());

        tokio::time::advance(Duration::from_secs(365 * 24 * 60 * 60)).await;
        cache.set_ttl(i64::MAX - 1);
        assert!(!cache.is_stale());

        cache.invalidate();
        assert!(cache.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn set_ttl_keeps_elapsed_time() {
        let cache = MetadataCache::new(100);
        cache.store(sample());
        tokio::time::advance(Duration::from_secs(40)).await;

        // 40s already elapsed in the window: 50s TTL leaves 10s.
        cache.set_ttl(50);
        assert!(!cache.is_stale());
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn shrinking_ttl_below_elapsed_expires_immediately() {
        let cache = MetadataCache::new(100);
        cache.store(sample());
        tokio::time::advance(Duration::from_secs(40)).await;
        cache.set_ttl(30);
        assert!(cache.is_stale());
    }
}
