//! Consumer manager: every configured producer, built once at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;

use wc_domain::config::{Config, ConsumerConfig, ProducerConfig};
use wc_domain::error::{Error, Result};
use wc_domain::registration::{QName, RegistrationState};
use wc_registry::ProducerRegistry;

use crate::container::{ContainerResponse, ErrorResponse, Invocation, UrlGenerator};
use crate::endpoint::EndpointPool;
use crate::metadata::MetadataCache;
use crate::producer::RemoteProducer;
use crate::refresh::{RefreshOrchestrator, RefreshResult};
use crate::registration::RegistrationNegotiator;
use crate::scheduler::CooldownScheduler;
use crate::session::ConsumerSession;
use crate::transport::ProducerTransport;

pub struct ConsumerManager {
    consumer: ConsumerConfig,
    producers: BTreeMap<String, Arc<RemoteProducer>>,
    registry: Arc<dyn ProducerRegistry>,
    scheduler: Arc<CooldownScheduler>,
}

impl ConsumerManager {
    /// Build every configured producer, restoring persisted state.
    ///
    /// Producers whose configuration cannot be used are logged and skipped.
    /// Must be called from within a Tokio runtime (the cooldown scheduler
    /// task is spawned here).
    pub fn from_config(
        config: &Config,
        registry: Arc<dyn ProducerRegistry>,
        transport: Arc<dyn ProducerTransport>,
    ) -> Self {
        let scheduler = CooldownScheduler::spawn();
        let mut producers = BTreeMap::new();

        for producer_config in &config.producers {
            if producers.contains_key(&producer_config.id) {
                tracing::warn!(producer_id = %producer_config.id, "duplicate producer id, skipping");
                continue;
            }
            match build_producer(
                &config.consumer,
                producer_config,
                registry.clone(),
                transport.clone(),
                scheduler.clone(),
            ) {
                Ok(producer) => {
                    producers.insert(producer_config.id.clone(), Arc::new(producer));
                }
                Err(e) => {
                    tracing::warn!(
                        producer_id = %producer_config.id,
                        error = %e,
                        "failed to set up producer, skipping"
                    );
                }
            }
        }

        tracing::info!(producer_count = producers.len(), "consumer manager ready");

        Self {
            consumer: config.consumer.clone(),
            producers,
            registry,
            scheduler,
        }
    }

    pub fn get(&self, producer_id: &str) -> Option<Arc<RemoteProducer>> {
        self.producers.get(producer_id).cloned()
    }

    /// All producers, ordered by id.
    pub fn producers(&self) -> Vec<Arc<RemoteProducer>> {
        self.producers.values().cloned().collect()
    }

    pub fn producer_ids(&self) -> Vec<String> {
        self.producers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    pub fn consumer(&self) -> &ConsumerConfig {
        &self.consumer
    }

    pub fn registry(&self) -> &Arc<dyn ProducerRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<CooldownScheduler> {
        &self.scheduler
    }

    /// Route a container invocation to a producer.
    pub async fn invoke(
        &self,
        producer_id: &str,
        invocation: &Invocation,
        session: &ConsumerSession,
        urls: &dyn UrlGenerator,
    ) -> ContainerResponse {
        match self.producers.get(producer_id) {
            Some(producer) => producer.invoke(invocation, session, urls).await,
            None => ContainerResponse::Error(ErrorResponse::from(&Error::UnknownItem(format!(
                "producer '{producer_id}' is not configured"
            )))),
        }
    }

    /// Refresh every producer concurrently.
    pub async fn refresh_all(&self, force: bool) -> Vec<(String, RefreshResult)> {
        let refreshes = self.producers.iter().map(|(id, producer)| async move {
            (id.clone(), producer.refresh(force).await)
        });
        join_all(refreshes).await
    }
}

impl std::fmt::Debug for ConsumerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerManager")
            .field("consumer", &self.consumer.name)
            .field("producers", &self.producers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn build_producer(
    consumer: &ConsumerConfig,
    config: &ProducerConfig,
    registry: Arc<dyn ProducerRegistry>,
    transport: Arc<dyn ProducerTransport>,
    scheduler: Arc<CooldownScheduler>,
) -> Result<RemoteProducer> {
    let persisted = match registry.load(&config.id) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(
                producer_id = %config.id,
                error = %e,
                "persisted producer state unreadable, starting fresh"
            );
            None
        }
    };

    let (mut registration, active) = match persisted {
        Some(record) => (record.registration, record.active),
        None => (RegistrationState::new(consumer.name.clone()), false),
    };
    registration.set_consumer_name(consumer.name.clone());

    for (key, value) in &config.registration.properties {
        let name: QName = key
            .parse()
            .map_err(|e: String| Error::Config(format!("producer '{}': {e}", config.id)))?;
        registration.set_property_value(name, Some(value.clone()));
    }

    // Configured endpoint settings win over persisted ones.
    let pool = EndpointPool::new(config.id.clone(), &config.endpoint, scheduler)?;

    let orchestrator = RefreshOrchestrator::new(
        config.id.clone(),
        consumer.clone(),
        pool,
        RegistrationNegotiator::new(config.id.clone(), registration),
        MetadataCache::new(config.cache_ttl_secs),
        transport,
        registry,
        active,
    );
    orchestrator.persist();
    Ok(RemoteProducer::new(Arc::new(orchestrator)))
}
