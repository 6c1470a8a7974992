//! Metadata refresh orchestration.
//!
//! [`RefreshOrchestrator`] is consulted before every remote operation. It
//! decides whether the producer's service description must be fetched again,
//! drives the endpoint pool and the registration negotiator while doing so,
//! and stores the result in the [`MetadataCache`].
//!
//! Concurrent refreshes are not coalesced; the last one to store wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use wc_domain::config::ConsumerConfig;
use wc_domain::fault::{Fault, FaultKind};
use wc_domain::registration::RegistrationRequirement;
use wc_domain::trace::TraceEvent;
use wc_registry::{ProducerRecord, ProducerRegistry};

use crate::endpoint::EndpointPool;
use crate::metadata::{MetadataCache, ProviderMetadata};
use crate::protocol::{RegistrationContext, ServiceDescription};
use crate::registration::{
    NegotiationStatus, RegistrationNegotiator, RegistrationOutcome, RegistrationRequirements,
};
use crate::transport::{with_deadline, ProducerTransport};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Results
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the orchestrator stands after its last refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    NotRefreshed,
    Refreshing,
    RefreshedOk,
    RefreshedWithIssues,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Success,
    Failure,
    /// No endpoint answered.
    Unavailable,
    /// Cache still fresh; nothing was fetched.
    Bypassed,
    /// The producer wants a modify-registration call first.
    RegistrationRequired,
}

impl RefreshStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshStatus::Success => "success",
            RefreshStatus::Failure => "failure",
            RefreshStatus::Unavailable => "unavailable",
            RefreshStatus::Bypassed => "bypassed",
            RefreshStatus::RegistrationRequired => "registration_required",
        }
    }
}

impl From<NegotiationStatus> for RefreshStatus {
    fn from(status: NegotiationStatus) -> Self {
        match status {
            NegotiationStatus::Bypassed => RefreshStatus::Bypassed,
            NegotiationStatus::Success => RefreshStatus::Success,
            NegotiationStatus::Failure => RefreshStatus::Failure,
            NegotiationStatus::ModifyRegistrationRequired => RefreshStatus::RegistrationRequired,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshResult {
    pub status: RefreshStatus,
    pub registration: Option<RegistrationOutcome>,
    pub message: Option<String>,
}

impl RefreshResult {
    fn new(status: RefreshStatus) -> Self {
        Self {
            status,
            registration: None,
            message: None,
        }
    }

    fn with_registration(mut self, outcome: RegistrationOutcome) -> Self {
        self.registration = Some(outcome);
        self
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// A nested registration outcome that is not `Bypassed` overrides the
    /// outer status.
    pub fn effective_status(&self) -> RefreshStatus {
        match &self.registration {
            Some(outcome) if outcome.status != NegotiationStatus::Bypassed => {
                outcome.status.into()
            }
            _ => self.status,
        }
    }

    pub fn has_issues(&self) -> bool {
        !matches!(
            self.effective_status(),
            RefreshStatus::Success | RefreshStatus::Bypassed
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct RefreshOrchestrator {
    producer_id: String,
    consumer: ConsumerConfig,
    pool: Arc<EndpointPool>,
    negotiator: RegistrationNegotiator,
    cache: MetadataCache,
    transport: Arc<dyn ProducerTransport>,
    registry: Arc<dyn ProducerRegistry>,
    state: Mutex<RefreshState>,
    active: AtomicBool,
    modify_pending: AtomicBool,
}

impl RefreshOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        producer_id: impl Into<String>,
        consumer: ConsumerConfig,
        pool: Arc<EndpointPool>,
        negotiator: RegistrationNegotiator,
        cache: MetadataCache,
        transport: Arc<dyn ProducerTransport>,
        registry: Arc<dyn ProducerRegistry>,
        active: bool,
    ) -> Self {
        Self {
            producer_id: producer_id.into(),
            consumer,
            pool,
            negotiator,
            cache,
            transport,
            registry,
            state: Mutex::new(RefreshState::NotRefreshed),
            active: AtomicBool::new(active),
            modify_pending: AtomicBool::new(false),
        }
    }

    /// Make sure metadata is usable, fetching it if stale or `force`d.
    pub async fn ensure_fresh(&self, force: bool) -> RefreshResult {
        if self.modify_pending.load(Ordering::Acquire) {
            return RefreshResult::new(RefreshStatus::RegistrationRequired)
                .with_message("producer requires a modify-registration call");
        }
        if !force && !self.cache.is_stale() {
            return RefreshResult::new(RefreshStatus::Bypassed);
        }

        *self.state.lock() = RefreshState::Refreshing;
        let started = Instant::now();
        let result = self.refresh(force).await;

        let effective = result.effective_status();
        *self.state.lock() = match effective {
            RefreshStatus::Success | RefreshStatus::Bypassed => RefreshState::RefreshedOk,
            RefreshStatus::RegistrationRequired => RefreshState::RefreshedWithIssues,
            RefreshStatus::Failure if self.cache.get().is_some() => {
                RefreshState::RefreshedWithIssues
            }
            RefreshStatus::Failure | RefreshStatus::Unavailable => RefreshState::Failed,
        };

        if result.has_issues() {
            tracing::warn!(
                producer_id = %self.producer_id,
                status = effective.as_str(),
                message = result.message.as_deref().unwrap_or(""),
                "metadata refresh finished with issues"
            );
        }
        TraceEvent::MetadataRefreshed {
            producer: self.producer_id.clone(),
            status: effective.as_str().to_owned(),
            forced: force,
            offered_items: self
                .cache
                .get()
                .map_or(0, |md| md.offered_items().len()),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        self.persist();
        result
    }

    async fn refresh(&self, force: bool) -> RefreshResult {
        let Some(endpoint) = self.reachable_endpoint().await else {
            self.set_active(false);
            return RefreshResult::new(RefreshStatus::Unavailable)
                .with_message("no producer endpoint answered");
        };

        let context = match self.negotiator.requirement() {
            RegistrationRequirement::Undetermined => None,
            _ => self.negotiator.context(),
        };

        match self.fetch_description(&endpoint, context.as_ref()).await {
            Ok(desc) => self.on_description(&endpoint, desc, force).await,
            Err(fault) => match fault.effective_kind() {
                FaultKind::InvalidRegistration => {
                    self.recover_invalid_registration(&endpoint).await
                }
                FaultKind::ModifyRegistrationRequired => {
                    self.route_to_negotiator(&endpoint, &fault).await
                }
                FaultKind::OperationFailed if self.negotiator.has_local_info() => {
                    self.route_to_negotiator(&endpoint, &fault).await
                }
                _ => self.fail(&endpoint, &fault),
            },
        }
    }

    /// The provider answered with a description.
    async fn on_description(
        &self,
        endpoint: &str,
        desc: ServiceDescription,
        force: bool,
    ) -> RefreshResult {
        let requirements = RegistrationRequirements::from(&desc);
        let was_modified = self
            .negotiator
            .with_state(|s| s.is_modified_since_refresh());
        let outcome = self.negotiator.reconcile(&requirements, true, force, false);

        if !requirements.requires_registration {
            self.store(&desc);
            self.set_active(true);
            return RefreshResult::new(RefreshStatus::Success).with_registration(outcome);
        }

        if outcome.has_issues() || !self.negotiator.is_consistent() {
            self.store(&desc);
            self.set_active(false);
            let status = if self.negotiator.is_registered() {
                self.modify_pending.store(true, Ordering::Release);
                RefreshStatus::RegistrationRequired
            } else {
                RefreshStatus::Failure
            };
            return RefreshResult::new(status)
                .with_registration(outcome)
                .with_message("registration properties do not match the producer's requirements");
        }

        let handshake = match self.negotiator.context() {
            None => self.register_with(endpoint).await.map(Some),
            Some(context) if was_modified => {
                self.modify_registration_with(endpoint, &context).await.map(Some)
            }
            Some(_) => Ok(None),
        };

        let desc = match handshake {
            Ok(Some(context)) => {
                // The registered view may expose more offered items.
                match self.fetch_description(endpoint, Some(&context)).await {
                    Ok(registered) => registered,
                    Err(fault) => {
                        tracing::warn!(
                            producer_id = %self.producer_id,
                            fault = %fault,
                            "registered service description unavailable, keeping unregistered view"
                        );
                        desc
                    }
                }
            }
            Ok(None) => desc,
            Err(fault) => {
                self.store(&desc);
                return self.fail(endpoint, &fault);
            }
        };

        self.store(&desc);
        self.set_active(true);
        RefreshResult::new(RefreshStatus::Success).with_registration(outcome)
    }

    /// The producer no longer knows our handle: start over unregistered.
    async fn recover_invalid_registration(&self, endpoint: &str) -> RefreshResult {
        tracing::warn!(
            producer_id = %self.producer_id,
            "producer rejected registration handle, renegotiating"
        );
        self.negotiator.clear_handle();

        let desc = match self.fetch_description(endpoint, None).await {
            Ok(desc) => desc,
            Err(fault) => return self.fail(endpoint, &fault),
        };
        let outcome =
            self.negotiator
                .reconcile(&RegistrationRequirements::from(&desc), false, true, true);
        if outcome.has_issues() {
            self.store(&desc);
            self.set_active(false);
            return RefreshResult::new(RefreshStatus::Failure)
                .with_registration(outcome)
                .with_message("registration is invalid and cannot be renegotiated");
        }
        self.on_description(endpoint, desc, true).await
    }

    /// The producer wants changed registration data (or failed while we
    /// hold local registration info): let the negotiator decide.
    async fn route_to_negotiator(&self, endpoint: &str, fault: &Fault) -> RefreshResult {
        let desc = match self.fetch_description(endpoint, None).await {
            Ok(desc) => desc,
            Err(fetch_fault) => return self.fail(endpoint, &fetch_fault),
        };
        self.store(&desc);
        self.set_active(false);

        let outcome =
            self.negotiator
                .reconcile(&RegistrationRequirements::from(&desc), true, true, false);
        let modify_requested = fault.effective_kind() == FaultKind::ModifyRegistrationRequired;

        // Only a registered consumer can modify; without a handle any issue
        // is a hard failure.
        let modify = outcome.status == NegotiationStatus::ModifyRegistrationRequired
            || (modify_requested && self.negotiator.is_registered());

        let status = if modify {
            self.modify_pending.store(true, Ordering::Release);
            RefreshStatus::RegistrationRequired
        } else {
            RefreshStatus::Failure
        };
        let result = RefreshResult::new(status).with_message(fault.readable().to_string());
        if outcome.has_issues() {
            result.with_registration(outcome)
        } else {
            result
        }
    }

    fn fail(&self, endpoint: &str, fault: &Fault) -> RefreshResult {
        if fault.kind.is_transport() {
            self.fail_over(endpoint);
        }
        self.set_active(false);
        RefreshResult::new(RefreshStatus::Failure).with_message(fault.readable().to_string())
    }

    // ── transport helpers ──────────────────────────────────────────

    /// Pick an endpoint and probe it; on failure, fail over once.
    pub(crate) async fn reachable_endpoint(&self) -> Option<String> {
        for attempt in 0..2 {
            let endpoint = match self.pool.select_endpoint(true) {
                Ok(endpoint) => endpoint.address,
                Err(e) => {
                    tracing::error!(producer_id = %self.producer_id, error = %e, "endpoint selection failed");
                    return None;
                }
            };
            match with_deadline(self.pool.timeout(), self.transport.check_endpoint(&endpoint)).await
            {
                Ok(()) => return Some(endpoint),
                Err(fault) => {
                    tracing::warn!(
                        producer_id = %self.producer_id,
                        endpoint = %endpoint,
                        attempt,
                        fault = %fault,
                        "endpoint check failed"
                    );
                    if !self.fail_over(&endpoint) {
                        return None;
                    }
                }
            }
        }
        None
    }

    /// Returns whether another endpoint is left to try.
    pub(crate) fn fail_over(&self, endpoint: &str) -> bool {
        match self.pool.mark_failed(endpoint) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(producer_id = %self.producer_id, error = %e, "endpoint failover impossible");
                false
            }
        }
    }

    async fn fetch_description(
        &self,
        endpoint: &str,
        context: Option<&RegistrationContext>,
    ) -> Result<ServiceDescription, Fault> {
        with_deadline(
            self.pool.timeout(),
            self.transport.get_service_description(endpoint, context),
        )
        .await
    }

    async fn register_with(&self, endpoint: &str) -> Result<RegistrationContext, Fault> {
        let data = self.negotiator.registration_data(&self.consumer);
        let context =
            with_deadline(self.pool.timeout(), self.transport.register(endpoint, &data)).await?;
        self.negotiator
            .mark_registered(context.handle.clone(), context.state.clone());
        tracing::info!(producer_id = %self.producer_id, "registered with producer");
        TraceEvent::Registered {
            producer: self.producer_id.clone(),
            modified: false,
        }
        .emit();
        Ok(context)
    }

    /// Send the current properties under an existing handle.
    pub(crate) async fn modify_registration_with(
        &self,
        endpoint: &str,
        context: &RegistrationContext,
    ) -> Result<RegistrationContext, Fault> {
        let data = self.negotiator.registration_data(&self.consumer);
        let new_state = with_deadline(
            self.pool.timeout(),
            self.transport.modify_registration(endpoint, context, &data),
        )
        .await?;

        let context = RegistrationContext {
            handle: context.handle.clone(),
            state: new_state.or_else(|| context.state.clone()),
        };
        self.negotiator
            .mark_registered(context.handle.clone(), context.state.clone());
        self.modify_pending.store(false, Ordering::Release);
        tracing::info!(producer_id = %self.producer_id, "registration modified");
        TraceEvent::Registered {
            producer: self.producer_id.clone(),
            modified: true,
        }
        .emit();
        Ok(context)
    }

    fn store(&self, desc: &ServiceDescription) {
        self.cache.store(ProviderMetadata::from(desc));
    }

    // ── state ──────────────────────────────────────────────────────

    fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_modify_registration_required(&self) -> bool {
        self.modify_pending.load(Ordering::Acquire)
    }

    pub(crate) fn clear_modify_pending(&self) {
        self.modify_pending.store(false, Ordering::Release);
    }

    pub fn refresh_state(&self) -> RefreshState {
        *self.state.lock()
    }

    pub fn producer_id(&self) -> &str {
        &self.producer_id
    }

    pub fn consumer(&self) -> &ConsumerConfig {
        &self.consumer
    }

    pub fn pool(&self) -> &Arc<EndpointPool> {
        &self.pool
    }

    pub fn negotiator(&self) -> &RegistrationNegotiator {
        &self.negotiator
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn transport(&self) -> &Arc<dyn ProducerTransport> {
        &self.transport
    }

    pub fn metadata(&self) -> Option<Arc<ProviderMetadata>> {
        self.cache.get()
    }

    /// Save the current producer state. Failures are logged, not returned.
    pub fn persist(&self) {
        let record = ProducerRecord::new(
            self.producer_id.clone(),
            self.pool.config(),
            self.negotiator.snapshot(),
            self.cache.ttl_secs(),
            self.is_active(),
        );
        if let Err(e) = self.registry.save(&record) {
            tracing::warn!(
                producer_id = %self.producer_id,
                error = %e,
                "failed to persist producer state"
            );
        }
    }
}

impl std::fmt::Debug for RefreshOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshOrchestrator")
            .field("producer_id", &self.producer_id)
            .field("state", &self.refresh_state())
            .field("active", &self.is_active())
            .field("modify_pending", &self.is_modify_registration_required())
            .finish()
    }
}
