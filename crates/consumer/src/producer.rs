//! Remote producer facade.
//!
//! [`RemoteProducer`] is what the rest of the consumer talks to. It keeps
//! metadata fresh, checks that the requested item exists, runs the operation
//! through the [`InvocationPipeline`], and turns the outcome into a
//! [`ContainerResponse`].

use std::sync::Arc;

use wc_domain::error::{Error, Result};
use wc_domain::fault::Fault;
use wc_domain::registration::{PropertyDescription, QName};

use crate::container::{ContainerResponse, ErrorResponse, Invocation, InvocationKind, UrlGenerator};
use crate::invocation::InvocationPipeline;
use crate::operation::{ActionOperation, OperationTarget, RenderOperation, ResourceOperation};
use crate::protocol::{InteractionResponse, MarkupContent, OfferedItem, StateUpdate};
use crate::refresh::{RefreshOrchestrator, RefreshResult, RefreshStatus};
use crate::rewriter::rewrite_wsrp_tokens;
use crate::session::ConsumerSession;
use crate::transport::with_deadline;

#[derive(Debug)]
pub struct RemoteProducer {
    orchestrator: Arc<RefreshOrchestrator>,
    pipeline: InvocationPipeline,
}

impl RemoteProducer {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>) -> Self {
        Self {
            pipeline: InvocationPipeline::new(orchestrator.clone()),
            orchestrator,
        }
    }

    pub fn id(&self) -> &str {
        self.orchestrator.producer_id()
    }

    pub fn orchestrator(&self) -> &Arc<RefreshOrchestrator> {
        &self.orchestrator
    }

    pub fn is_active(&self) -> bool {
        self.orchestrator.is_active()
    }

    pub async fn refresh(&self, force: bool) -> RefreshResult {
        self.orchestrator.ensure_fresh(force).await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Invocation
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Run a container invocation. Never fails: errors come back as
    /// [`ContainerResponse::Error`].
    pub async fn invoke(
        &self,
        invocation: &Invocation,
        session: &ConsumerSession,
        urls: &dyn UrlGenerator,
    ) -> ContainerResponse {
        match self.try_invoke(invocation, session, urls).await {
            Ok(response) => response,
            Err(e) => ContainerResponse::Error(ErrorResponse::from(&e)),
        }
    }

    pub async fn try_invoke(
        &self,
        invocation: &Invocation,
        session: &ConsumerSession,
        urls: &dyn UrlGenerator,
    ) -> Result<ContainerResponse> {
        let refreshed = self.orchestrator.ensure_fresh(false).await;
        check_refresh(&refreshed)?;
        self.offered_item(&invocation.item_handle).await?;

        let target = OperationTarget {
            item_handle: invocation.item_handle.clone(),
            namespace: invocation.window.namespace.clone(),
            params: invocation.markup_params(),
        };
        let namespace = invocation.window.namespace.as_str();

        match invocation.kind {
            InvocationKind::Render => {
                let op = RenderOperation { target };
                let response = self.pipeline.invoke(&op, session).await?;
                Ok(ContainerResponse::Content(rewrite_content(
                    response.content,
                    namespace,
                    urls,
                )))
            }
            InvocationKind::Action => {
                let op = ActionOperation {
                    target,
                    interaction_state: invocation.interaction_state.clone(),
                    form_parameters: invocation.form_parameters.clone(),
                };
                let response = self.pipeline.invoke(&op, session).await?;
                action_response(response)
            }
            InvocationKind::Resource => {
                let op = ResourceOperation {
                    target,
                    resource_id: invocation.resource_id.clone(),
                    resource_state: invocation.resource_state.clone(),
                };
                let response = self.pipeline.invoke(&op, session).await?;
                Ok(ContainerResponse::Content(rewrite_content(
                    response.content,
                    namespace,
                    urls,
                )))
            }
        }
    }

    /// Look up an offered item, refreshing once if it is not known yet.
    pub async fn offered_item(&self, handle: &str) -> Result<OfferedItem> {
        if let Some(item) = self.cached_item(handle) {
            return Ok(item);
        }
        let refreshed = self.orchestrator.ensure_fresh(true).await;
        check_refresh(&refreshed)?;
        self.cached_item(handle)
            .ok_or_else(|| Error::UnknownItem(format!("{} on producer '{}'", handle, self.id())))
    }

    fn cached_item(&self, handle: &str) -> Option<OfferedItem> {
        self.orchestrator
            .metadata()
            .and_then(|md| md.offered_item(handle).cloned())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Registration management
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Forced refresh, registering if the producer requires it.
    pub async fn register(&self) -> Result<RefreshResult> {
        let result = self.orchestrator.ensure_fresh(true).await;
        check_refresh(&result)?;
        Ok(result)
    }

    /// Send the current properties under the existing handle, then refresh.
    pub async fn modify_registration(&self) -> Result<RefreshResult> {
        let orch = &self.orchestrator;
        let context = orch
            .negotiator()
            .context()
            .ok_or_else(|| Error::Registration(format!("producer '{}' is not registered", self.id())))?;
        if !orch.negotiator().is_consistent() {
            return Err(Error::Registration(
                "registration properties are missing or invalid".into(),
            ));
        }

        let endpoint = self.reachable_endpoint().await?;
        orch.modify_registration_with(&endpoint, &context)
            .await
            .map_err(|fault| self.call_failed(&endpoint, fault))?;

        orch.cache().invalidate();
        let result = orch.ensure_fresh(true).await;
        check_refresh(&result)?;
        Ok(result)
    }

    /// Deregister remotely, then forget everything locally.
    pub async fn deregister(&self) -> Result<()> {
        let orch = &self.orchestrator;
        let context = orch
            .negotiator()
            .context()
            .ok_or_else(|| Error::Registration(format!("producer '{}' is not registered", self.id())))?;
        let endpoint = self.reachable_endpoint().await?;
        with_deadline(
            orch.pool().timeout(),
            orch.transport().deregister(&endpoint, &context),
        )
        .await
        .map_err(|fault| self.call_failed(&endpoint, fault))?;

        tracing::info!(producer_id = %self.id(), "deregistered from producer");
        self.erase_local_registration();
        Ok(())
    }

    /// Drop the handle and go back to the undetermined state, locally only.
    pub fn erase_local_registration(&self) {
        let orch = &self.orchestrator;
        orch.negotiator().erase();
        orch.clear_modify_pending();
        orch.cache().invalidate();
        orch.persist();
    }

    pub fn set_registration_property(&self, name: QName, value: Option<String>) -> bool {
        let changed = self.orchestrator.negotiator().set_property(name, value);
        if changed {
            self.orchestrator.cache().invalidate();
            self.orchestrator.persist();
        }
        changed
    }

    pub fn remove_registration_property(&self, name: &QName) -> bool {
        let removed = self.orchestrator.negotiator().remove_property(name);
        if removed {
            self.orchestrator.cache().invalidate();
            self.orchestrator.persist();
        }
        removed
    }

    /// Fetch the producer's registration property descriptions.
    pub async fn property_descriptions(&self) -> Result<Vec<PropertyDescription>> {
        let orch = &self.orchestrator;
        let endpoint = self.reachable_endpoint().await?;
        let context = orch.negotiator().context();
        with_deadline(
            orch.pool().timeout(),
            orch.transport()
                .get_registration_property_descriptions(&endpoint, context.as_ref()),
        )
        .await
        .map_err(|fault| self.call_failed(&endpoint, fault))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Configuration
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn set_cache_ttl(&self, ttl_secs: i64) {
        self.orchestrator.cache().set_ttl(ttl_secs);
        self.orchestrator.persist();
    }

    pub fn set_endpoint_address(&self, address: &str) -> Result<()> {
        self.orchestrator.pool().configure(address)?;
        self.orchestrator.cache().invalidate();
        self.orchestrator.persist();
        Ok(())
    }

    pub fn set_timeout_ms(&self, timeout_ms: i64) {
        self.orchestrator.pool().set_timeout_ms(timeout_ms);
        self.orchestrator.persist();
    }

    // ── helpers ────────────────────────────────────────────────────

    async fn reachable_endpoint(&self) -> Result<String> {
        self.orchestrator.reachable_endpoint().await.ok_or_else(|| {
            Error::NoEndpoint(format!("no endpoint of producer '{}' answered", self.id()))
        })
    }

    fn call_failed(&self, endpoint: &str, fault: Fault) -> Error {
        if fault.kind.is_transport() {
            self.orchestrator.fail_over(endpoint);
        }
        Error::invocation(fault)
    }
}

/// Turn a refresh outcome with issues into a typed error.
fn check_refresh(result: &RefreshResult) -> Result<()> {
    let message = || {
        result
            .message
            .clone()
            .unwrap_or_else(|| "producer metadata unavailable".into())
    };
    match result.effective_status() {
        RefreshStatus::Success | RefreshStatus::Bypassed => Ok(()),
        RefreshStatus::RegistrationRequired => Err(Error::Registration(format!(
            "modify registration required: {}",
            message()
        ))),
        RefreshStatus::Failure if result.registration.as_ref().is_some_and(|r| r.has_issues()) => {
            let names: Vec<String> = result
                .registration
                .iter()
                .flat_map(|r| r.properties.iter().map(|p| p.name.to_string()))
                .collect();
            Err(Error::Registration(format!(
                "{} ({})",
                message(),
                names.join(", ")
            )))
        }
        RefreshStatus::Failure | RefreshStatus::Unavailable => Err(Error::Invocation {
            message: message(),
            cause: None,
        }),
    }
}

fn rewrite_content(
    mut content: MarkupContent,
    namespace: &str,
    urls: &dyn UrlGenerator,
) -> MarkupContent {
    if content.requires_rewriting {
        if let Some(markup) = content.markup.take() {
            content.markup = Some(rewrite_wsrp_tokens(&markup, namespace, urls));
        }
    }
    content
}

/// An action yields a redirect or a state update, never both.
fn action_response(response: InteractionResponse) -> Result<ContainerResponse> {
    match (response.redirect_url, response.update) {
        (Some(_), Some(_)) => Err(Error::InconsistentResponse(
            "interaction response carries both a redirect and a state update".into(),
        )),
        (Some(url), None) => Ok(ContainerResponse::Redirect(url)),
        (None, Some(update)) => Ok(ContainerResponse::Update(update)),
        (None, None) => Ok(ContainerResponse::Update(StateUpdate::default())),
    }
}
