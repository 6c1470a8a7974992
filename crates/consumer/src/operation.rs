//! Per-operation adapters run by the invocation pipeline.

use async_trait::async_trait;

use wc_domain::fault::Fault;

use crate::protocol::{
    CallContext, InteractionRequest, InteractionResponse, MarkupParams, MarkupRequest,
    MarkupResponse, ResourceRequest, ResourceResponse, SessionContext,
};
use crate::transport::ProducerTransport;

/// Item, window namespace and window parameters every operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationTarget {
    pub item_handle: String,
    pub namespace: String,
    pub params: MarkupParams,
}

/// One remote call, re-runnable on every retry attempt.
#[async_trait]
pub trait RemoteOperation: Send + Sync {
    type Response: Send;

    fn name(&self) -> &'static str;

    fn target(&self) -> &OperationTarget;

    async fn perform(
        &self,
        transport: &dyn ProducerTransport,
        endpoint: &str,
        context: CallContext,
    ) -> Result<Self::Response, Fault>;

    fn session_context(response: &Self::Response) -> Option<&SessionContext>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Render
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct RenderOperation {
    pub target: OperationTarget,
}

#[async_trait]
impl RemoteOperation for RenderOperation {
    type Response = MarkupResponse;

    fn name(&self) -> &'static str {
        "render"
    }

    fn target(&self) -> &OperationTarget {
        &self.target
    }

    async fn perform(
        &self,
        transport: &dyn ProducerTransport,
        endpoint: &str,
        context: CallContext,
    ) -> Result<MarkupResponse, Fault> {
        let request = MarkupRequest {
            item_handle: self.target.item_handle.clone(),
            context,
            params: self.target.params.clone(),
        };
        transport.get_markup(endpoint, &request).await
    }

    fn session_context(response: &MarkupResponse) -> Option<&SessionContext> {
        response.session_context.as_ref()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Action
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct ActionOperation {
    pub target: OperationTarget,
    pub interaction_state: Option<String>,
    pub form_parameters: Vec<(String, String)>,
}

#[async_trait]
impl RemoteOperation for ActionOperation {
    type Response = InteractionResponse;

    fn name(&self) -> &'static str {
        "action"
    }

    fn target(&self) -> &OperationTarget {
        &self.target
    }

    async fn perform(
        &self,
        transport: &dyn ProducerTransport,
        endpoint: &str,
        context: CallContext,
    ) -> Result<InteractionResponse, Fault> {
        let request = InteractionRequest {
            item_handle: self.target.item_handle.clone(),
            context,
            params: self.target.params.clone(),
            interaction_state: self.interaction_state.clone(),
            form_parameters: self.form_parameters.clone(),
        };
        transport.perform_blocking_interaction(endpoint, &request).await
    }

    fn session_context(response: &InteractionResponse) -> Option<&SessionContext> {
        response.session_context.as_ref()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resource
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct ResourceOperation {
    pub target: OperationTarget,
    pub resource_id: Option<String>,
    pub resource_state: Option<String>,
}

#[async_trait]
impl RemoteOperation for ResourceOperation {
    type Response = ResourceResponse;

    fn name(&self) -> &'static str {
        "resource"
    }

    fn target(&self) -> &OperationTarget {
        &self.target
    }

    async fn perform(
        &self,
        transport: &dyn ProducerTransport,
        endpoint: &str,
        context: CallContext,
    ) -> Result<ResourceResponse, Fault> {
        let request = ResourceRequest {
            item_handle: self.target.item_handle.clone(),
            context,
            params: self.target.params.clone(),
            resource_id: self.resource_id.clone(),
            resource_state: self.resource_state.clone(),
        };
        transport.get_resource(endpoint, &request).await
    }

    fn session_context(response: &ResourceResponse) -> Option<&SessionContext> {
        response.session_context.as_ref()
    }
}
