//! Transport boundary.
//!
//! A [`ProducerTransport`] performs the actual RPC against one endpoint
//! address. Every failure is classified into a [`Fault`] here, once; the
//! rest of the consumer only matches on [`FaultKind`](wc_domain::fault::FaultKind).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use wc_domain::fault::{Fault, FaultKind};
use wc_domain::registration::PropertyDescription;

use crate::protocol::{
    Cookie, InteractionRequest, InteractionResponse, MarkupRequest, MarkupResponse,
    RegistrationContext, RegistrationData, ResourceRequest, ResourceResponse,
    ServiceDescription,
};

/// RPC operations offered by a producer endpoint.
#[async_trait]
pub trait ProducerTransport: Send + Sync {
    /// Cheap reachability probe run before a metadata fetch.
    async fn check_endpoint(&self, _endpoint: &str) -> Result<(), Fault> {
        Ok(())
    }

    /// Unregistered view when `registration` is `None`.
    async fn get_service_description(
        &self,
        endpoint: &str,
        registration: Option<&RegistrationContext>,
    ) -> Result<ServiceDescription, Fault>;

    async fn register(
        &self,
        endpoint: &str,
        data: &RegistrationData,
    ) -> Result<RegistrationContext, Fault>;

    /// Returns the new opaque registration state, if the producer sent one.
    async fn modify_registration(
        &self,
        endpoint: &str,
        registration: &RegistrationContext,
        data: &RegistrationData,
    ) -> Result<Option<Vec<u8>>, Fault>;

    async fn deregister(
        &self,
        endpoint: &str,
        registration: &RegistrationContext,
    ) -> Result<(), Fault>;

    async fn get_markup(
        &self,
        endpoint: &str,
        request: &MarkupRequest,
    ) -> Result<MarkupResponse, Fault>;

    async fn perform_blocking_interaction(
        &self,
        endpoint: &str,
        request: &InteractionRequest,
    ) -> Result<InteractionResponse, Fault>;

    async fn get_resource(
        &self,
        endpoint: &str,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, Fault>;

    async fn init_cookie(
        &self,
        endpoint: &str,
        registration: Option<&RegistrationContext>,
    ) -> Result<Vec<Cookie>, Fault>;

    async fn get_registration_property_descriptions(
        &self,
        endpoint: &str,
        registration: Option<&RegistrationContext>,
    ) -> Result<Vec<PropertyDescription>, Fault>;
}

/// Run one transport call under a deadline. Running out of time is a
/// [`FaultKind::Timeout`](wc_domain::fault::FaultKind::Timeout), which takes
/// the same failover path as an unreachable endpoint.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, Fault>
where
    F: Future<Output = Result<T, Fault>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(Fault::new(
            FaultKind::Timeout,
            format!("no response within {} ms", deadline.as_millis()),
        )),
    }
}
