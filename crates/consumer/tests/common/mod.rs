//! Scripted in-memory producer used by the integration tests.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use wc_consumer::protocol::{
    CallContext, Cookie, InteractionRequest, InteractionResponse, MarkupContent, MarkupRequest,
    MarkupResponse, OfferedItem, RegistrationContext, RegistrationData, ResourceRequest,
    ResourceResponse, ServiceDescription, SessionContext,
};
use wc_consumer::{ConsumerManager, ProducerTransport};
use wc_domain::config::{Config, EndpointConfig, ProducerConfig, RegistrationConfig};
use wc_domain::fault::{Fault, FaultKind};
use wc_domain::registration::PropertyDescription;
use wc_registry::MemoryRegistry;

#[derive(Default)]
pub struct ScriptedTransport {
    /// Unregistered view.
    pub description: Mutex<ServiceDescription>,
    /// Extra items only visible with a registration context.
    pub registered_items: Mutex<Vec<OfferedItem>>,
    pub down: Mutex<HashSet<String>>,
    pub description_faults: Mutex<VecDeque<Fault>>,
    pub markup_faults: Mutex<VecDeque<Fault>>,
    pub markup: Mutex<MarkupContent>,
    pub action_response: Mutex<InteractionResponse>,
    pub cookies: Mutex<Vec<Cookie>>,
    /// `"<operation> <endpoint>"` per call, in order.
    pub calls: Mutex<Vec<String>>,
    pub markup_contexts: Mutex<Vec<CallContext>>,
    pub registrations: Mutex<Vec<RegistrationData>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        let transport = Self::default();
        *transport.description.lock() = ServiceDescription {
            offered_items: vec![OfferedItem::new("weather")],
            ..Default::default()
        };
        *transport.markup.lock() = MarkupContent {
            mime_type: "text/html".into(),
            markup: Some("<p>sunny</p>".into()),
            ..Default::default()
        };
        Arc::new(transport)
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .count()
    }

    pub fn endpoints_for(&self, operation: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| c.strip_prefix(operation).map(|rest| rest.trim().to_owned()))
            .collect()
    }

    pub fn set_down(&self, endpoint: &str) {
        self.down.lock().insert(endpoint.to_owned());
    }

    pub fn push_markup_fault(&self, kind: FaultKind) {
        self.markup_faults
            .lock()
            .push_back(Fault::new(kind, format!("scripted {kind}")));
    }

    fn record(&self, operation: &str, endpoint: &str) -> Result<(), Fault> {
        self.calls.lock().push(format!("{operation} {endpoint}"));
        if self.down.lock().contains(endpoint) {
            return Err(Fault::new(FaultKind::Unreachable, format!("{endpoint} is down")));
        }
        Ok(())
    }
}

#[async_trait]
impl ProducerTransport for ScriptedTransport {
    async fn check_endpoint(&self, endpoint: &str) -> Result<(), Fault> {
        self.record("check", endpoint)
    }

    async fn get_service_description(
        &self,
        endpoint: &str,
        registration: Option<&RegistrationContext>,
    ) -> Result<ServiceDescription, Fault> {
        self.record("description", endpoint)?;
        if let Some(fault) = self.description_faults.lock().pop_front() {
            return Err(fault);
        }
        let mut desc = self.description.lock().clone();
        if registration.is_some() {
            desc.offered_items
                .extend(self.registered_items.lock().iter().cloned());
        }
        Ok(desc)
    }

    async fn register(
        &self,
        endpoint: &str,
        data: &RegistrationData,
    ) -> Result<RegistrationContext, Fault> {
        self.record("register", endpoint)?;
        let mut registrations = self.registrations.lock();
        registrations.push(data.clone());
        Ok(RegistrationContext {
            handle: format!("reg-{}", registrations.len()),
            state: None,
        })
    }

    async fn modify_registration(
        &self,
        endpoint: &str,
        _registration: &RegistrationContext,
        _data: &RegistrationData,
    ) -> Result<Option<Vec<u8>>, Fault> {
        self.record("modify", endpoint)?;
        Ok(Some(b"modified".to_vec()))
    }

    async fn deregister(
        &self,
        endpoint: &str,
        _registration: &RegistrationContext,
    ) -> Result<(), Fault> {
        self.record("deregister", endpoint)
    }

    async fn get_markup(
        &self,
        endpoint: &str,
        request: &MarkupRequest,
    ) -> Result<MarkupResponse, Fault> {
        self.markup_contexts.lock().push(request.context.clone());
        self.record("markup", endpoint)?;
        if let Some(fault) = self.markup_faults.lock().pop_front() {
            return Err(fault);
        }
        Ok(MarkupResponse {
            content: self.markup.lock().clone(),
            session_context: Some(SessionContext {
                session_id: "s-1".into(),
                expires_secs: -1,
            }),
        })
    }

    async fn perform_blocking_interaction(
        &self,
        endpoint: &str,
        _request: &InteractionRequest,
    ) -> Result<InteractionResponse, Fault> {
        self.record("action", endpoint)?;
        Ok(self.action_response.lock().clone())
    }

    async fn get_resource(
        &self,
        endpoint: &str,
        _request: &ResourceRequest,
    ) -> Result<ResourceResponse, Fault> {
        self.record("resource", endpoint)?;
        Ok(ResourceResponse {
            content: self.markup.lock().clone(),
            session_context: None,
        })
    }

    async fn init_cookie(
        &self,
        endpoint: &str,
        _registration: Option<&RegistrationContext>,
    ) -> Result<Vec<Cookie>, Fault> {
        self.record("init_cookie", endpoint)?;
        Ok(self.cookies.lock().clone())
    }

    async fn get_registration_property_descriptions(
        &self,
        endpoint: &str,
        _registration: Option<&RegistrationContext>,
    ) -> Result<Vec<PropertyDescription>, Fault> {
        self.record("property_descriptions", endpoint)?;
        Ok(self.description.lock().registration_properties.clone())
    }
}

pub fn producer_config(id: &str, address: &str) -> ProducerConfig {
    ProducerConfig {
        id: id.into(),
        endpoint: EndpointConfig::new(address),
        cache_ttl_secs: 300,
        registration: RegistrationConfig::default(),
    }
}

pub fn config_with(producers: Vec<ProducerConfig>) -> Config {
    Config {
        producers,
        ..Config::default()
    }
}

pub fn manager(
    config: &Config,
    transport: &Arc<ScriptedTransport>,
) -> (ConsumerManager, Arc<MemoryRegistry>) {
    let registry = Arc::new(MemoryRegistry::new());
    let manager = ConsumerManager::from_config(config, registry.clone(), transport.clone());
    (manager, registry)
}
