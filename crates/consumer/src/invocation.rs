//! Invocation pipeline: one remote call with bounded retry and fault recovery.
//!
//! Each attempt attaches the current registration context, the session's
//! cookies and the item's producer session id, then runs the operation
//! under the pool's per-call deadline. Faults are matched on their kind:
//!
//! | Fault                         | Recovery before the next attempt             |
//! |-------------------------------|----------------------------------------------|
//! | invalid cookie                | forced refresh, cookies re-initialized       |
//! | invalid session               | item session id dropped, full state resent   |
//! | invalid registration          | local registration erased, forced refresh    |
//! | modify registration required  | modify-registration with current properties  |
//! | unreachable / WSDL / timeout  | endpoint failed over (fatal if none is left) |
//! | anything else                 | none: terminal [`Error::Invocation`]         |

use std::sync::Arc;

use wc_domain::error::{Error, Result};
use wc_domain::fault::{Fault, FaultKind};
use wc_domain::trace::TraceEvent;

use crate::operation::RemoteOperation;
use crate::protocol::CallContext;
use crate::refresh::RefreshOrchestrator;
use crate::session::ConsumerSession;
use crate::transport::with_deadline;

/// Retries allowed after the first attempt.
pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct InvocationPipeline {
    orchestrator: Arc<RefreshOrchestrator>,
}

impl InvocationPipeline {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn invoke<O: RemoteOperation>(
        &self,
        operation: &O,
        session: &ConsumerSession,
    ) -> Result<O::Response> {
        let orch = &self.orchestrator;
        let producer = orch.producer_id();
        let handle = operation.target().item_handle.as_str();

        for attempt in 1..=MAX_RETRIES + 1 {
            let endpoint = orch.pool().select_endpoint(session.is_authenticated())?;

            let fault = match self.attempt(operation, session, &endpoint.address).await {
                Ok(response) => {
                    session.update(producer, handle, O::session_context(&response));
                    return Ok(response);
                }
                Err(fault) => fault,
            };

            match fault.effective_kind() {
                FaultKind::InvalidCookie => {
                    let refreshed = orch.ensure_fresh(true).await;
                    if refreshed.has_issues() {
                        tracing::warn!(
                            producer_id = %producer,
                            status = refreshed.effective_status().as_str(),
                            "refresh after invalid cookie had issues"
                        );
                    }
                    session.reset_cookies(producer);
                }
                FaultKind::InvalidSession => {
                    session.invalidate(producer, handle);
                }
                FaultKind::InvalidRegistration => {
                    orch.negotiator().erase();
                    orch.clear_modify_pending();
                    orch.cache().invalidate();
                    let refreshed = orch.ensure_fresh(true).await;
                    if refreshed.has_issues() {
                        return Err(self.fail(
                            operation,
                            attempt,
                            Error::Registration(refreshed.message.unwrap_or_else(|| {
                                "registration could not be re-established".into()
                            })),
                        ));
                    }
                }
                FaultKind::ModifyRegistrationRequired => {
                    let Some(context) = orch.negotiator().context() else {
                        return Err(self.fail(operation, attempt, Error::invocation(fault)));
                    };
                    if let Err(modify_fault) = orch
                        .modify_registration_with(&endpoint.address, &context)
                        .await
                    {
                        return Err(self.fail(operation, attempt, Error::invocation(modify_fault)));
                    }
                }
                kind if kind.is_transport() => {
                    if let Err(e) = orch.pool().mark_failed(&endpoint.address) {
                        return Err(self.fail(operation, attempt, e));
                    }
                }
                _ => return Err(self.fail(operation, attempt, Error::invocation(fault))),
            }

            tracing::debug!(
                producer_id = %producer,
                operation = operation.name(),
                item = %handle,
                attempt,
                fault = %fault,
                "retrying remote operation"
            );
            TraceEvent::InvocationRetried {
                producer: producer.to_owned(),
                operation: operation.name().to_owned(),
                item: handle.to_owned(),
                attempt,
                fault: fault.kind.to_string(),
            }
            .emit();
        }

        Err(self.fail(
            operation,
            MAX_RETRIES + 1,
            Error::RetriesExhausted {
                attempts: MAX_RETRIES + 1,
                message: "no response from the producer; the transport layer likely dropped \
                          messages, check the endpoint and network configuration"
                    .into(),
            },
        ))
    }

    /// Cookie initialization (when needed) plus the call itself.
    async fn attempt<O: RemoteOperation>(
        &self,
        operation: &O,
        session: &ConsumerSession,
        endpoint: &str,
    ) -> std::result::Result<O::Response, Fault> {
        let orch = &self.orchestrator;
        let producer = orch.producer_id();
        let deadline = orch.pool().timeout();
        let registration = orch.negotiator().context();

        let needs_cookies = orch
            .metadata()
            .is_some_and(|md| md.cookie_protocol().requires_init());
        if needs_cookies && !session.cookies_initialized(producer) {
            let cookies = with_deadline(
                deadline,
                orch.transport().init_cookie(endpoint, registration.as_ref()),
            )
            .await?;
            session.set_cookies(producer, cookies);
        }

        let target = operation.target();
        let context = CallContext {
            registration,
            session_id: session.session_id(producer, &target.item_handle),
            cookies: session.cookies(producer),
            user: session.user().cloned(),
            namespace: target.namespace.clone(),
        };

        with_deadline(
            deadline,
            operation.perform(orch.transport().as_ref(), endpoint, context),
        )
        .await
    }

    fn fail<O: RemoteOperation>(&self, operation: &O, attempts: u32, error: Error) -> Error {
        tracing::warn!(
            producer_id = %self.orchestrator.producer_id(),
            operation = operation.name(),
            item = %operation.target().item_handle,
            attempts,
            error = %error,
            "remote operation failed"
        );
        TraceEvent::InvocationFailed {
            producer: self.orchestrator.producer_id().to_owned(),
            operation: operation.name().to_owned(),
            item: operation.target().item_handle.clone(),
            attempts,
            reason: error.to_string(),
        }
        .emit();
        error
    }
}
