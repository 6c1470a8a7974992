//! Registration negotiation.
//!
//! [`RegistrationNegotiator`] owns the live [`RegistrationState`] of one
//! producer and reconciles it against what the producer declares it
//! expects. The result is a [`RegistrationOutcome`]; the negotiator never
//! talks to the network itself.

use std::collections::HashSet;

use parking_lot::Mutex;

use wc_domain::config::ConsumerConfig;
use wc_domain::registration::{
    PropertyDescription, PropertyStatus, QName, RegistrationProperty, RegistrationRequirement,
    RegistrationState,
};
use wc_domain::trace::TraceEvent;

use crate::protocol::{RegistrationContext, RegistrationData, ServiceDescription};

/// What the producer declared about registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationRequirements {
    pub requires_registration: bool,
    pub properties: Vec<PropertyDescription>,
}

impl From<&ServiceDescription> for RegistrationRequirements {
    fn from(desc: &ServiceDescription) -> Self {
        Self {
            requires_registration: desc.requires_registration,
            properties: desc.registration_properties.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStatus {
    /// Nothing changed since the last negotiation; nothing was checked.
    Bypassed,
    Success,
    /// Unresolved issues and no handle to update.
    Failure,
    /// Unresolved issues, but we are registered and can send an update.
    ModifyRegistrationRequired,
}

impl NegotiationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NegotiationStatus::Bypassed => "bypassed",
            NegotiationStatus::Success => "success",
            NegotiationStatus::Failure => "failure",
            NegotiationStatus::ModifyRegistrationRequired => "modify_registration_required",
        }
    }
}

/// Result of [`RegistrationNegotiator::reconcile`].
///
/// On success or bypass `properties` is a snapshot of every local property;
/// otherwise it holds only the properties that caused the issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub status: NegotiationStatus,
    pub properties: Vec<RegistrationProperty>,
}

impl RegistrationOutcome {
    pub fn has_issues(&self) -> bool {
        matches!(
            self.status,
            NegotiationStatus::Failure | NegotiationStatus::ModifyRegistrationRequired
        )
    }
}

/// Thread-safe holder of a producer's registration state.
#[derive(Debug)]
pub struct RegistrationNegotiator {
    producer_id: String,
    state: Mutex<RegistrationState>,
}

impl RegistrationNegotiator {
    pub fn new(producer_id: impl Into<String>, state: RegistrationState) -> Self {
        Self {
            producer_id: producer_id.into(),
            state: Mutex::new(state),
        }
    }

    /// Reconcile local properties with the producer's expectations.
    ///
    /// * `merge_with_local`: adopt missing expected properties into the live
    ///   state (as `MissingValue`) instead of only reporting them.
    /// * `force_refresh`: negotiate even if nothing changed locally.
    /// * `force_extra_property_check`: keep unexpected local properties
    ///   (marked `Invalid`) instead of dropping them while merging.
    pub fn reconcile(
        &self,
        requirements: &RegistrationRequirements,
        merge_with_local: bool,
        force_refresh: bool,
        force_extra_property_check: bool,
    ) -> RegistrationOutcome {
        let mut state = self.state.lock();

        if !force_refresh && !state.is_undetermined() && !state.is_modified_since_refresh() {
            return RegistrationOutcome {
                status: NegotiationStatus::Bypassed,
                properties: state.properties(),
            };
        }

        let outcome = if !requirements.requires_registration {
            state.set_requirement(RegistrationRequirement::NotRequired);
            RegistrationOutcome {
                status: NegotiationStatus::Success,
                properties: state.properties(),
            }
        } else {
            let keep_extra = !merge_with_local || force_extra_property_check;
            let mut issues = Vec::new();

            for description in &requirements.properties {
                match state.property(&description.name).map(|p| p.status) {
                    Some(status) => {
                        state.set_description(description.clone());
                        if status.is_problem() {
                            if let Some(prop) = state.property(&description.name) {
                                issues.push(prop.clone());
                            }
                        }
                    }
                    None if merge_with_local => {
                        issues.push(state.adopt_missing(description.clone()));
                    }
                    None => {
                        let mut prop = RegistrationProperty::new(
                            description.name.clone(),
                            None,
                            PropertyStatus::Missing,
                        );
                        prop.description = Some(description.clone());
                        issues.push(prop);
                    }
                }
            }

            let expected: HashSet<&QName> =
                requirements.properties.iter().map(|d| &d.name).collect();
            issues.extend(check_extra_properties(&mut state, &expected, keep_extra));

            state.set_requirement(RegistrationRequirement::Required);

            if issues.is_empty() {
                RegistrationOutcome {
                    status: NegotiationStatus::Success,
                    properties: state.properties(),
                }
            } else if state.is_registered() {
                RegistrationOutcome {
                    status: NegotiationStatus::ModifyRegistrationRequired,
                    properties: issues,
                }
            } else {
                RegistrationOutcome {
                    status: NegotiationStatus::Failure,
                    properties: issues,
                }
            }
        };

        state.clear_modified();
        let registered = state.is_registered();
        drop(state);

        tracing::debug!(
            producer_id = %self.producer_id,
            status = outcome.status.as_str(),
            issues = if outcome.has_issues() { outcome.properties.len() } else { 0 },
            "registration negotiated"
        );
        TraceEvent::RegistrationNegotiated {
            producer: self.producer_id.clone(),
            status: outcome.status.as_str().to_owned(),
            registered,
            issues: if outcome.has_issues() {
                outcome.properties.len()
            } else {
                0
            },
        }
        .emit();

        outcome
    }

    // ── state access ───────────────────────────────────────────────

    /// Copy of the current state.
    pub fn snapshot(&self) -> RegistrationState {
        self.state.lock().clone()
    }

    /// Run `f` against the live state under the lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut RegistrationState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn requirement(&self) -> RegistrationRequirement {
        self.state.lock().requirement()
    }

    pub fn is_registered(&self) -> bool {
        self.state.lock().is_registered()
    }

    pub fn is_consistent(&self) -> bool {
        self.state.lock().is_consistent()
    }

    pub fn has_local_info(&self) -> bool {
        self.state.lock().has_local_info()
    }

    /// Context to attach to calls, if registered.
    pub fn context(&self) -> Option<RegistrationContext> {
        let state = self.state.lock();
        state.handle().map(|handle| RegistrationContext {
            handle: handle.to_owned(),
            state: state.opaque_state().map(<[u8]>::to_vec),
        })
    }

    /// Payload for `register` / `modify_registration`.
    pub fn registration_data(&self, consumer: &ConsumerConfig) -> RegistrationData {
        let state = self.state.lock();
        RegistrationData {
            consumer_name: state.consumer_name().to_owned(),
            consumer_agent: consumer.agent.clone(),
            method_get_supported: consumer.method_get_supported,
            properties: state.properties(),
        }
    }

    pub fn set_property(&self, name: QName, value: Option<String>) -> bool {
        self.state.lock().set_property_value(name, value)
    }

    pub fn remove_property(&self, name: &QName) -> bool {
        self.state.lock().remove_property(name).is_some()
    }

    pub fn mark_registered(&self, handle: String, opaque_state: Option<Vec<u8>>) {
        self.state.lock().mark_registered(handle, opaque_state);
    }

    pub fn clear_handle(&self) {
        self.state.lock().clear_handle();
    }

    pub fn erase(&self) {
        self.state.lock().erase();
    }
}

/// Mark (or drop) local properties the producer does not expect.
fn check_extra_properties(
    state: &mut RegistrationState,
    expected: &HashSet<&QName>,
    keep_extra: bool,
) -> Vec<RegistrationProperty> {
    let extra: Vec<QName> = state
        .property_names()
        .into_iter()
        .filter(|name| !expected.contains(name))
        .collect();

    let mut issues = Vec::with_capacity(extra.len());
    for name in extra {
        if keep_extra {
            state.set_status(&name, PropertyStatus::Invalid);
            if let Some(prop) = state.property(&name) {
                issues.push(prop.clone());
            }
        } else if let Some(mut prop) = state.remove_property(&name) {
            prop.status = PropertyStatus::Invalid;
            issues.push(prop);
        }
    }
    issues
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
