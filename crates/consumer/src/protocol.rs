//! Protocol data types exchanged with a remote producer.
//!
//! These mirror the WSRP operations the consumer uses. The wire encoding is
//! the transport's business; the core only reads and fills these structs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wc_domain::registration::{PropertyDescription, QName, RegistrationProperty};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Service description
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// When (and for whom) the producer wants `init_cookie` called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CookieProtocol {
    #[default]
    None,
    PerUser,
    PerGroup,
}

impl CookieProtocol {
    pub fn requires_init(self) -> bool {
        !matches!(self, CookieProtocol::None)
    }
}

/// A remote item (portlet) the producer offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferedItem {
    pub handle: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_types: Vec<String>,
    #[serde(default)]
    pub modes: Vec<String>,
    #[serde(default)]
    pub window_states: Vec<String>,
}

impl OfferedItem {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            title: None,
            description: None,
            mime_types: Vec::new(),
            modes: Vec::new(),
            window_states: Vec::new(),
        }
    }
}

/// A producer-declared custom mode or window state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionDescription {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescription {
    pub name: QName,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Everything `get_service_description` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServiceDescription {
    #[serde(default)]
    pub requires_registration: bool,
    #[serde(default)]
    pub registration_properties: Vec<PropertyDescription>,
    #[serde(default)]
    pub offered_items: Vec<OfferedItem>,
    #[serde(default)]
    pub custom_modes: Vec<ExtensionDescription>,
    #[serde(default)]
    pub custom_window_states: Vec<ExtensionDescription>,
    #[serde(default)]
    pub events: Vec<EventDescription>,
    #[serde(default)]
    pub supported_options: Vec<String>,
    #[serde(default)]
    pub requires_init_cookie: CookieProtocol,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Handle + opaque blob sent on every call once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationContext {
    pub handle: String,
    #[serde(default)]
    pub state: Option<Vec<u8>>,
}

/// Payload of `register` / `modify_registration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationData {
    pub consumer_name: String,
    pub consumer_agent: String,
    pub method_get_supported: bool,
    pub properties: Vec<RegistrationProperty>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Call context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Producer-side session established by a previous response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    /// Seconds until the producer forgets the session; negative means never.
    #[serde(default = "d_expires")]
    pub expires_secs: i64,
}

fn d_expires() -> i64 {
    -1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserContext {
    pub user_id: String,
    #[serde(default)]
    pub profile: BTreeMap<String, String>,
}

/// Ambient data attached to every operation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CallContext {
    pub registration: Option<RegistrationContext>,
    pub session_id: Option<String>,
    pub cookies: Vec<Cookie>,
    pub user: Option<UserContext>,
    /// Window namespace prefix the producer should use for its tokens.
    pub namespace: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operation requests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Window/navigation parameters shared by every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MarkupParams {
    pub mode: String,
    pub window_state: String,
    pub navigational_state: Option<String>,
    pub locales: Vec<String>,
    pub mime_types: Vec<String>,
    pub secure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupRequest {
    pub item_handle: String,
    pub context: CallContext,
    pub params: MarkupParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRequest {
    pub item_handle: String,
    pub context: CallContext,
    pub params: MarkupParams,
    pub interaction_state: Option<String>,
    pub form_parameters: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub item_handle: String,
    pub context: CallContext,
    pub params: MarkupParams,
    pub resource_id: Option<String>,
    pub resource_state: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operation responses
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Text or binary content returned by render and resource calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MarkupContent {
    pub mime_type: String,
    pub markup: Option<String>,
    pub binary: Option<Vec<u8>>,
    /// The consumer must rewrite `wsrp_rewrite` tokens before display.
    pub requires_rewriting: bool,
    pub preferred_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupResponse {
    pub content: MarkupContent,
    pub session_context: Option<SessionContext>,
}

/// New navigational state and window settings after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StateUpdate {
    pub navigational_state: Option<String>,
    pub new_mode: Option<String>,
    pub new_window_state: Option<String>,
}

/// Result of `perform_blocking_interaction`; exactly one of
/// `redirect_url` / `update` is expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InteractionResponse {
    pub redirect_url: Option<String>,
    pub update: Option<StateUpdate>,
    pub session_context: Option<SessionContext>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub content: MarkupContent,
    pub session_context: Option<SessionContext>,
}
