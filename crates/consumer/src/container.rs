//! Hosting-container SPI.
//!
//! The container hands the consumer an [`Invocation`] and expects a
//! [`ContainerResponse`] back. URL generation for rewritten markup is the
//! container's job, exposed through [`UrlGenerator`].

use std::collections::BTreeMap;

use wc_domain::error::Error;

use crate::protocol::{MarkupContent, MarkupParams, StateUpdate, UserContext};
use crate::url::WsrpUrl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    Render,
    Action,
    Resource,
}

/// Window the item is displayed in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WindowContext {
    pub id: String,
    /// Prefix substituted for `wsrp_rewrite_` tokens.
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityContext {
    pub secure: bool,
    pub auth_type: Option<String>,
}

/// One request from the container for a remote item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub item_handle: String,
    pub kind: InvocationKind,
    pub user: Option<UserContext>,
    pub security: SecurityContext,
    pub window: WindowContext,
    pub navigational_state: Option<String>,
    pub mode: String,
    pub window_state: String,
    pub locales: Vec<String>,
    /// Action only.
    pub interaction_state: Option<String>,
    /// Action only.
    pub form_parameters: Vec<(String, String)>,
    /// Resource only.
    pub resource_id: Option<String>,
    /// Resource only.
    pub resource_state: Option<String>,
}

impl Invocation {
    pub fn render(item_handle: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::new(item_handle, InvocationKind::Render, namespace)
    }

    pub fn action(item_handle: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::new(item_handle, InvocationKind::Action, namespace)
    }

    pub fn resource(item_handle: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::new(item_handle, InvocationKind::Resource, namespace)
    }

    fn new(
        item_handle: impl Into<String>,
        kind: InvocationKind,
        namespace: impl Into<String>,
    ) -> Self {
        let namespace = namespace.into();
        Self {
            item_handle: item_handle.into(),
            kind,
            user: None,
            security: SecurityContext::default(),
            window: WindowContext {
                id: namespace.clone(),
                namespace,
            },
            navigational_state: None,
            mode: "wsrp:view".into(),
            window_state: "wsrp:normal".into(),
            locales: vec!["en".into()],
            interaction_state: None,
            form_parameters: Vec::new(),
            resource_id: None,
            resource_state: None,
        }
    }

    pub(crate) fn markup_params(&self) -> MarkupParams {
        MarkupParams {
            mode: self.mode.clone(),
            window_state: self.window_state.clone(),
            navigational_state: self.navigational_state.clone(),
            locales: self.locales.clone(),
            mime_types: vec!["text/html".into()],
            secure: self.security.secure,
        }
    }
}

/// What the consumer hands back to the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerResponse {
    Content(MarkupContent),
    Redirect(String),
    Update(StateUpdate),
    Error(ErrorResponse),
}

impl ContainerResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, ContainerResponse::Error(_))
    }
}

/// Terminal error surfaced to the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub message: String,
    /// Diagnostic details (fault kind, cause chain).
    pub details: BTreeMap<String, String>,
}

impl From<&Error> for ErrorResponse {
    fn from(error: &Error) -> Self {
        let mut details = BTreeMap::new();
        match error {
            Error::Invocation {
                cause: Some(fault),
                ..
            } => {
                details.insert("fault".into(), fault.kind.to_string());
                if let Some(cause) = &fault.cause {
                    details.insert("cause".into(), cause.to_string());
                }
            }
            Error::RetriesExhausted { attempts, .. } => {
                details.insert("attempts".into(), attempts.to_string());
            }
            _ => {}
        }
        Self {
            message: error.to_string(),
            details,
        }
    }
}

/// Builds container URLs for parsed rewrite tokens.
pub trait UrlGenerator: Send + Sync {
    fn url(&self, url: &WsrpUrl, namespace: &str) -> String;
}

/// `{base}?{query}`, with the window namespace as a parameter.
#[derive(Debug, Clone)]
pub struct BaseUrlGenerator {
    base: String,
}

impl BaseUrlGenerator {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }
}

impl UrlGenerator for BaseUrlGenerator {
    fn url(&self, url: &WsrpUrl, namespace: &str) -> String {
        let separator = if self.base.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}&ns={}",
            self.base,
            separator,
            url.to_query_string(),
            urlencoding::encode(namespace)
        )
    }
}
