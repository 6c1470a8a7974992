//! Producer faults, classified once at the transport boundary.
//!
//! Transport adapters translate whatever their wire layer raises into a
//! [`Fault`] carrying a [`FaultKind`]. Everything above the transport
//! matches on the kind instead of inspecting concrete error types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of failure reported by (or on the way to) a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The producer rejected the cookies sent with the request.
    InvalidCookie,
    /// The producer no longer knows the session id sent with the request.
    InvalidSession,
    /// The registration handle is unknown to the producer.
    InvalidRegistration,
    /// The producer wants the consumer to modify its registration first.
    ModifyRegistrationRequired,
    /// Generic producer-side operation failure.
    OperationFailed,
    /// The remote item handle is unknown.
    InvalidHandle,
    AccessDenied,
    MissingParameters,
    /// The endpoint could not be reached.
    Unreachable,
    /// The endpoint's service description (WSDL) could not be parsed.
    ServiceDescription,
    /// No answer within the per-operation timeout.
    Timeout,
    /// Wrapper around another fault (remote exception, SOAP fault envelope).
    Remote,
}

impl FaultKind {
    /// Endpoint-level failure: fail over to another endpoint and retry.
    pub fn is_transport(self) -> bool {
        matches!(
            self,
            FaultKind::Unreachable | FaultKind::ServiceDescription | FaultKind::Timeout
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            FaultKind::InvalidCookie => "invalid cookie",
            FaultKind::InvalidSession => "invalid session",
            FaultKind::InvalidRegistration => "invalid registration",
            FaultKind::ModifyRegistrationRequired => "modify registration required",
            FaultKind::OperationFailed => "operation failed",
            FaultKind::InvalidHandle => "invalid handle",
            FaultKind::AccessDenied => "access denied",
            FaultKind::MissingParameters => "missing parameters",
            FaultKind::Unreachable => "endpoint unreachable",
            FaultKind::ServiceDescription => "unparseable service description",
            FaultKind::Timeout => "timeout",
            FaultKind::Remote => "remote exception",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified producer fault, optionally wrapping the fault that caused it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    #[source]
    pub cause: Option<Box<Fault>>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn wrapping(kind: FaultKind, message: impl Into<String>, cause: Fault) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// The fault worth showing to a user: one level of `Remote` wrapping is
    /// peeled off, anything deeper is kept as-is.
    pub fn readable(&self) -> &Fault {
        match (&self.kind, &self.cause) {
            (FaultKind::Remote, Some(cause)) => cause,
            _ => self,
        }
    }

    /// Kind used for recovery decisions (looks through one `Remote` wrapper).
    pub fn effective_kind(&self) -> FaultKind {
        self.readable().kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kinds() {
        assert!(FaultKind::Unreachable.is_transport());
        assert!(FaultKind::ServiceDescription.is_transport());
        assert!(FaultKind::Timeout.is_transport());
        assert!(!FaultKind::InvalidSession.is_transport());
        assert!(!FaultKind::Remote.is_transport());
    }

    #[test]
    fn readable_peels_only_one_level() {
        let root = Fault::new(FaultKind::InvalidHandle, "no such item");
        let mid = Fault::wrapping(FaultKind::Remote, "wrapped once", root);
        let top = Fault::wrapping(FaultKind::Remote, "wrapped twice", mid.clone());

        assert_eq!(top.readable(), &mid);
        assert_eq!(mid.readable().kind, FaultKind::InvalidHandle);
        assert_eq!(top.effective_kind(), FaultKind::Remote);
    }

    #[test]
    fn display_includes_kind() {
        let f = Fault::new(FaultKind::InvalidCookie, "cookie expired");
        assert_eq!(f.to_string(), "invalid cookie: cookie expired");
    }
}
