use crate::fault::Fault;

/// Shared error type used across all consumer crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    /// Fatal: the endpoint pool cannot hand out (or give up) an address.
    #[error("no available endpoint: {0}")]
    NoEndpoint(String),

    #[error("registration: {0}")]
    Registration(String),

    #[error("inconsistent producer response: {0}")]
    InconsistentResponse(String),

    #[error("gave up after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("invocation failed: {message}")]
    Invocation {
        message: String,
        #[source]
        cause: Option<Fault>,
    },

    #[error("registry: {0}")]
    Registry(String),

    #[error("unknown remote item: {0}")]
    UnknownItem(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an unrecoverable fault, keeping the readable cause.
    pub fn invocation(fault: Fault) -> Self {
        let cause = fault.readable().clone();
        Error::Invocation {
            message: cause.to_string(),
            cause: Some(cause),
        }
    }

    /// Whether the error can never succeed on a retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::NoEndpoint(_) | Error::Config(_))
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Error::invocation(fault)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
