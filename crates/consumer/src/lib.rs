//! `wc-consumer`: client side of a WSRP-style remote portlet protocol.
//!
//! A [`ConsumerManager`] owns one [`RemoteProducer`] per configured
//! producer. Before each remote operation the producer's
//! [`RefreshOrchestrator`](refresh::RefreshOrchestrator) makes sure the
//! service description is fresh (negotiating and registering as needed),
//! then the [`InvocationPipeline`](invocation::InvocationPipeline) performs
//! the call with bounded retry and fault recovery, failing over between the
//! endpoints of the [`EndpointPool`](endpoint::EndpointPool). Returned
//! markup is post-processed by the [`rewriter`].
//!
//! The wire protocol is behind the [`ProducerTransport`] trait.

pub mod container;
pub mod endpoint;
pub mod invocation;
pub mod manager;
pub mod metadata;
pub mod operation;
pub mod producer;
pub mod protocol;
pub mod refresh;
pub mod registration;
pub mod rewriter;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod url;

pub use container::{ContainerResponse, Invocation, UrlGenerator};
pub use manager::ConsumerManager;
pub use producer::RemoteProducer;
pub use session::ConsumerSession;
pub use transport::ProducerTransport;
