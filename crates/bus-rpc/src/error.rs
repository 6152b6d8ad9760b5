//! Error types for the endpoint layer

use crate::signature::SignatureError;
use shared_bus::BusError;
use thiserror::Error;

/// Error returned by user handlers.
///
/// Never surfaced to the invoker: in bus-mediated mode it drives
/// redelivery, in direct mode it drives the local retry loop.
pub type HandlerError = shared_bus::HandlerError;

/// Errors raised synchronously by the binder or by a callable.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The handler's declared shape is not a single-argument, error-returning function.
    #[error("invalid handler signature: {0}")]
    Signature(#[from] SignatureError),

    /// Topic creation, subscribe or publish failed against the bus.
    #[error("bus connection error: {0}")]
    Connection(#[from] BusError),

    /// A registration was consumed a second time.
    #[error("registration {topic}/{group} already connected")]
    AlreadyConnected { topic: String, group: String },

    /// The binding has neither a local handler nor a bus to reach one.
    #[error("function {name} has no handler and no publisher")]
    Unroutable { name: String },

    /// Serving was requested from endpoints without a consumer group.
    #[error("function {name} cannot be served without a consumer group")]
    NotServing { name: String },

    /// A direct-mode call was made outside of a Tokio runtime.
    #[error("no async runtime available to run {name}")]
    NoRuntime { name: String },
}

impl EndpointError {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EndpointError::Signature(_) => "endpoint_signature",
            EndpointError::Connection(_) => "endpoint_connection",
            EndpointError::AlreadyConnected { .. } => "endpoint_already_connected",
            EndpointError::Unroutable { .. } => "endpoint_unroutable",
            EndpointError::NotServing { .. } => "endpoint_not_serving",
            EndpointError::NoRuntime { .. } => "endpoint_no_runtime",
        }
    }
}
