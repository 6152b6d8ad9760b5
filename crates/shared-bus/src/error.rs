//! Error types for bus operations.

use thiserror::Error;

/// Errors returned by topic administration, publish and subscribe.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The topic has not been created.
    #[error("topic not found: {topic}")]
    TopicNotFound { topic: String },

    /// Topic or group name is empty or contains whitespace.
    #[error("invalid name: {name:?}")]
    InvalidName { name: String },

    /// Requested worker count is outside `1..=MAX_CONCURRENCY`.
    #[error("invalid concurrency {requested} (must be 1..={max})")]
    InvalidConcurrency { requested: usize, max: usize },

    /// The value could not be serialized into a payload.
    #[error("payload encoding failed: {0}")]
    Encode(String),

    /// The bus client has been shut down.
    #[error("bus closed")]
    Closed,
}

impl BusError {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::TopicNotFound { .. } => "bus_topic_not_found",
            BusError::InvalidName { .. } => "bus_invalid_name",
            BusError::InvalidConcurrency { .. } => "bus_invalid_concurrency",
            BusError::Encode(_) => "bus_encode",
            BusError::Closed => "bus_closed",
        }
    }
}

/// Reject empty names and names containing whitespace.
pub(crate) fn validate_name(name: &str) -> Result<(), BusError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(BusError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}
