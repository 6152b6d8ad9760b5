//! # Publisher
//!
//! Defines the publishing side of the bus: topic creation and publish.

use crate::error::BusError;
use crate::message::{MessageId, TopicSpec};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Trait for creating topics and publishing payloads.
///
/// Implementations must be safe for concurrent use; one client is shared
/// by every binding in a process.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Create a topic. Creating an existing topic is a no-op.
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), BusError>;

    /// Publish an encoded payload to a topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<MessageId, BusError>;
}

/// The publisher role of a process.
#[derive(Clone)]
pub struct PublisherHandle {
    publisher: Arc<dyn Publisher>,
}

impl PublisherHandle {
    /// Wrap a bus client.
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }

    /// Create a topic (idempotent).
    pub async fn create_topic(&self, spec: &TopicSpec) -> Result<(), BusError> {
        self.publisher.create_topic(spec).await
    }

    /// Encode `value` as JSON and publish it.
    pub async fn publish_json<T>(&self, topic: &str, value: &T) -> Result<MessageId, BusError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(value).map_err(|e| BusError::Encode(e.to_string()))?;
        let id = self.publisher.publish(topic, payload).await?;
        debug!(topic = topic, message_id = %id, "Payload published");
        Ok(id)
    }
}

impl std::fmt::Debug for PublisherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherHandle").finish_non_exhaustive()
    }
}
