//! # Bus Messages and Topics
//!
//! A [`BusMessage`] is what a subscriber sees: the raw payload plus the
//! envelope data the bus attaches (identity, origination time, attempt).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Unique identifier assigned to every published message.
pub type MessageId = Uuid;

/// Topic name plus creation flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSpec {
    /// Topic name.
    pub name: String,
    /// Reclaimed automatically once the last subscription detaches.
    pub ephemeral: bool,
}

impl TopicSpec {
    /// A durable topic.
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ephemeral: false,
        }
    }

    /// A topic reclaimed once unsubscribed.
    pub fn ephemeral(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ephemeral: true,
        }
    }
}

/// A message as delivered to a consumer group member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Identity assigned at publish time; stable across redeliveries.
    pub id: MessageId,
    /// Topic the message was published to.
    pub topic: String,
    /// Encoded payload (JSON).
    pub payload: Vec<u8>,
    /// Origination timestamp.
    pub published_at: SystemTime,
    /// 1 for the first delivery, incremented on every redelivery.
    pub delivery_attempt: u32,
}

impl BusMessage {
    /// Create a fresh message stamped with the current time.
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            payload,
            published_at: SystemTime::now(),
            delivery_attempt: 1,
        }
    }

    /// Override the origination timestamp.
    #[must_use]
    pub fn with_published_at(mut self, published_at: SystemTime) -> Self {
        self.published_at = published_at;
        self
    }

    /// Time elapsed since the message was published.
    ///
    /// Clock skew that places `published_at` in the future yields zero.
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.published_at)
            .unwrap_or(Duration::ZERO)
    }

    /// Decode the payload as JSON.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// Copy of this message for the next delivery attempt.
    pub(crate) fn redelivery(&self) -> Self {
        Self {
            delivery_attempt: self.delivery_attempt.saturating_add(1),
            ..self.clone()
        }
    }
}
