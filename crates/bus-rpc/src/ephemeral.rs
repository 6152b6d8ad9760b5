//! # Ephemeral Reply Addresses
//!
//! The bus only delivers one way. To get an answer back, a caller binds a
//! handler to a fresh, uniquely named ephemeral topic and ships that name
//! to the service inside its request:
//!
//! ```text
//!  caller A                           service B
//!  ────────                           ─────────
//!  unique("result", h) ─► "result-9f2c…" subscribed (ephemeral)
//!  call f({ reply_to: "result-9f2c…", .. }) ──────►  f runs
//!                                                    client("result-9f2c…")
//!  h(value) ◄───────────────────────────────────────  .call(value)
//! ```
//!
//! The bus reclaims the topic once A's subscription detaches. There is no
//! explicit cleanup and no cancellation.

use serde::{Deserialize, Serialize};
use shared_bus::TopicSpec;
use uuid::Uuid;

/// A random identifier safe to use in topic names.
pub fn unique_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A fresh ephemeral reply topic derived from `name`.
pub fn reply_topic(name: &str) -> TopicSpec {
    TopicSpec::ephemeral(format!("{name}-{}", unique_id()))
}

/// Where a service should send its answer.
///
/// Embed it in a request payload; the service answers with
/// `endpoints.client::<R>(&reply.topic)` or
/// [`Endpoints::reply`](crate::Endpoints::reply).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplyAddress {
    pub topic: String,
}

impl ReplyAddress {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

impl std::fmt::Display for ReplyAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.topic)
    }
}
