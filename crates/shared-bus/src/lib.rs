//! # Shared Bus - Publish/Subscribe Facade
//!
//! The narrow interface the endpoint layer consumes from a message bus,
//! plus an in-memory reference implementation.
//!
//! ## Model
//!
//! ```text
//!                  publish()
//!  ┌───────────┐ ──────────┐
//!  │ Publisher │           ▼
//!  └───────────┘    ┌──────────────┐
//!                   │    Topic     │  (optionally ephemeral)
//!                   └──────┬───────┘
//!              one copy    │    one copy
//!           ┌──────────────┴──────────────┐
//!           ▼                             ▼
//!   ┌───────────────┐             ┌───────────────┐
//!   │ Group "alpha" │             │ Group "beta"  │
//!   │ shared queue  │             │ shared queue  │
//!   └──┬─────────┬──┘             └───────┬───────┘
//!      ▼         ▼                        ▼
//!   worker    worker                   worker
//! ```
//!
//! - Every consumer group on a topic receives its own copy of each message.
//! - Members of one group compete for messages (load sharing).
//! - A handler returning `Err` causes redelivery (at-least-once).
//! - Ephemeral topics disappear once their last subscription detaches.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod error;
pub mod memory;
pub mod message;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use config::{BusConfig, TransportSecurity};
pub use error::BusError;
pub use memory::InMemoryBus;
pub use message::{BusMessage, MessageId, TopicSpec};
pub use publisher::{Publisher, PublisherHandle};
pub use subscriber::{
    handle_guarded, handler_fn, ConsumerGroupHandle, HandlerError, MessageHandler, Subscriber,
    Subscription,
};

/// Default redelivery delay after a handler reports failure, in milliseconds.
pub const DEFAULT_REDELIVERY_DELAY_MS: u64 = 100;

/// Upper bound on workers a single subscription may request.
pub const MAX_CONCURRENCY: usize = 1024;
