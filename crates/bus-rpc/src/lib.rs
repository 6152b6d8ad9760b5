//! # Bus RPC - Named Remote Functions over Publish/Subscribe
//!
//! Binds plain single-argument async functions to names and lets any
//! process holding the right bus roles invoke them.
//!
//! ## Architecture
//!
//! ```text
//!  caller                                              serving processes
//!  ──────                                              ─────────────────
//!  Callable::call(v)
//!     │
//!     ├── direct mode ──► spawn_retry ──► Dispatcher ──► handler
//!     │                    (retry until Ok, fixed backoff)
//!     │
//!     └── bus mode ──► publish(name, json(v))
//!                            │
//!                            ▼
//!                      topic "name" ──► group "workers" ──► TimeoutWrapper
//!                                                             │ ttl / timeout
//!                                                             ▼
//!                                                         BusDelivery
//!                                                             │ decode
//!                                                             ▼
//!                                                         Dispatcher ──► handler
//!                                                             │
//!                                         Ok ─► ack     Err ─► bus redelivers
//! ```
//!
//! ## Guarantees
//!
//! - Handler shapes are validated when a name is bound, never at call time.
//! - Callers may pass a value or a pointer whatever the handler declared;
//!   pointer handlers always receive a private copy.
//! - A call means "ensure eventual execution": handler errors drive
//!   retries and are never returned to the caller.
//! - Results flow back out of band through ephemeral reply topics
//!   ([`Endpoints::unique`], [`ReplyAddress`]).
//!
//! ## Example
//!
//! ```no_run
//! use bus_rpc::{by_value, Endpoints};
//!
//! # async fn run() -> Result<(), bus_rpc::EndpointError> {
//! let endpoints = Endpoints::direct();
//! let hello = endpoints
//!     .function("helloworld", by_value(|s: String| async move {
//!         tracing::info!(greeting = %s, "received");
//!         Ok(())
//!     }))
//!     .await?;
//! hello.call("Hello world".to_string()).await?;
//! # Ok(())
//! # }
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod endpoints;
pub mod ephemeral;
pub mod error;
pub mod handler;
pub mod registration;
pub mod signature;
pub mod timeout;

// Re-export main types
pub use config::EndpointsConfig;
pub use delivery::{spawn_retry, BusDelivery, Delivery, DeliveryHandle, DeliveryMode};
pub use dispatch::{adapt, Argument, Convention, Dispatcher, Payload};
pub use endpoints::{Callable, Endpoints, Function};
pub use ephemeral::{reply_topic, unique_id, ReplyAddress};
pub use error::{EndpointError, HandlerError};
pub use handler::{by_pointer, by_value, Handler, PointerHandler, ValueHandler};
pub use registration::Registration;
pub use signature::{ParamKind, ReturnKind, Shape, SignatureError};
pub use timeout::{ConsumeOptions, MessageState, OnTimeout, TimeoutError, TimeoutWrapper};

/// Workers per registration unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Pause between direct-mode attempts, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;
