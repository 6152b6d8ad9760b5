//! # Timeout & Expiry Supervisor
//!
//! Wraps the handling of one inbound message with two optional limits:
//!
//! - **ttl**: a message older than `ttl` is acknowledged without running
//!   the handler.
//! - **timeout**: the handler runs on its own task, raced against a timer.
//!   If the timer fires first the `on_timeout` callback decides the
//!   outcome reported to the bus, and the handler keeps running detached.
//!
//! ## State machine (per message)
//!
//! ```text
//!             age > ttl
//! Received ───────────────► Expired    (ack, handler never runs)
//!    │
//!    │ handler returns before timer
//!    ├────────────────────► Completed  (handler result → ack/requeue)
//!    │
//!    │ timer fires first
//!    └────────────────────► TimedOut   (on_timeout result → ack/requeue,
//!                                       no callback → ack;
//!                                       handler continues, result discarded)
//! ```
//!
//! A zero duration disables the corresponding limit.

use crate::error::HandlerError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use shared_bus::{handle_guarded, BusMessage, MessageHandler};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Callback deciding the outcome of a timed-out message.
pub type OnTimeout =
    Arc<dyn Fn(TimeoutError) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Signal handed to `on_timeout`: the limit elapsed before the handler returned.
///
/// Carries the original message so the callback can inspect or re-route it.
#[derive(Debug, Clone, Error)]
#[error("message {} on {} not handled within {elapsed:?}", .message.id, .message.topic)]
pub struct TimeoutError {
    message: BusMessage,
    elapsed: Duration,
}

impl TimeoutError {
    pub fn new(message: BusMessage, elapsed: Duration) -> Self {
        Self { message, elapsed }
    }

    /// The message whose handling timed out.
    pub fn message(&self) -> &BusMessage {
        &self.message
    }

    pub fn into_message(self) -> BusMessage {
        self.message
    }

    /// The configured limit that elapsed.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Decode the original payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        self.message.decode()
    }
}

/// Per-consume supervision options.
#[derive(Clone, Default)]
pub struct ConsumeOptions {
    timeout: Option<Duration>,
    on_timeout: Option<OnTimeout>,
    ttl: Option<Duration>,
}

fn enabled(limit: Duration) -> Option<Duration> {
    Some(limit).filter(|d| !d.is_zero())
}

impl ConsumeOptions {
    /// No timeout, no ttl.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound processing time; `on_timeout` decides the outcome once it elapses.
    #[must_use]
    pub fn with_timeout<F, Fut>(mut self, timeout: Duration, on_timeout: F) -> Self
    where
        F: Fn(TimeoutError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let callback: OnTimeout = Arc::new(
            move |e: TimeoutError| -> BoxFuture<'static, Result<(), HandlerError>> {
                Box::pin(on_timeout(e))
            },
        );
        self.timeout = enabled(timeout);
        self.on_timeout = Some(callback);
        self
    }

    /// Bound processing time; a timed-out message is acknowledged.
    #[must_use]
    pub fn with_timeout_ack(mut self, timeout: Duration) -> Self {
        self.timeout = enabled(timeout);
        self.on_timeout = None;
        self
    }

    /// Drop messages older than `ttl` without processing them.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = enabled(ttl);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn has_on_timeout(&self) -> bool {
        self.on_timeout.is_some()
    }
}

impl std::fmt::Debug for ConsumeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumeOptions")
            .field("timeout", &self.timeout)
            .field("on_timeout", &self.on_timeout.is_some())
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Where a message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Received,
    Completed,
    TimedOut,
    Expired,
}

/// A handler run that nobody waits for any more.
///
/// Abandoned work is not cancelled: it runs to completion and its result
/// is only logged.
struct DetachedTask {
    topic: String,
    message_id: uuid::Uuid,
    join: JoinHandle<Result<(), HandlerError>>,
}

impl DetachedTask {
    fn spawn(handler: Arc<dyn MessageHandler>, message: BusMessage) -> Self {
        let topic = message.topic.clone();
        let message_id = message.id;
        let join = tokio::spawn(async move { handler.handle(&message).await });
        Self {
            topic,
            message_id,
            join,
        }
    }

    fn detach(self) {
        let Self {
            topic,
            message_id,
            join,
        } = self;
        tokio::spawn(async move {
            match join.await {
                Ok(Ok(())) => {
                    debug!(topic = %topic, message_id = %message_id, "Abandoned handler completed");
                }
                Ok(Err(e)) => {
                    debug!(
                        topic = %topic,
                        message_id = %message_id,
                        error = %e,
                        "Abandoned handler failed, result discarded"
                    );
                }
                Err(e) => {
                    warn!(
                        topic = %topic,
                        message_id = %message_id,
                        error = %e,
                        "Abandoned handler panicked"
                    );
                }
            }
        });
    }
}

/// Applies [`ConsumeOptions`] around an underlying message handler.
pub struct TimeoutWrapper {
    options: ConsumeOptions,
    handler: Arc<dyn MessageHandler>,
}

impl TimeoutWrapper {
    pub fn new(handler: Arc<dyn MessageHandler>, options: ConsumeOptions) -> Self {
        Self { options, handler }
    }

    pub fn options(&self) -> &ConsumeOptions {
        &self.options
    }

    /// Handle one message and report which terminal state it reached.
    pub async fn supervise(
        &self,
        message: &BusMessage,
    ) -> (MessageState, Result<(), HandlerError>) {
        if let Some(ttl) = self.options.ttl {
            let age = message.age();
            if age > ttl {
                debug!(
                    topic = %message.topic,
                    message_id = %message.id,
                    age_ms = age.as_millis() as u64,
                    "Message expired, dropping"
                );
                return (MessageState::Expired, Ok(()));
            }
        }

        let Some(limit) = self.options.timeout else {
            let result = handle_guarded(self.handler.as_ref(), message).await;
            return (MessageState::Completed, result);
        };

        let mut task = DetachedTask::spawn(self.handler.clone(), message.clone());
        let raced = tokio::time::timeout(limit, &mut task.join).await;
        match raced {
            Ok(Ok(result)) => (MessageState::Completed, result),
            Ok(Err(e)) => (
                MessageState::Completed,
                Err(anyhow::anyhow!("handler task failed: {e}")),
            ),
            Err(_elapsed) => {
                warn!(
                    topic = %message.topic,
                    message_id = %message.id,
                    timeout_ms = limit.as_millis() as u64,
                    "Handler timed out"
                );
                task.detach();
                let outcome = match &self.options.on_timeout {
                    Some(on_timeout) => {
                        on_timeout(TimeoutError::new(message.clone(), limit)).await
                    }
                    None => Ok(()),
                };
                (MessageState::TimedOut, outcome)
            }
        }
    }
}

#[async_trait]
impl MessageHandler for TimeoutWrapper {
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
        self.supervise(message).await.1
    }
}
