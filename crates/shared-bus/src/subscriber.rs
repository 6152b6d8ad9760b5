//! # Subscriber
//!
//! Defines the consuming side of the bus: consumer-group subscriptions and
//! the handler contract that drives acknowledge vs. redeliver.

use crate::error::BusError;
use crate::message::BusMessage;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Error type returned by message handlers.
pub type HandlerError = anyhow::Error;

/// Handles one delivered message.
///
/// `Ok(())` acknowledges the message. `Err(_)` asks the bus to deliver it
/// again, to this or another member of the group.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(BusMessage) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
        (self.0)(message.clone()).await
    }
}

/// Build a [`MessageHandler`] from an async closure.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(BusMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Run `handler` on `message`, reporting a panic as a handler error.
///
/// A panicking handler is treated like one returning `Err`, so the message
/// is redelivered and the worker that ran it keeps consuming.
pub async fn handle_guarded(
    handler: &dyn MessageHandler,
    message: &BusMessage,
) -> Result<(), HandlerError> {
    match AssertUnwindSafe(handler.handle(message)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "non-string payload"
    }
}

/// Trait for attaching handlers to consumer groups.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Join `group` on `topic` with `concurrency` workers.
    ///
    /// The returned [`Subscription`] keeps the workers alive; dropping it
    /// detaches this member from the group.
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
        concurrency: usize,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, BusError>;
}

/// A live subscription handle.
///
/// When dropped, the workers stop taking new messages and the member is
/// removed from its group.
pub struct Subscription {
    topic: String,
    group: String,
    /// Dropping the sender signals every worker to stop.
    _shutdown: watch::Sender<()>,
    /// Bus-specific cleanup run on drop.
    on_detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Create a subscription handle.
    pub fn new(
        topic: impl Into<String>,
        group: impl Into<String>,
        shutdown: watch::Sender<()>,
        on_detach: Option<Box<dyn FnOnce() + Send + Sync>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            group: group.into(),
            _shutdown: shutdown,
            on_detach,
        }
    }

    /// Topic this subscription consumes.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Consumer group this subscription belongs to.
    pub fn group(&self) -> &str {
        &self.group
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.on_detach.take() {
            detach();
        }
        debug!(topic = %self.topic, group = %self.group, "Subscription dropped");
    }
}

/// The consumer-group role of a process.
#[derive(Clone)]
pub struct ConsumerGroupHandle {
    group: String,
    subscriber: Arc<dyn Subscriber>,
}

impl ConsumerGroupHandle {
    /// Bind a bus client to a group name.
    pub fn new(group: impl Into<String>, subscriber: Arc<dyn Subscriber>) -> Self {
        Self {
            group: group.into(),
            subscriber,
        }
    }

    /// Group name.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Subscribe this group to `topic`.
    pub async fn subscribe(
        &self,
        topic: &str,
        concurrency: usize,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, BusError> {
        self.subscriber
            .subscribe(topic, &self.group, concurrency, handler)
            .await
    }

    /// Subscribe under a different group name on the same bus client.
    ///
    /// Used for reply topics, where the group is named after the topic.
    pub async fn subscribe_as(
        &self,
        topic: &str,
        group: &str,
        concurrency: usize,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, BusError> {
        self.subscriber
            .subscribe(topic, group, concurrency, handler)
            .await
    }
}

impl std::fmt::Debug for ConsumerGroupHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerGroupHandle")
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}
