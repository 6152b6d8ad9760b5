//! # Registration
//!
//! One (topic, consumer group) pair a handler may be attached to.
//!
//! A registration is single-use: the first `consume` subscribes, every
//! later attempt fails with [`EndpointError::AlreadyConnected`]. The guard
//! is a flag flipped with compare-and-swap, so two racing `consume` calls
//! cannot both subscribe.

use crate::delivery::BusDelivery;
use crate::dispatch::{Dispatcher, Payload};
use crate::error::EndpointError;
use crate::handler::Handler;
use crate::timeout::{ConsumeOptions, TimeoutWrapper};
use shared_bus::{ConsumerGroupHandle, MessageHandler, Subscription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// A consumer-group slot on one topic.
pub struct Registration {
    topic: String,
    group: String,
    consumer: ConsumerGroupHandle,
    concurrency: usize,
    connected: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
}

impl Registration {
    /// Slot for the consumer's own group on `topic`.
    pub fn new(
        consumer: ConsumerGroupHandle,
        topic: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        let group = consumer.group().to_string();
        Self::with_group(consumer, topic, group, concurrency)
    }

    /// Slot for an explicit group name on `topic`.
    pub fn with_group(
        consumer: ConsumerGroupHandle,
        topic: impl Into<String>,
        group: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            topic: topic.into(),
            group: group.into(),
            consumer,
            concurrency,
            connected: AtomicBool::new(false),
            subscription: Mutex::new(None),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Whether a handler is attached.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Validate `handler` and attach it to this slot.
    pub async fn consume<T, H>(
        &self,
        handler: H,
        options: ConsumeOptions,
    ) -> Result<(), EndpointError>
    where
        T: Payload,
        H: Handler<T>,
    {
        let dispatcher = Arc::new(Dispatcher::bind(&self.topic, handler)?);
        self.consume_raw(Arc::new(BusDelivery::new(dispatcher)), options)
            .await
    }

    /// Attach an already-built message handler, supervised by `options`.
    pub async fn consume_raw(
        &self,
        handler: Arc<dyn MessageHandler>,
        options: ConsumeOptions,
    ) -> Result<(), EndpointError> {
        if self
            .connected
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EndpointError::AlreadyConnected {
                topic: self.topic.clone(),
                group: self.group.clone(),
            });
        }

        debug!(topic = %self.topic, group = %self.group, ?options, "Consuming");
        let supervised: Arc<dyn MessageHandler> = Arc::new(TimeoutWrapper::new(handler, options));
        let subscription = match self
            .consumer
            .subscribe_as(&self.topic, &self.group, self.concurrency, supervised)
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                // Subscribe failed; the slot may be consumed again.
                self.connected.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        match self.subscription.lock() {
            Ok(mut slot) => *slot = Some(subscription),
            Err(poisoned) => *poisoned.into_inner() = Some(subscription),
        }
        info!(
            topic = %self.topic,
            group = %self.group,
            concurrency = self.concurrency,
            "Registration connected"
        );
        Ok(())
    }

    /// Detach the subscription, if any. The slot stays consumed.
    pub fn close(&self) {
        let subscription = match self.subscription.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if subscription.is_some() {
            debug!(topic = %self.topic, group = %self.group, "Registration closed");
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("topic", &self.topic)
            .field("group", &self.group)
            .field("concurrency", &self.concurrency)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
