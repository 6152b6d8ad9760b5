//! # In-Memory Bus
//!
//! Reference implementation of [`Publisher`] and [`Subscriber`].
//!
//! Each consumer group owns one unbounded queue shared by all of its
//! members' workers, so members compete for messages. A handler error puts
//! the message back on the group queue after the configured redelivery
//! delay. Suitable for single-process composition and tests; distributed
//! deployments would use a broker-backed client behind the same traits.

use crate::config::BusConfig;
use crate::error::{validate_name, BusError};
use crate::message::{BusMessage, MessageId, TopicSpec};
use crate::publisher::Publisher;
use crate::subscriber::{handle_guarded, MessageHandler, Subscriber, Subscription};
use crate::MAX_CONCURRENCY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

type GroupQueue = Arc<Mutex<mpsc::UnboundedReceiver<BusMessage>>>;

struct GroupState {
    sender: mpsc::UnboundedSender<BusMessage>,
    queue: GroupQueue,
    members: usize,
}

impl GroupState {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            queue: Arc::new(Mutex::new(receiver)),
            members: 0,
        }
    }
}

struct TopicState {
    ephemeral: bool,
    groups: HashMap<String, GroupState>,
}

impl TopicState {
    fn members(&self) -> usize {
        self.groups.values().map(|g| g.members).sum()
    }
}

type Topics = Arc<RwLock<HashMap<String, TopicState>>>;

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    redelivered: AtomicU64,
}

/// In-memory implementation of the bus.
pub struct InMemoryBus {
    config: BusConfig,
    topics: Topics,
    counters: Arc<Counters>,
}

impl InMemoryBus {
    /// Create a bus with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a bus with the given configuration.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        if !config.transport_security.is_plaintext() {
            debug!("Transport security configured; the in-memory bus has no wire to protect");
        }
        Self {
            config,
            topics: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Whether a topic currently exists.
    pub fn topic_exists(&self, topic: &str) -> bool {
        self.topics
            .read()
            .map(|topics| topics.contains_key(topic))
            .unwrap_or(false)
    }

    /// Number of topics currently held, ephemeral ones included.
    pub fn topic_count(&self) -> usize {
        self.topics.read().map(|topics| topics.len()).unwrap_or(0)
    }

    /// Number of attached members of a group.
    pub fn group_members(&self, topic: &str, group: &str) -> usize {
        self.topics
            .read()
            .ok()
            .and_then(|topics| {
                topics
                    .get(topic)
                    .and_then(|t| t.groups.get(group))
                    .map(|g| g.members)
            })
            .unwrap_or(0)
    }

    /// Total messages accepted by `publish`.
    pub fn messages_published(&self) -> u64 {
        self.counters.published.load(Ordering::Relaxed)
    }

    /// Total handler invocations, redeliveries included.
    pub fn messages_delivered(&self) -> u64 {
        self.counters.delivered.load(Ordering::Relaxed)
    }

    /// Total messages requeued after a handler error.
    pub fn redeliveries(&self) -> u64 {
        self.counters.redelivered.load(Ordering::Relaxed)
    }

    /// Register a member in `group`, creating the group on first use.
    fn attach(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<(mpsc::UnboundedSender<BusMessage>, GroupQueue), BusError> {
        let mut topics = self.topics.write().map_err(|_| BusError::Closed)?;
        let state = topics.get_mut(topic).ok_or_else(|| BusError::TopicNotFound {
            topic: topic.to_string(),
        })?;
        let group_state = state
            .groups
            .entry(group.to_string())
            .or_insert_with(GroupState::new);
        group_state.members += 1;
        Ok((group_state.sender.clone(), group_state.queue.clone()))
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove one member; reclaim the topic if it is ephemeral and now unused.
fn detach(topics: &Topics, topic: &str, group: &str) {
    let Ok(mut topics) = topics.write() else {
        return;
    };
    let Some(state) = topics.get_mut(topic) else {
        return;
    };
    if let Some(group_state) = state.groups.get_mut(group) {
        group_state.members = group_state.members.saturating_sub(1);
    }
    if state.ephemeral && state.members() == 0 {
        topics.remove(topic);
        info!(topic = topic, "Ephemeral topic reclaimed");
    }
}

struct Worker {
    topic: String,
    group: String,
    queue: GroupQueue,
    requeue: mpsc::UnboundedSender<BusMessage>,
    handler: Arc<dyn MessageHandler>,
    shutdown: watch::Receiver<()>,
    redelivery_delay: Duration,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let queue = self.queue.clone();
            let next = tokio::select! {
                _ = self.shutdown.changed() => None,
                message = async move { queue.lock().await.recv().await } => message,
            };
            let Some(message) = next else {
                break;
            };

            self.counters.delivered.fetch_add(1, Ordering::Relaxed);
            match handle_guarded(self.handler.as_ref(), &message).await {
                Ok(()) => {
                    debug!(
                        topic = %self.topic,
                        group = %self.group,
                        message_id = %message.id,
                        attempt = message.delivery_attempt,
                        "Message acknowledged"
                    );
                }
                Err(e) => {
                    warn!(
                        topic = %self.topic,
                        group = %self.group,
                        message_id = %message.id,
                        attempt = message.delivery_attempt,
                        error = %e,
                        "Handler failed, message will be redelivered"
                    );
                    self.counters.redelivered.fetch_add(1, Ordering::Relaxed);
                    let requeue = self.requeue.clone();
                    let delay = self.redelivery_delay;
                    let again = message.redelivery();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if requeue.send(again).is_err() {
                            debug!("Group queue closed, redelivery dropped");
                        }
                    });
                }
            }
        }
        debug!(topic = %self.topic, group = %self.group, "Worker stopped");
    }
}

#[async_trait]
impl Publisher for InMemoryBus {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), BusError> {
        validate_name(&spec.name)?;
        let mut topics = self.topics.write().map_err(|_| BusError::Closed)?;
        if !topics.contains_key(&spec.name) {
            topics.insert(
                spec.name.clone(),
                TopicState {
                    ephemeral: spec.ephemeral,
                    groups: HashMap::new(),
                },
            );
            debug!(topic = %spec.name, ephemeral = spec.ephemeral, "Topic created");
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<MessageId, BusError> {
        let message = BusMessage::new(topic, payload);
        let topics = self.topics.read().map_err(|_| BusError::Closed)?;
        let state = topics.get(topic).ok_or_else(|| BusError::TopicNotFound {
            topic: topic.to_string(),
        })?;

        self.counters.published.fetch_add(1, Ordering::Relaxed);

        if state.groups.is_empty() {
            warn!(topic = topic, message_id = %message.id, "Message dropped (no consumer groups)");
            return Ok(message.id);
        }

        for (group, group_state) in &state.groups {
            if group_state.sender.send(message.clone()).is_err() {
                warn!(topic = topic, group = %group, "Group queue closed");
            }
        }
        Ok(message.id)
    }
}

#[async_trait]
impl Subscriber for InMemoryBus {
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
        concurrency: usize,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, BusError> {
        validate_name(group)?;
        if concurrency == 0 || concurrency > MAX_CONCURRENCY {
            return Err(BusError::InvalidConcurrency {
                requested: concurrency,
                max: MAX_CONCURRENCY,
            });
        }

        let (requeue, queue) = self.attach(topic, group)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        for _ in 0..concurrency {
            let worker = Worker {
                topic: topic.to_string(),
                group: group.to_string(),
                queue: queue.clone(),
                requeue: requeue.clone(),
                handler: handler.clone(),
                shutdown: shutdown_rx.clone(),
                redelivery_delay: self.config.redelivery_delay,
                counters: self.counters.clone(),
            };
            tokio::spawn(worker.run());
        }

        debug!(topic = topic, group = group, concurrency = concurrency, "Subscription created");

        let topics = self.topics.clone();
        let (topic_name, group_name) = (topic.to_string(), group.to_string());
        Ok(Subscription::new(
            topic,
            group,
            shutdown_tx,
            Some(Box::new(move || detach(&topics, &topic_name, &group_name))),
        ))
    }
}
