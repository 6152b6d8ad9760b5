//! # Endpoint Binder
//!
//! [`Endpoints`] couples the bus roles of a process and turns names plus
//! handlers into [`Callable`]s.
//!
//! ## Roles
//!
//! | roles                          | `function`                         | `unique`      | `client`   |
//! |--------------------------------|------------------------------------|---------------|------------|
//! | none (`direct`)                | local retry task per call          | local         | unroutable |
//! | publisher (`client_only`)      | topic ensured, handler not served  | not serving   | publish    |
//! | consumer + publisher (`new`)   | topic ensured, handler subscribed  | reply topic   | publish    |
//!
//! A consumer group without a publisher cannot be built: the constructors
//! only offer the three legal combinations.
//!
//! The delivery mode of a binding is fixed when it is created and never
//! changes afterwards.

use crate::config::EndpointsConfig;
use crate::delivery::{spawn_retry, BusDelivery, Delivery, DeliveryMode};
use crate::dispatch::{Argument, Dispatcher, Payload};
use crate::ephemeral::{reply_topic, ReplyAddress};
use crate::error::EndpointError;
use crate::handler::Handler;
use crate::registration::Registration;
use crate::timeout::ConsumeOptions;
use serde::Serialize;
use shared_bus::{ConsumerGroupHandle, MessageId, PublisherHandle, TopicSpec};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

enum Roles {
    Direct,
    Client {
        publisher: PublisherHandle,
    },
    Server {
        consumer: ConsumerGroupHandle,
        publisher: PublisherHandle,
    },
}

/// The bus roles of one process and the bindings made through them.
pub struct Endpoints {
    roles: Roles,
    config: EndpointsConfig,
    registrations: Mutex<Vec<Arc<Registration>>>,
}

impl Endpoints {
    /// Serve and call functions over the bus.
    pub fn new(consumer: ConsumerGroupHandle, publisher: PublisherHandle) -> Self {
        Self::with_roles(Roles::Server {
            consumer,
            publisher,
        })
    }

    /// Call functions served elsewhere.
    pub fn client_only(publisher: PublisherHandle) -> Self {
        Self::with_roles(Roles::Client { publisher })
    }

    /// No bus: every call runs in-process.
    pub fn direct() -> Self {
        Self::with_roles(Roles::Direct)
    }

    fn with_roles(roles: Roles) -> Self {
        Self {
            roles,
            config: EndpointsConfig::default(),
            registrations: Mutex::new(Vec::new()),
        }
    }

    /// Replace the configuration used by later bindings.
    #[must_use]
    pub fn with_config(mut self, config: EndpointsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EndpointsConfig {
        &self.config
    }

    /// Mode every binding made here will use.
    pub fn mode(&self) -> DeliveryMode {
        match self.roles {
            Roles::Direct => DeliveryMode::Direct,
            Roles::Client { .. } | Roles::Server { .. } => DeliveryMode::BusMediated,
        }
    }

    pub fn consumer(&self) -> Option<&ConsumerGroupHandle> {
        match &self.roles {
            Roles::Server { consumer, .. } => Some(consumer),
            _ => None,
        }
    }

    pub fn publisher(&self) -> Option<&PublisherHandle> {
        match &self.roles {
            Roles::Client { publisher } | Roles::Server { publisher, .. } => Some(publisher),
            Roles::Direct => None,
        }
    }

    /// Bind `name` to `handler`.
    pub async fn function<T, H>(
        &self,
        name: &str,
        handler: H,
    ) -> Result<Callable<T>, EndpointError>
    where
        T: Payload,
        H: Handler<T>,
    {
        self.function_with(name, handler, ConsumeOptions::new())
            .await
    }

    /// Bind `name` to `handler`, supervising served messages with `options`.
    pub async fn function_with<T, H>(
        &self,
        name: &str,
        handler: H,
        options: ConsumeOptions,
    ) -> Result<Callable<T>, EndpointError>
    where
        T: Payload,
        H: Handler<T>,
    {
        self.bind(TopicSpec::durable(name), None, handler, options)
            .await
    }

    /// Bind to a function hosted elsewhere.
    pub async fn client<T: Payload>(&self, name: &str) -> Result<Callable<T>, EndpointError> {
        let publisher = self.publisher().ok_or_else(|| EndpointError::Unroutable {
            name: name.to_string(),
        })?;
        publisher.create_topic(&TopicSpec::durable(name)).await?;
        debug!(function = name, "Client bound");
        Ok(Callable::bus(name, publisher.clone()))
    }

    /// Bind `handler` to a fresh ephemeral topic derived from `name`.
    ///
    /// Returns the callable and the generated topic name, which a remote
    /// service can use as a reply address. Publisher-only endpoints could
    /// never consume the replies, so they fail with
    /// [`EndpointError::NotServing`] and create no topic.
    pub async fn unique<T, H>(
        &self,
        name: &str,
        handler: H,
    ) -> Result<(Callable<T>, String), EndpointError>
    where
        T: Payload,
        H: Handler<T>,
    {
        if let Roles::Client { .. } = self.roles {
            return Err(EndpointError::NotServing {
                name: name.to_string(),
            });
        }
        let spec = reply_topic(name);
        let topic = spec.name.clone();
        // Reply topics are consumed by a group named after the topic.
        let callable = self
            .bind(spec, Some(topic.clone()), handler, ConsumeOptions::new())
            .await?;
        Ok((callable, topic))
    }

    /// Publish `value` to a reply address received in a request.
    pub async fn reply<R>(
        &self,
        address: &ReplyAddress,
        value: &R,
    ) -> Result<MessageId, EndpointError>
    where
        R: Serialize + ?Sized,
    {
        let publisher = self.publisher().ok_or_else(|| EndpointError::Unroutable {
            name: address.topic.clone(),
        })?;
        Ok(publisher.publish_json(&address.topic, value).await?)
    }

    /// An unconnected registration for `name` in this process's group.
    ///
    /// The caller consumes it; the registration is tracked so that
    /// [`shutdown`](Self::shutdown) detaches it.
    pub async fn registration(&self, name: &str) -> Result<Arc<Registration>, EndpointError> {
        let Roles::Server {
            consumer,
            publisher,
        } = &self.roles
        else {
            return Err(EndpointError::NotServing {
                name: name.to_string(),
            });
        };
        publisher.create_topic(&TopicSpec::durable(name)).await?;
        let registration = Arc::new(Registration::new(
            consumer.clone(),
            name,
            self.config.concurrency,
        ));
        self.track(registration.clone());
        Ok(registration)
    }

    /// Number of registrations held.
    pub fn registration_count(&self) -> usize {
        match self.registrations.lock() {
            Ok(registrations) => registrations.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Detach every subscription made through these endpoints.
    ///
    /// Ephemeral reply topics become reclaimable by the bus. Direct-mode
    /// retry tasks and abandoned timed-out handlers are unaffected.
    pub fn shutdown(&self) {
        let drained: Vec<_> = match self.registrations.lock() {
            Ok(mut registrations) => registrations.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for registration in &drained {
            registration.close();
        }
        info!(registrations = drained.len(), "Endpoints shut down");
    }

    async fn bind<T, H>(
        &self,
        spec: TopicSpec,
        group: Option<String>,
        handler: H,
        options: ConsumeOptions,
    ) -> Result<Callable<T>, EndpointError>
    where
        T: Payload,
        H: Handler<T>,
    {
        let dispatcher = Arc::new(Dispatcher::bind(&spec.name, handler)?);

        match &self.roles {
            Roles::Direct => {
                if options.timeout().is_some() || options.ttl().is_some() {
                    debug!(function = %spec.name, "Consume options ignored in direct mode");
                }
                debug!(
                    function = %spec.name,
                    convention = ?dispatcher.convention(),
                    "Direct function bound"
                );
                Ok(Callable::direct(dispatcher, self.config.retry_backoff))
            }
            Roles::Client { publisher } => {
                publisher.create_topic(&spec).await?;
                debug!(function = %spec.name, "No consumer group, handler not served");
                Ok(Callable::bus(&spec.name, publisher.clone()))
            }
            Roles::Server {
                consumer,
                publisher,
            } => {
                publisher.create_topic(&spec).await?;
                let group = group.unwrap_or_else(|| consumer.group().to_string());
                let registration = Arc::new(Registration::with_group(
                    consumer.clone(),
                    spec.name.as_str(),
                    group,
                    self.config.concurrency,
                ));
                registration
                    .consume_raw(Arc::new(BusDelivery::new(dispatcher)), options)
                    .await?;
                self.track(registration);
                Ok(Callable::bus(&spec.name, publisher.clone()))
            }
        }
    }

    fn track(&self, registration: Arc<Registration>) {
        match self.registrations.lock() {
            Ok(mut registrations) => registrations.push(registration),
            Err(poisoned) => poisoned.into_inner().push(registration),
        }
    }
}

impl std::fmt::Debug for Endpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoints")
            .field("mode", &self.mode())
            .field("group", &self.consumer().map(ConsumerGroupHandle::group))
            .field("config", &self.config)
            .field("registrations", &self.registration_count())
            .finish()
    }
}

enum Route<T: Payload> {
    Direct {
        dispatcher: Arc<Dispatcher<T>>,
        backoff: Duration,
    },
    Bus {
        publisher: PublisherHandle,
    },
}

/// A named binding: where calls to `name` go.
pub struct Function<T: Payload> {
    name: String,
    route: Route<T>,
}

impl<T: Payload> Function<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> DeliveryMode {
        match self.route {
            Route::Direct { .. } => DeliveryMode::Direct,
            Route::Bus { .. } => DeliveryMode::BusMediated,
        }
    }
}

/// Invokes a bound function.
///
/// A successful call means delivery was started, not that the handler
/// succeeded. Handler errors never reach the caller.
pub struct Callable<T: Payload> {
    function: Arc<Function<T>>,
}

impl<T: Payload> Clone for Callable<T> {
    fn clone(&self) -> Self {
        Self {
            function: self.function.clone(),
        }
    }
}

impl<T: Payload> Callable<T> {
    fn direct(dispatcher: Arc<Dispatcher<T>>, backoff: Duration) -> Self {
        Self::from_function(Function {
            name: dispatcher.name().to_string(),
            route: Route::Direct {
                dispatcher,
                backoff,
            },
        })
    }

    fn bus(name: &str, publisher: PublisherHandle) -> Self {
        Self::from_function(Function {
            name: name.to_string(),
            route: Route::Bus { publisher },
        })
    }

    fn from_function(function: Function<T>) -> Self {
        Self {
            function: Arc::new(function),
        }
    }

    /// The binding this callable invokes.
    pub fn function(&self) -> &Function<T> {
        &self.function
    }

    /// Function name (the bus topic in bus-mediated mode).
    pub fn name(&self) -> &str {
        self.function.name()
    }

    pub fn mode(&self) -> DeliveryMode {
        self.function.mode()
    }

    /// Call with a value.
    pub async fn call(&self, value: T) -> Result<(), EndpointError> {
        self.invoke(Argument::Value(value)).await.map(drop)
    }

    /// Call with a pointer.
    pub async fn call_boxed(&self, value: Box<T>) -> Result<(), EndpointError> {
        self.invoke(Argument::Pointer(value)).await.map(drop)
    }

    /// Call with a copy of `value`.
    pub async fn call_ref(&self, value: &T) -> Result<(), EndpointError> {
        self.call(value.clone()).await
    }

    /// Start delivery of `arg` and report how it was started.
    ///
    /// Direct mode returns a handle on the retry task; bus-mediated mode
    /// returns the id of the published message.
    pub async fn invoke(&self, arg: Argument<T>) -> Result<Delivery, EndpointError> {
        match &self.function.route {
            Route::Direct {
                dispatcher,
                backoff,
            } => Ok(Delivery::Local(spawn_retry(
                dispatcher.clone(),
                arg,
                *backoff,
            )?)),
            Route::Bus { publisher } => {
                let id = publisher.publish_json(&self.function.name, arg.get()).await?;
                Ok(Delivery::Published(id))
            }
        }
    }
}

impl<T: Payload> std::fmt::Debug for Callable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name())
            .field("mode", &self.mode())
            .finish()
    }
}
