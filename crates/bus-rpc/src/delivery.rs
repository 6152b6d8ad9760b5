//! # Delivery Supervisor
//!
//! Guarantees that invoking a callable results in the handler being
//! attempted until it reports success.
//!
//! ```text
//! Direct mode (no bus roles):
//!   call() ──► spawn retry task ──► return immediately
//!                    │
//!                    loop {
//!                      attempt += 1
//!                      dispatch(copy of arg)
//!                        ├─ Ok  ──► exit
//!                        └─ Err ──► sleep(backoff), continue
//!                    }
//!
//! Bus-mediated mode:
//!   call() ──► publish once ──► return publish outcome
//!   worker ──► decode ──► dispatch
//!                ├─ Ok  ──► acknowledge
//!                └─ Err ──► bus redelivers
//! ```
//!
//! A direct-mode handler that never succeeds keeps its retry task alive
//! until the process exits. The task is exposed through [`DeliveryHandle`]
//! so the cost stays visible.

use crate::dispatch::{Argument, Dispatcher, Payload};
use crate::error::{EndpointError, HandlerError};
use async_trait::async_trait;
use futures::FutureExt;
use shared_bus::{BusMessage, MessageHandler, MessageId};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Delivery substrate, fixed when the binding is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// In-process retry task.
    Direct,
    /// Published to the bus; the bus retries.
    BusMediated,
}

/// What a single invocation produced.
#[derive(Debug)]
pub enum Delivery {
    /// A local retry task was started.
    Local(DeliveryHandle),
    /// The argument was published.
    Published(MessageId),
}

impl Delivery {
    /// Mode that produced this delivery.
    pub fn mode(&self) -> DeliveryMode {
        match self {
            Delivery::Local(_) => DeliveryMode::Direct,
            Delivery::Published(_) => DeliveryMode::BusMediated,
        }
    }
}

/// Observable handle on a direct-mode retry task.
///
/// Dropping the handle does not stop the task.
#[derive(Debug)]
pub struct DeliveryHandle {
    name: String,
    attempts: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

impl DeliveryHandle {
    /// Function name being delivered.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler invocations started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// True once the handler has succeeded.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the handler to succeed; returns the number of attempts.
    pub async fn wait(self) -> u32 {
        if let Err(e) = self.task.await {
            error!(function = %self.name, error = %e, "Retry task aborted");
        }
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Start a retry task that dispatches `arg` until the handler succeeds.
///
/// Fails only when there is no runtime to run the task on.
pub fn spawn_retry<T: Payload>(
    dispatcher: Arc<Dispatcher<T>>,
    arg: Argument<T>,
    backoff: Duration,
) -> Result<DeliveryHandle, EndpointError> {
    let name = dispatcher.name().to_string();
    let runtime = Handle::try_current().map_err(|_| EndpointError::NoRuntime {
        name: name.clone(),
    })?;

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let task = runtime.spawn(async move {
        loop {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let outcome = AssertUnwindSafe(dispatcher.dispatch(arg.clone()))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(anyhow::anyhow!("handler panicked")));
            match outcome {
                Ok(()) => {
                    debug!(function = %dispatcher.name(), attempt, "Direct call delivered");
                    break;
                }
                Err(e) => {
                    warn!(
                        function = %dispatcher.name(),
                        attempt,
                        error = %e,
                        "Direct call failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    });

    Ok(DeliveryHandle {
        name,
        attempts,
        task,
    })
}

/// Bus message handler that decodes the payload and dispatches it.
///
/// The handler's result is returned unchanged, so a failure asks the bus
/// to redeliver.
pub struct BusDelivery<T: Payload> {
    dispatcher: Arc<Dispatcher<T>>,
}

impl<T: Payload> BusDelivery<T> {
    pub fn new(dispatcher: Arc<Dispatcher<T>>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl<T: Payload> MessageHandler for BusDelivery<T> {
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
        let value: T = match message.decode() {
            Ok(value) => value,
            Err(e) => {
                // Redelivering an undecodable payload can never succeed.
                error!(
                    function = %self.dispatcher.name(),
                    message_id = %message.id,
                    error = %e,
                    "Payload does not match handler argument, dropping message"
                );
                return Ok(());
            }
        };
        self.dispatcher.dispatch(Argument::Value(value)).await
    }
}
