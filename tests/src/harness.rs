//! Per-test fixture: a fresh bus and the endpoints built on top of it.
//!
//! Every test constructs its own [`Harness`]; nothing is shared between
//! tests except the tracing subscriber.

use bus_rpc::{by_value, Endpoints, EndpointsConfig, Handler, Payload};
use shared_bus::{BusConfig, ConsumerGroupHandle, InMemoryBus, PublisherHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Upper bound for any single wait in the suite.
pub const WAIT: Duration = Duration::from_secs(3);

/// Bus redelivery delay used by the harness.
pub const REDELIVERY_DELAY: Duration = Duration::from_millis(10);

/// Direct-mode backoff used by the harness.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Install a test-friendly subscriber once per binary.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// One in-memory bus and factories for the three endpoint configurations.
pub struct Harness {
    pub bus: Arc<InMemoryBus>,
    pub config: EndpointsConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_redelivery_delay(REDELIVERY_DELAY)
    }

    /// Harness whose bus waits `delay` before redelivering.
    pub fn with_redelivery_delay(delay: Duration) -> Self {
        init_tracing();
        Self {
            bus: Arc::new(InMemoryBus::with_config(
                BusConfig::default().with_redelivery_delay(delay),
            )),
            config: EndpointsConfig::default()
                .with_concurrency(4)
                .with_retry_backoff(RETRY_BACKOFF),
        }
    }

    /// Endpoints that serve in `group` and publish.
    pub fn server(&self, group: &str) -> Endpoints {
        Endpoints::new(
            ConsumerGroupHandle::new(group, self.bus.clone()),
            PublisherHandle::new(self.bus.clone()),
        )
        .with_config(self.config.clone())
    }

    /// Endpoints that only publish.
    pub fn client(&self) -> Endpoints {
        Endpoints::client_only(PublisherHandle::new(self.bus.clone()))
            .with_config(self.config.clone())
    }

    /// Endpoints with no bus at all.
    pub fn direct(&self) -> Endpoints {
        Endpoints::direct().with_config(self.config.clone())
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// A by-value handler that forwards every argument to a channel.
pub fn recorder<T: Payload>() -> (impl Handler<T>, mpsc::UnboundedReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = by_value(move |value: T| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(value);
            Ok(())
        }
    });
    (handler, rx)
}

/// Next value from `rx`, panicking after [`WAIT`].
pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("recorder channel closed")
}

/// Assert nothing arrives on `rx` within `window`.
pub async fn assert_quiet<T>(rx: &mut mpsc::UnboundedReceiver<T>, window: Duration)
where
    T: std::fmt::Debug,
{
    if let Ok(Some(value)) = tokio::time::timeout(window, rx.recv()).await {
        panic!("unexpected delivery: {value:?}");
    }
}
