//! Endpoint configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::{DEFAULT_CONCURRENCY, DEFAULT_RETRY_BACKOFF_MS};

/// Settings shared by every binding of one [`Endpoints`](crate::Endpoints).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointsConfig {
    /// Workers per registration.
    pub concurrency: usize,

    /// Pause between direct-mode attempts.
    pub retry_backoff: Duration,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl EndpointsConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BUS_RPC_CONCURRENCY`: workers per registration (default: 10)
    /// - `BUS_RPC_RETRY_BACKOFF_MS`: direct-mode retry backoff (default: 100)
    pub fn from_env() -> Self {
        Self {
            concurrency: env::var("BUS_RPC_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_CONCURRENCY),

            retry_backoff: env::var("BUS_RPC_RETRY_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS)),
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}
