//! Bus client configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::DEFAULT_REDELIVERY_DELAY_MS;

/// TLS material handed to the transport.
///
/// The endpoint layer never looks inside; it is carried to whichever bus
/// client is in use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportSecurity {
    /// CA bundle used to verify the broker.
    pub ca_file: Option<PathBuf>,
    /// Client certificate.
    pub cert_file: Option<PathBuf>,
    /// Client private key.
    pub key_file: Option<PathBuf>,
}

impl TransportSecurity {
    /// True when no TLS material is configured.
    pub fn is_plaintext(&self) -> bool {
        self.ca_file.is_none() && self.cert_file.is_none() && self.key_file.is_none()
    }
}

/// Configuration for a bus client.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Delay before a failed message is offered to the group again.
    pub redelivery_delay: Duration,

    /// Transport security pass-through.
    pub transport_security: TransportSecurity,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            redelivery_delay: Duration::from_millis(DEFAULT_REDELIVERY_DELAY_MS),
            transport_security: TransportSecurity::default(),
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BUS_REDELIVERY_DELAY_MS`: redelivery delay (default: 100)
    /// - `BUS_TLS_CA_FILE`: CA bundle path
    /// - `BUS_TLS_CERT_FILE`: client certificate path
    /// - `BUS_TLS_KEY_FILE`: client key path
    pub fn from_env() -> Self {
        Self {
            redelivery_delay: env::var("BUS_REDELIVERY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_REDELIVERY_DELAY_MS)),

            transport_security: TransportSecurity {
                ca_file: env::var("BUS_TLS_CA_FILE").ok().map(PathBuf::from),
                cert_file: env::var("BUS_TLS_CERT_FILE").ok().map(PathBuf::from),
                key_file: env::var("BUS_TLS_KEY_FILE").ok().map(PathBuf::from),
            },
        }
    }

    /// Same configuration with a different redelivery delay.
    #[must_use]
    pub fn with_redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = delay;
        self
    }
}
