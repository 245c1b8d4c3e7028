//! Builder for configuring and spawning a bloomd client.

use std::time::Duration;

use super::BloomClient;
use crate::config::ClientConfig;

/// Builder for [`BloomClient`].
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use bloomd_client::BloomClient;
///
/// # #[tokio::main]
/// # async fn main() {
/// let client = BloomClient::builder()
///     .host("10.0.0.5")
///     .port(8673)
///     .reconnect_delay(Duration::from_millis(250))
///     .max_connection_attempts(10)
///     .build();
/// # drop(client);
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct BloomClientBuilder {
    config: ClientConfig,
}

impl BloomClientBuilder {
    /// Create a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Server host name or address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Server TCP port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Log per-command latency at debug level.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Base delay for linear reconnect backoff.
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    /// Give up after this many failed connection attempts; zero retries
    /// forever.
    #[must_use]
    pub fn max_connection_attempts(mut self, attempts: u64) -> Self {
        self.config.max_connection_attempts = attempts;
        self
    }

    /// Become unavailable once this many net internal errors accumulate;
    /// zero disables the ceiling.
    #[must_use]
    pub fn max_errors(mut self, errors: u64) -> Self {
        self.config.max_errors = errors;
        self
    }

    /// Apply `TCP_NODELAY` on connect.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.config.nodelay = enabled;
        self
    }

    /// Spawn the transport engine and return a handle to it.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn build(self) -> BloomClient {
        BloomClient::with_config(self.config)
    }
}
