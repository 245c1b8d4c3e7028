//! Client configuration and defaults.

use std::time::Duration;

/// Default bloomd host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bloomd port.
pub const DEFAULT_PORT: u16 = 8673;

/// Default delay multiplied by the attempt count for linear reconnect
/// backoff.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(160);

/// Configuration for a [`BloomClient`](crate::BloomClient).
///
/// Construct via [`BloomClient::builder`](crate::BloomClient::builder) or
/// fill the fields directly and pass to
/// [`BloomClient::with_config`](crate::BloomClient::with_config).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
    /// Log per-command latency at debug level.
    pub debug: bool,
    /// Base delay for linear reconnect backoff; attempt `n` waits
    /// `reconnect_delay * n`.
    pub reconnect_delay: Duration,
    /// Give up and become unavailable after this many failed connection
    /// attempts. Zero means retry forever.
    pub max_connection_attempts: u64,
    /// Become unavailable once the running internal-error counter reaches
    /// this ceiling. Zero disables the ceiling. Successful responses
    /// decrement the counter, so transient spikes self-heal.
    pub max_errors: u64,
    /// Apply `TCP_NODELAY` on connect. Pipelined small writes suffer badly
    /// under Nagle, so this defaults to `true`.
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            debug: false,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_connection_attempts: 0,
            max_errors: 0,
            nodelay: true,
        }
    }
}

impl ClientConfig {
    /// The `host:port` string used for connecting.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
