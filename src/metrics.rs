//! Client counters shared between the transport engine and its handles.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Counters owned by the engine, readable from any handle without crossing
/// the actor channel.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    /// Total records ever appended to the in-flight queue.
    pub(crate) commands_sent: AtomicU64,
    /// Running internal-error counter. Incremented on `Internal Error`
    /// responses, decremented on successful decodes, floor zero.
    pub(crate) errors: AtomicU64,
    /// Connection attempts since the last explicit reconnect.
    pub(crate) connection_attempts: AtomicU64,
}

impl Counters {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn snapshot(&self) -> ClientStats {
        ClientStats {
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of the client's counters.
///
/// # Examples
///
/// ```
/// use bloomd_client::BloomClient;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let client = BloomClient::builder().build();
/// assert_eq!(client.stats().commands_sent, 0);
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Total records ever appended to the in-flight queue.
    pub commands_sent: u64,
    /// Current net internal-error count.
    pub errors: u64,
    /// Connection attempts since the last explicit reconnect.
    pub connection_attempts: u64,
}
