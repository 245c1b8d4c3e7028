//! Lifecycle events broadcast by the client.
//!
//! Subscribers obtain a receiver from
//! [`BloomClient::events`](crate::BloomClient::events). Events are
//! best-effort: a subscriber that falls behind the channel capacity observes
//! a lag, not client backpressure.

/// Lifecycle signals emitted by the transport engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// The socket connected. The offline queue may still be draining.
    Connected,
    /// The socket was lost; the client is buffering and will reconnect.
    Disconnected,
    /// The offline queue was fully flushed after a connect.
    Drain,
    /// The client gave up reconnecting or crossed the internal-error
    /// ceiling. Emitted exactly once per transition.
    Unavailable,
    /// A transport-level error, with its message.
    Error(String),
}

/// Capacity of the broadcast channel behind [`ClientEvent`] delivery.
pub(crate) const EVENT_CAPACITY: usize = 64;
