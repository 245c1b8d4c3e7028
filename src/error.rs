//! Error types surfaced through command completions and lifecycle events.
//!
//! The engine never panics across its own loop: every failure becomes either
//! a [`BloomError`] delivered to the submitting caller or a client state
//! transition. Server-reported command errors carry the verbatim response
//! line so callers can match on the server's own vocabulary.

use thiserror::Error;

/// Response line bloomd sends when a command names a filter that does not
/// exist. Recognised by the safe-command coordinator and treated as success
/// by `drop`.
pub const FILTER_NOT_FOUND: &str = "Filter does not exist";

/// Response line bloomd sends on an internal fault. The only server error
/// counted toward the `max_errors` ceiling.
pub const INTERNAL_ERROR: &str = "Internal Error";

/// Errors delivered by the bloomd client.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BloomError {
    /// The server reported a command error inline. The message is the
    /// verbatim response line, for example `Filter does not exist` or
    /// `Client Error: Bad arguments`. These are application errors, not
    /// transport failures.
    #[error("{0}")]
    Server(String),

    /// The response frame did not match the shape expected for the command.
    /// Indicates a client/server mismatch; the pipeline itself continues.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The client exhausted its reconnect attempts or crossed the internal
    /// error ceiling. Every queued and future command is rejected with this
    /// error until [`reconnect`](crate::BloomClient::reconnect) is called.
    #[error("bloomd service unavailable")]
    Unavailable,

    /// The connection dropped after the request was written but before its
    /// response arrived. The command is not replayed.
    #[error("connection lost before a response arrived")]
    ConnectionLost,

    /// The client was disposed; no further commands are accepted.
    #[error("client disposed")]
    Disposed,
}

impl BloomError {
    /// Returns `true` when the server reported the target filter as missing.
    #[must_use]
    pub fn is_missing_filter(&self) -> bool {
        matches!(self, Self::Server(text) if text == FILTER_NOT_FOUND)
    }

    /// Returns `true` for the reserved internal-error line counted toward
    /// the `max_errors` ceiling.
    pub(crate) fn is_internal(&self) -> bool {
        matches!(self, Self::Server(text) if text == INTERNAL_ERROR)
    }

    /// Returns `true` for transport-level failures that must not trigger a
    /// safe-create retry.
    pub(crate) fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Unavailable | Self::ConnectionLost | Self::Disposed
        )
    }
}
