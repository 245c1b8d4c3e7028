//! In-memory command records and their wire rendering.
//!
//! A [`Command`] describes one pending request: its verb, the full argument
//! list in wire order, the filter it targets, the reply shape the decoder
//! should expect, and where the decoded result goes. Records are built by
//! the public command surface and owned by the transport engine until they
//! complete or are rejected.

use std::time::Instant;

use tokio::sync::oneshot;

use crate::{error::BloomError, reply::Reply};

/// Protocol verbs understood by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Verb {
    Create,
    List,
    Drop,
    Close,
    Clear,
    Flush,
    Check,
    Set,
    Multi,
    Bulk,
    Info,
}

impl Verb {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Drop => "drop",
            Self::Close => "close",
            Self::Clear => "clear",
            Self::Flush => "flush",
            Self::Check => "check",
            Self::Set => "set",
            Self::Multi => "multi",
            Self::Bulk => "bulk",
            Self::Info => "info",
        }
    }
}

/// Response shape the decoder applies to the frame matched to a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExpectedReply {
    Bool,
    BoolList,
    Confirmation,
    CreateConfirmation,
    DropConfirmation,
    FilterList,
    Info,
}

/// Options forwarded to `create` as `key=value` tokens.
///
/// The client does not interpret the values; bloomd recognises `prob`,
/// `capacity`, and `in_memory`. Insertion order is preserved on the wire,
/// although the server does not care.
///
/// # Examples
///
/// ```
/// use bloomd_client::CreateOptions;
///
/// let options = CreateOptions::new().prob(0.001).capacity(100_000);
/// assert_eq!(options.to_args(), ["prob=0.001", "capacity=100000"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateOptions {
    entries: Vec<(String, String)>,
}

impl CreateOptions {
    /// Empty option set; the server applies its own defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Target false-positive probability.
    #[must_use]
    pub fn prob(self, probability: f64) -> Self {
        self.option("prob", probability)
    }

    /// Initial capacity.
    #[must_use]
    pub fn capacity(self, capacity: u64) -> Self {
        self.option("capacity", capacity)
    }

    /// Keep the filter entirely in memory.
    #[must_use]
    pub fn in_memory(self, in_memory: bool) -> Self {
        self.option("in_memory", u8::from(in_memory))
    }

    /// Append an arbitrary `key=value` pair.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.entries.push((key.into(), value.to_string()));
        self
    }

    /// Render the options as wire tokens.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect()
    }
}

/// Where a decoded result goes.
pub(crate) enum ReplyTo {
    /// Complete the caller that submitted the command.
    Caller(oneshot::Sender<Result<Reply, BloomError>>),
    /// Internal create issued by the safe coordinator: when it completes,
    /// resubmit the boxed original command.
    Retry(Box<Command>),
}

impl std::fmt::Debug for ReplyTo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Caller(_) => f.write_str("Caller"),
            Self::Retry(original) => f.debug_tuple("Retry").field(&original.verb).finish(),
        }
    }
}

/// One pending request.
#[derive(Debug)]
pub(crate) struct Command {
    pub(crate) verb: Verb,
    /// Full wire argument list, verb included.
    pub(crate) args: Vec<String>,
    pub(crate) filter: Option<String>,
    pub(crate) expected: ExpectedReply,
    /// Key arguments, in request order, for `BoolList` mapping.
    pub(crate) keys: Vec<String>,
    pub(crate) reply: ReplyTo,
    /// Error substituted at decode time in place of the real result. Set by
    /// the safe coordinator to surface a creation failure instead of the
    /// stale not-found.
    pub(crate) override_error: Option<BloomError>,
    /// Safe marker: retry once through a transparent create when the server
    /// reports the filter missing.
    pub(crate) safe: Option<CreateOptions>,
    /// Internal submissions bypass the per-filter hold queues.
    pub(crate) internal: bool,
    /// Release the filter's hold queue when this command completes to its
    /// caller. Set on safe originals and user-level creates.
    pub(crate) releases_hold: bool,
    pub(crate) submitted: Instant,
}

impl Command {
    pub(crate) fn new(
        verb: Verb,
        expected: ExpectedReply,
        args: Vec<String>,
        filter: Option<String>,
        reply: ReplyTo,
    ) -> Self {
        Self {
            verb,
            args,
            filter,
            expected,
            keys: Vec::new(),
            reply,
            override_error: None,
            safe: None,
            internal: false,
            releases_hold: false,
            submitted: Instant::now(),
        }
    }

    /// The request line, without its terminator.
    pub(crate) fn line(&self) -> String {
        self.args.join(" ")
    }
}
