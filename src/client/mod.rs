//! Public command surface of the bloomd client.
//!
//! [`BloomClient`] is a cheap, cloneable handle; every clone feeds the same
//! transport engine. Each protocol verb is a thin builder: it shapes a
//! command record with the proper expected reply and argument list, submits
//! it, and awaits the engine's completion. The `*_safe` variants
//! additionally carry create options and the hold-queue marker that keeps
//! later per-filter traffic ordered behind the create-and-retry sequence.

mod builder;

pub use builder::BloomClientBuilder;

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::{
    command::{Command, CreateOptions, ExpectedReply, ReplyTo, Verb},
    config::ClientConfig,
    connection::{ConnectionActor, Op},
    error::BloomError,
    event::{ClientEvent, EVENT_CAPACITY},
    filter::FilterInfo,
    metrics::{ClientStats, Counters},
    reply::Reply,
};

/// Handle to a pipelined bloomd connection.
///
/// # Examples
///
/// ```no_run
/// use bloomd_client::{BloomClient, CreateOptions};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), bloomd_client::BloomError> {
/// let client = BloomClient::builder().port(8673).build();
/// client
///     .create("pageviews", &CreateOptions::new().capacity(100_000))
///     .await?;
/// assert!(client.set("pageviews", "user-1").await?);
/// assert!(client.check("pageviews", "user-1").await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BloomClient {
    ops: mpsc::UnboundedSender<Op>,
    events: broadcast::Sender<ClientEvent>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for BloomClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomClient")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl BloomClient {
    /// Start building a client with default configuration.
    #[must_use]
    pub fn builder() -> BloomClientBuilder {
        BloomClientBuilder::new()
    }

    /// Spawn the transport engine for `config` and return a handle to it.
    ///
    /// Returns immediately: the engine connects in the background and
    /// buffers submissions until the socket is up, so a server that starts
    /// later is reached via the reconnect supervisor.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let counters = Counters::shared();
        let actor = ConnectionActor::new(config, ops_rx, events_tx.clone(), Arc::clone(&counters));
        tokio::spawn(actor.run());
        Self {
            ops: ops_tx,
            events: events_tx,
            counters,
        }
    }

    // -- Command surface -----------------------------------------------------

    /// Create a filter. `Done` and `Exists` both succeed: an already-present
    /// filter satisfies a create.
    ///
    /// Completing a create also releases any hold queue for the filter, so
    /// explicitly creating a filter unblocks traffic held by a safe
    /// sequence.
    ///
    /// # Errors
    ///
    /// [`BloomError::Server`] carries rejections such as
    /// `Client Error: Bad arguments`.
    pub async fn create(&self, filter: &str, options: &CreateOptions) -> Result<(), BloomError> {
        let mut args = wire_args(Verb::Create, [filter]);
        args.extend(options.to_args());
        let (mut command, rx) = caller_command(
            Verb::Create,
            ExpectedReply::CreateConfirmation,
            args,
            Some(filter),
        );
        command.releases_hold = true;
        self.execute(command, rx).await?.into_confirmation()
    }

    /// List filters, optionally restricted to a name prefix.
    ///
    /// # Errors
    ///
    /// Propagates server and transport errors.
    pub async fn list(&self, prefix: Option<&str>) -> Result<Vec<FilterInfo>, BloomError> {
        let (command, rx) = caller_command(
            Verb::List,
            ExpectedReply::FilterList,
            wire_args(Verb::List, prefix),
            None,
        );
        self.execute(command, rx).await?.into_filters()
    }

    /// Drop (delete) a filter. A filter that does not exist is reported as
    /// success.
    ///
    /// # Errors
    ///
    /// Propagates server and transport errors.
    pub async fn drop_filter(&self, filter: &str) -> Result<(), BloomError> {
        let (command, rx) = caller_command(
            Verb::Drop,
            ExpectedReply::DropConfirmation,
            wire_args(Verb::Drop, [filter]),
            Some(filter),
        );
        self.execute(command, rx).await?.into_confirmation()
    }

    /// Unmap a filter from memory without deleting it.
    ///
    /// # Errors
    ///
    /// Propagates server and transport errors.
    pub async fn close_filter(&self, filter: &str) -> Result<(), BloomError> {
        let (command, rx) = caller_command(
            Verb::Close,
            ExpectedReply::Confirmation,
            wire_args(Verb::Close, [filter]),
            Some(filter),
        );
        self.execute(command, rx).await?.into_confirmation()
    }

    /// Remove a closed filter from the server's filter table.
    ///
    /// # Errors
    ///
    /// Propagates server and transport errors.
    pub async fn clear_filter(&self, filter: &str) -> Result<(), BloomError> {
        let (command, rx) = caller_command(
            Verb::Clear,
            ExpectedReply::Confirmation,
            wire_args(Verb::Clear, [filter]),
            Some(filter),
        );
        self.execute(command, rx).await?.into_confirmation()
    }

    /// Flush a filter to cold storage, or every filter when `filter` is
    /// `None`.
    ///
    /// Like [`list`](Self::list), the record carries no filter name, so a
    /// flush is never held behind an outstanding safe sequence.
    ///
    /// # Errors
    ///
    /// Propagates server and transport errors.
    pub async fn flush(&self, filter: Option<&str>) -> Result<(), BloomError> {
        let (command, rx) = caller_command(
            Verb::Flush,
            ExpectedReply::Confirmation,
            wire_args(Verb::Flush, filter),
            None,
        );
        self.execute(command, rx).await?.into_confirmation()
    }

    /// Set a key. Returns `true` when the key was newly added.
    ///
    /// # Errors
    ///
    /// [`BloomError::Server`] with `Filter does not exist` when the filter
    /// is missing; see [`set_safe`](Self::set_safe).
    pub async fn set(&self, filter: &str, key: &str) -> Result<bool, BloomError> {
        let (command, rx) = caller_command(
            Verb::Set,
            ExpectedReply::Bool,
            wire_args(Verb::Set, [filter, key]),
            Some(filter),
        );
        self.execute(command, rx).await?.into_bool()
    }

    /// Check a key. Returns `true` when the key is probably present.
    ///
    /// # Errors
    ///
    /// [`BloomError::Server`] with `Filter does not exist` when the filter
    /// is missing; see [`check_safe`](Self::check_safe).
    pub async fn check(&self, filter: &str, key: &str) -> Result<bool, BloomError> {
        let (command, rx) = caller_command(
            Verb::Check,
            ExpectedReply::Bool,
            wire_args(Verb::Check, [filter, key]),
            Some(filter),
        );
        self.execute(command, rx).await?.into_bool()
    }

    /// Check many keys in one round trip. The result maps each key to its
    /// membership; an empty key list completes without touching the server.
    ///
    /// # Errors
    ///
    /// Propagates server and transport errors.
    pub async fn multi<I, S>(&self, filter: &str, keys: I) -> Result<HashMap<String, bool>, BloomError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keyed(Verb::Multi, filter, collect_keys(keys), None).await
    }

    /// Set many keys in one round trip. The result maps each key to whether
    /// it was newly added.
    ///
    /// # Errors
    ///
    /// Propagates server and transport errors.
    pub async fn bulk<I, S>(&self, filter: &str, keys: I) -> Result<HashMap<String, bool>, BloomError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keyed(Verb::Bulk, filter, collect_keys(keys), None).await
    }

    /// Filter metadata and operation counters.
    ///
    /// # Errors
    ///
    /// Propagates server and transport errors.
    pub async fn info(&self, filter: &str) -> Result<FilterInfo, BloomError> {
        let (command, rx) = caller_command(
            Verb::Info,
            ExpectedReply::Info,
            wire_args(Verb::Info, [filter]),
            Some(filter),
        );
        self.execute(command, rx).await?.into_info()
    }

    // -- Safe variants -------------------------------------------------------

    /// [`set`](Self::set), creating the filter with `options` if the server
    /// reports it missing. Commands for the same filter submitted while the
    /// sequence is outstanding are held and replayed in order afterwards.
    ///
    /// # Errors
    ///
    /// A failed creation surfaces its own error (for example
    /// `Client Error: Bad arguments`), not the stale not-found.
    pub async fn set_safe(
        &self,
        filter: &str,
        key: &str,
        options: CreateOptions,
    ) -> Result<bool, BloomError> {
        let (mut command, rx) = caller_command(
            Verb::Set,
            ExpectedReply::Bool,
            wire_args(Verb::Set, [filter, key]),
            Some(filter),
        );
        mark_safe(&mut command, options);
        self.execute(command, rx).await?.into_bool()
    }

    /// [`check`](Self::check) with transparent filter creation.
    ///
    /// # Errors
    ///
    /// As [`set_safe`](Self::set_safe).
    pub async fn check_safe(
        &self,
        filter: &str,
        key: &str,
        options: CreateOptions,
    ) -> Result<bool, BloomError> {
        let (mut command, rx) = caller_command(
            Verb::Check,
            ExpectedReply::Bool,
            wire_args(Verb::Check, [filter, key]),
            Some(filter),
        );
        mark_safe(&mut command, options);
        self.execute(command, rx).await?.into_bool()
    }

    /// [`multi`](Self::multi) with transparent filter creation.
    ///
    /// # Errors
    ///
    /// As [`set_safe`](Self::set_safe).
    pub async fn multi_safe<I, S>(
        &self,
        filter: &str,
        keys: I,
        options: CreateOptions,
    ) -> Result<HashMap<String, bool>, BloomError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keyed(Verb::Multi, filter, collect_keys(keys), Some(options))
            .await
    }

    /// [`bulk`](Self::bulk) with transparent filter creation.
    ///
    /// # Errors
    ///
    /// As [`set_safe`](Self::set_safe).
    pub async fn bulk_safe<I, S>(
        &self,
        filter: &str,
        keys: I,
        options: CreateOptions,
    ) -> Result<HashMap<String, bool>, BloomError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keyed(Verb::Bulk, filter, collect_keys(keys), Some(options))
            .await
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Subscribe to lifecycle events. Each receiver observes events emitted
    /// after it subscribed.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Snapshot the client's counters.
    #[must_use]
    pub fn stats(&self) -> ClientStats {
        self.counters.snapshot()
    }

    /// Leave the unavailable state: reset the attempt and error counters
    /// and try to connect again.
    pub fn reconnect(&self) {
        let _ = self.ops.send(Op::Reconnect);
    }

    /// Dispose of the client. Queued commands fail, in-flight responses
    /// drain naturally, and every subsequent submission is rejected with
    /// [`BloomError::Disposed`]. No reconnection is attempted afterwards.
    pub fn dispose(&self) {
        let _ = self.ops.send(Op::Dispose);
    }

    // -- Internals -----------------------------------------------------------

    async fn keyed(
        &self,
        verb: Verb,
        filter: &str,
        keys: Vec<String>,
        safe: Option<CreateOptions>,
    ) -> Result<HashMap<String, bool>, BloomError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let mut args = wire_args(verb, [filter]);
        args.extend(keys.iter().cloned());
        let (mut command, rx) = caller_command(verb, ExpectedReply::BoolList, args, Some(filter));
        command.keys = keys;
        if let Some(options) = safe {
            mark_safe(&mut command, options);
        }
        self.execute(command, rx).await?.into_bool_map()
    }

    async fn execute(
        &self,
        command: Command,
        rx: oneshot::Receiver<Result<Reply, BloomError>>,
    ) -> Result<Reply, BloomError> {
        self.ops
            .send(Op::Submit(command))
            .map_err(|_| BloomError::Disposed)?;
        rx.await.map_err(|_| BloomError::Disposed)?
    }
}

/// Full wire argument list: the verb followed by its operands.
fn wire_args<'a>(verb: Verb, operands: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    std::iter::once(verb.as_str().to_string())
        .chain(operands.into_iter().map(ToString::to_string))
        .collect()
}

fn collect_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    keys.into_iter().map(Into::into).collect()
}

fn caller_command(
    verb: Verb,
    expected: ExpectedReply,
    args: Vec<String>,
    filter: Option<&str>,
) -> (Command, oneshot::Receiver<Result<Reply, BloomError>>) {
    let (tx, rx) = oneshot::channel();
    let command = Command::new(
        verb,
        expected,
        args,
        filter.map(ToString::to_string),
        ReplyTo::Caller(tx),
    );
    (command, rx)
}

fn mark_safe(command: &mut Command, options: CreateOptions) {
    command.safe = Some(options);
    command.releases_hold = true;
}
