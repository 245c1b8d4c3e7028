//! Transport engine owning the socket and the command pipeline.
//!
//! The engine is an actor: one task owns the socket, the three command
//! queues, the counters, and the state flags, so every mutation happens on a
//! single logical execution context. Handles reach it through an `mpsc`
//! channel of [`Op`]s and a `tokio::select!` loop interleaves submissions,
//! inbound frames, and reconnect timers.
//!
//! The server answers strictly in arrival order, so matching is positional:
//! each frame produced by the codec completes the record at the head of the
//! in-flight queue.

mod link;
mod safe;
mod submit;

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, atomic::Ordering},
};

use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::{
    codec::Frame,
    command::{Command, ReplyTo},
    config::ClientConfig,
    error::BloomError,
    event::ClientEvent,
    metrics::Counters,
    reply::{Reply, decode},
};
use link::Link;

/// Requests a handle can make of the engine.
#[derive(Debug)]
pub(crate) enum Op {
    Submit(Command),
    Reconnect,
    Dispose,
}

/// Outcome of one turn of the select loop.
#[derive(Debug)]
enum Event {
    Op(Option<Op>),
    Frame(Option<Result<Frame, std::io::Error>>),
    ConnectDue,
}

/// Actor owning one bloomd connection and its pipeline state.
pub(crate) struct ConnectionActor {
    config: ClientConfig,
    ops: mpsc::UnboundedReceiver<Op>,
    events: broadcast::Sender<ClientEvent>,
    counters: Arc<Counters>,
    link: Link,
    /// Commands awaiting a connection, in submission order.
    offline: VecDeque<Command>,
    /// Commands cleared for writing on the next flush.
    write_queue: VecDeque<Command>,
    /// Commands written and awaiting their positional response.
    in_flight: VecDeque<Command>,
    /// Per-filter queues serialising traffic behind an outstanding safe
    /// sequence. Presence of an entry is the hold signal.
    holds: HashMap<String, VecDeque<Command>>,
    buffering: bool,
    unavailable: bool,
    disposed: bool,
    /// Connection attempts since the last explicit reconnect.
    attempts: u64,
    /// Running internal-error count, floor zero.
    error_count: u64,
}

impl ConnectionActor {
    pub(crate) fn new(
        config: ClientConfig,
        ops: mpsc::UnboundedReceiver<Op>,
        events: broadcast::Sender<ClientEvent>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            config,
            ops,
            events,
            counters,
            link: Link::Down,
            offline: VecDeque::new(),
            write_queue: VecDeque::new(),
            in_flight: VecDeque::new(),
            holds: HashMap::new(),
            buffering: true,
            unavailable: false,
            disposed: false,
            attempts: 0,
            error_count: 0,
        }
    }

    /// Drive the connection until disposal completes or every handle is
    /// dropped.
    pub(crate) async fn run(mut self) {
        self.try_connect().await;
        loop {
            if self.finished() {
                break;
            }
            match self.next_event().await {
                Event::Op(Some(op)) => self.handle_op(op).await,
                Event::Op(None) => break,
                Event::Frame(Some(Ok(frame))) => self.on_frame(frame),
                Event::Frame(Some(Err(error))) => self.on_disconnect(Some(error.to_string())),
                Event::Frame(None) => self.on_disconnect(None),
                Event::ConnectDue => self.try_connect().await,
            }
            self.flush_writes().await;
        }
        debug!("connection actor finished");
    }

    /// Disposal is complete once no response is outstanding. The
    /// disconnection path drains the in-flight queue, so after disposal the
    /// queue only ever shrinks.
    fn finished(&mut self) -> bool {
        if self.disposed && self.in_flight.is_empty() {
            self.link = Link::Down;
            return true;
        }
        false
    }

    /// Await the next submission, frame, or timer, whichever the current
    /// link state allows. Submissions take priority so queue transitions
    /// observe them in channel order.
    async fn next_event(&mut self) -> Event {
        match &mut self.link {
            Link::Up(framed) => tokio::select! {
                biased;
                op = self.ops.recv() => Event::Op(op),
                frame = framed.next() => Event::Frame(frame),
            },
            Link::Backoff(delay) => tokio::select! {
                biased;
                op = self.ops.recv() => Event::Op(op),
                () = delay.as_mut() => Event::ConnectDue,
            },
            Link::Down => Event::Op(self.ops.recv().await),
        }
    }

    async fn handle_op(&mut self, op: Op) {
        match op {
            Op::Submit(command) => self.submit(command),
            Op::Reconnect => self.manual_reconnect().await,
            Op::Dispose => self.dispose().await,
        }
    }

    /// Explicit recovery: reset the attempt and error counters, leave the
    /// unavailable state, and try to connect.
    async fn manual_reconnect(&mut self) {
        if self.disposed {
            return;
        }
        self.unavailable = false;
        self.attempts = 0;
        self.error_count = 0;
        self.counters.connection_attempts.store(0, Ordering::Relaxed);
        self.counters.errors.store(0, Ordering::Relaxed);
        if !matches!(self.link, Link::Up(_)) {
            self.try_connect().await;
        }
    }

    /// Stop accepting commands and shut the write side down. Responses for
    /// requests already written drain through the normal read path; the
    /// server closing its end then fails whatever remains.
    async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        debug!("disposing client");
        let queued: Vec<Command> = self
            .offline
            .drain(..)
            .chain(self.write_queue.drain(..))
            .collect();
        for command in queued {
            self.finish(command, Err(BloomError::Disposed));
        }
        let held: Vec<(String, VecDeque<Command>)> = self.holds.drain().collect();
        for (_, queue) in held {
            for command in queue {
                self.finish(command, Err(BloomError::Disposed));
            }
        }
        if let Link::Up(framed) = &mut self.link {
            // Half-close: the server still owes responses for written
            // requests; they drain through the normal read path.
            if self.in_flight.is_empty() {
                self.link = Link::Down;
            } else {
                let _ = framed.close().await;
            }
        } else {
            self.link = Link::Down;
        }
    }

    /// Receive procedure: match the frame to the head of the in-flight
    /// queue, decode, run safe interception, and deliver.
    fn on_frame(&mut self, frame: Frame) {
        let Some(mut command) = self.in_flight.pop_front() else {
            warn!(?frame, "response frame with no matching in-flight command");
            return;
        };
        let result = match command.override_error.take() {
            Some(error) => Err(error),
            None => decode(&frame, &command),
        };
        let ceiling_crossed = self.track_errors(&result);
        match result {
            Err(error) if error.is_missing_filter() && command.safe.is_some() => {
                self.begin_safe_create(command);
            }
            result => self.finish(command, result),
        }
        if ceiling_crossed {
            self.give_up();
        }
    }

    /// Internal-error bookkeeping. Returns `true` when the ceiling is
    /// crossed; the caller completes the offending command first so its
    /// submitter still sees the server text.
    fn track_errors(&mut self, result: &Result<Reply, BloomError>) -> bool {
        match result {
            Err(error) if error.is_internal() => {
                self.error_count += 1;
                self.counters.errors.store(self.error_count, Ordering::Relaxed);
                let max = self.config.max_errors;
                max != 0 && self.error_count >= max
            }
            Ok(_) => {
                self.error_count = self.error_count.saturating_sub(1);
                self.counters.errors.store(self.error_count, Ordering::Relaxed);
                false
            }
            Err(_) => false,
        }
    }

    /// Deliver a result and release any hold queue the command owned.
    fn finish(&mut self, command: Command, result: Result<Reply, BloomError>) {
        if self.config.debug {
            debug!(
                verb = command.verb.as_str(),
                elapsed = ?command.submitted.elapsed(),
                ok = result.is_ok(),
                "command finished"
            );
        }
        let release = if command.releases_hold {
            command.filter.clone()
        } else {
            None
        };
        match command.reply {
            ReplyTo::Caller(tx) => {
                // a caller that stopped awaiting just discards the result
                let _ = tx.send(result);
            }
            ReplyTo::Retry(original) => self.finish_create(*original, result),
        }
        if let Some(name) = release {
            self.release_hold(&name);
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}
