//! Connection lifecycle: connect, linear-backoff reconnect, give-up.

use std::{pin::Pin, sync::atomic::Ordering};

use tokio::{
    net::TcpStream,
    time::{self, Sleep},
};
use tokio_util::codec::Framed;
use tracing::{debug, error, warn};

use super::ConnectionActor;
use crate::{codec::BloomCodec, command::Command, error::BloomError, event::ClientEvent};

/// Socket state of the engine.
pub(super) enum Link {
    /// Connected; frames flow.
    Up(Framed<TcpStream, BloomCodec>),
    /// Waiting out the backoff before the next connection attempt.
    Backoff(Pin<Box<Sleep>>),
    /// No socket and no pending timer: unavailable, disposed, or not yet
    /// started.
    Down,
}

impl ConnectionActor {
    /// Attempt one connection. On success the offline queue drains in
    /// submission order; on failure the supervisor schedules the next
    /// attempt or gives up.
    pub(super) async fn try_connect(&mut self) {
        if self.disposed || self.unavailable {
            self.link = Link::Down;
            return;
        }
        self.attempts += 1;
        self.counters
            .connection_attempts
            .store(self.attempts, Ordering::Relaxed);
        let addr = self.config.addr();
        debug!(attempt = self.attempts, %addr, "connecting");
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                if self.config.nodelay {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(error = %e, "failed to set TCP_NODELAY");
                    }
                }
                self.link = Link::Up(Framed::new(stream, BloomCodec::new()));
                self.emit(ClientEvent::Connected);
                self.drain_offline().await;
            }
            Err(e) => {
                debug!(error = %e, "connection attempt failed");
                self.emit(ClientEvent::Error(e.to_string()));
                self.schedule_reconnect();
            }
        }
    }

    /// Drain procedure: flush the offline queue, then leave the buffering
    /// state. Anything staged concurrently flushes after the backlog.
    async fn drain_offline(&mut self) {
        let staged = std::mem::take(&mut self.write_queue);
        self.write_queue = std::mem::take(&mut self.offline);
        self.write_queue.extend(staged);
        self.flush_writes().await;
        if matches!(self.link, Link::Up(_)) {
            self.buffering = false;
            self.emit(ClientEvent::Drain);
        }
    }

    /// Transport-down handling. Requests already written are lost: their
    /// records fail now rather than waiting for a give-up that may never
    /// come. Repeat signals while a reconnect is already pending are
    /// ignored.
    pub(super) fn on_disconnect(&mut self, error: Option<String>) {
        if !matches!(self.link, Link::Up(_)) {
            return;
        }
        self.link = Link::Down;
        self.buffering = true;
        if let Some(message) = error {
            warn!(%message, "connection lost");
            self.emit(ClientEvent::Error(message));
        } else {
            debug!("connection closed by server");
        }
        self.emit(ClientEvent::Disconnected);
        let lost: Vec<Command> = self.in_flight.drain(..).collect();
        for command in lost {
            self.finish(command, Err(BloomError::ConnectionLost));
        }
        if self.disposed {
            return;
        }
        self.schedule_reconnect();
    }

    /// Linear backoff: attempt `n + 1` waits `reconnect_delay * n`. A
    /// non-zero `max_connection_attempts` caps the attempt counter.
    pub(super) fn schedule_reconnect(&mut self) {
        let max = self.config.max_connection_attempts;
        if max != 0 && self.attempts >= max {
            self.give_up();
            return;
        }
        let scale = u32::try_from(self.attempts).unwrap_or(u32::MAX);
        let delay = self.config.reconnect_delay.saturating_mul(scale);
        debug!(?delay, "scheduling reconnect");
        self.link = Link::Backoff(Box::pin(time::sleep(delay)));
    }

    /// Terminal transition: every queued record is rejected and every
    /// future submission fails until an explicit `reconnect()`.
    pub(super) fn give_up(&mut self) {
        if self.unavailable {
            return;
        }
        self.unavailable = true;
        self.buffering = true;
        self.link = Link::Down;
        error!("exhausted recovery; client is unavailable until reconnect()");
        self.emit(ClientEvent::Unavailable);
        self.reject_all();
    }

    /// Drain every queue, failing each record with the unavailability
    /// error. FIFO within each queue.
    fn reject_all(&mut self) {
        let rejected: Vec<Command> = self
            .in_flight
            .drain(..)
            .chain(self.write_queue.drain(..))
            .chain(self.offline.drain(..))
            .collect();
        for command in rejected {
            self.finish(command, Err(BloomError::Unavailable));
        }
        let held: Vec<_> = self.holds.drain().collect();
        for (_, queue) in held {
            for command in queue {
                self.finish(command, Err(BloomError::Unavailable));
            }
        }
    }
}
