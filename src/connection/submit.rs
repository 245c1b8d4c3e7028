//! Submission procedure and queue transitions.

use std::sync::atomic::Ordering;

use futures::SinkExt;

use super::{ConnectionActor, link::Link};
use crate::{
    command::{Command, Verb},
    error::BloomError,
};

impl ConnectionActor {
    /// Submission procedure. A record lands in exactly one place: rejected,
    /// a per-filter hold queue, the offline queue, or staged for the wire.
    pub(super) fn submit(&mut self, command: Command) {
        if self.disposed {
            self.finish(command, Err(BloomError::Disposed));
            return;
        }
        if self.unavailable {
            self.finish(command, Err(BloomError::Unavailable));
            return;
        }
        if command.safe.is_some() && !command.internal {
            if let Some(name) = command.filter.clone() {
                // A safe command opens the hold for its filter and rides
                // ahead of anything held later. If another safe sequence
                // already owns the hold, wait behind it like any other
                // traffic.
                if let Some(held) = self.holds.get_mut(&name) {
                    held.push_back(command);
                } else {
                    self.holds.insert(name, std::collections::VecDeque::new());
                    self.stage(command);
                }
                return;
            }
        }
        self.dispatch(command);
    }

    /// Normal path: honour an existing hold unless the command is the
    /// coordinator's create or an internal resubmission.
    pub(super) fn dispatch(&mut self, command: Command) {
        if let Some(name) = command.filter.as_deref() {
            if command.verb != Verb::Create && !command.internal {
                if let Some(held) = self.holds.get_mut(name) {
                    held.push_back(command);
                    return;
                }
            }
        }
        self.stage(command);
    }

    /// Queue offline while buffering, otherwise stage for the next flush.
    pub(super) fn stage(&mut self, command: Command) {
        if self.buffering || !matches!(self.link, Link::Up(_)) {
            self.offline.push_back(command);
        } else {
            self.write_queue.push_back(command);
        }
    }

    /// Write staged commands in order, appending each to the in-flight
    /// queue once its bytes are out. On a write failure the unwritten
    /// remainder returns to the offline queue, order preserved, before the
    /// disconnection is handled.
    pub(super) async fn flush_writes(&mut self) {
        while let Some(command) = self.write_queue.pop_front() {
            let Link::Up(framed) = &mut self.link else {
                self.offline.push_back(command);
                continue;
            };
            match framed.send(command.line()).await {
                Ok(()) => {
                    self.in_flight.push_back(command);
                    self.counters.commands_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(error) => {
                    self.write_queue.push_front(command);
                    let remainder: Vec<Command> = self.write_queue.drain(..).collect();
                    self.offline.extend(remainder);
                    self.on_disconnect(Some(format!("write failed: {error}")));
                    return;
                }
            }
        }
    }
}
