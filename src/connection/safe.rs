//! Safe-command coordination: transparent create-and-retry for commands
//! that hit a missing filter, and the per-filter hold queues that keep
//! later traffic ordered behind the sequence.

use tracing::debug;

use super::ConnectionActor;
use crate::{
    command::{Command, ExpectedReply, ReplyTo, Verb},
    error::BloomError,
    reply::Reply,
};

impl ConnectionActor {
    /// The original safe command came back with `Filter does not exist`:
    /// issue a create carrying the caller's options, with the original
    /// boxed inside it for resubmission.
    pub(super) fn begin_safe_create(&mut self, mut command: Command) {
        let (Some(options), Some(name)) = (command.safe.take(), command.filter.clone()) else {
            // not reachable through the public surface; deliver the error
            // rather than lose the command
            self.finish(
                command,
                Err(BloomError::Server(crate::error::FILTER_NOT_FOUND.into())),
            );
            return;
        };
        debug!(filter = %name, "filter missing; creating before retry");
        // The retry must bypass the hold queue the sequence owns.
        command.internal = true;
        let mut args = vec![Verb::Create.as_str().to_string(), name.clone()];
        args.extend(options.to_args());
        let mut create = Command::new(
            Verb::Create,
            ExpectedReply::CreateConfirmation,
            args,
            Some(name),
            ReplyTo::Retry(Box::new(command)),
        );
        create.internal = true;
        self.stage(create);
    }

    /// The coordinator's create finished: resubmit the original. A server
    /// failure rides along as the override error so the caller learns why
    /// creation failed instead of seeing the stale not-found; a transport
    /// failure ends the sequence outright.
    pub(super) fn finish_create(&mut self, mut original: Command, result: Result<Reply, BloomError>) {
        match result {
            Err(error) if error.is_transport() => self.finish(original, Err(error)),
            Err(error) => {
                original.override_error = Some(error);
                self.dispatch(original);
            }
            Ok(_) => self.dispatch(original),
        }
    }

    /// Remove the filter's hold queue and resubmit each held record through
    /// the normal path in FIFO order.
    pub(super) fn release_hold(&mut self, name: &str) {
        let Some(held) = self.holds.remove(name) else {
            return;
        };
        if !held.is_empty() {
            debug!(filter = %name, released = held.len(), "releasing hold queue");
        }
        for command in held {
            self.submit(command);
        }
    }
}
