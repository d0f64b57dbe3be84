//! Client side of the clock subscription.
//!
//! A [`Subscription`] is a pull-based, cancellable sequence: each call to
//! [`Subscription::next`] either yields one event (and the consumer decides
//! when to ask for the next) or reports that the sequence is done. The
//! context is checked before every pull and raced against it, so a deadline
//! ends the sequence even when the server keeps the stream open forever.
//!
//! Once done, a subscription stays done; it cannot be restarted.

use super::context::CallContext;
use crate::{RpcError, proto::TimeResult, types::TimeEvent};
use core::fmt;
use tonic::Streaming;

/// Outcome of one pull.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pull {
    /// The next event; the sequence continues.
    Event(TimeEvent),
    /// The sequence has ended.
    Done(Termination),
}

/// Why a subscription ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The context fired or the subscription was cancelled. This is the
    /// normal way a subscription ends.
    Cancelled,
    /// The server closed the stream.
    Closed,
    /// A transport error was already returned from [`Subscription::next`].
    Failed,
}

/// A live server-push sequence of [`TimeEvent`]s.
///
/// Dropping the subscription releases the underlying HTTP/2 stream, as does
/// every path that ends it.
pub struct Subscription {
    stream: Option<Streaming<TimeResult>>,
    context: CallContext,
    delivered: u64,
    termination: Option<Termination>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("open", &self.stream.is_some())
            .field("delivered", &self.delivered)
            .field("termination", &self.termination)
            .finish()
    }
}

impl Subscription {
    pub(crate) fn new(stream: Streaming<TimeResult>, context: CallContext) -> Self {
        Self {
            stream: Some(stream),
            context,
            delivered: 0,
            termination: None,
        }
    }

    /// Pulls the next event.
    ///
    /// Cancellation (context, deadline, or a server-side `CANCELLED`) is
    /// reported as `Ok(Pull::Done(Termination::Cancelled))`, never as an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns the transport failure of the subscription call itself, once.
    /// Subsequent pulls return `Ok(Pull::Done(Termination::Failed))`.
    pub async fn next(&mut self) -> Result<Pull, RpcError> {
        if let Some(termination) = self.termination {
            return Ok(Pull::Done(termination));
        }
        if self.context.is_cancelled() {
            return Ok(self.finish(Termination::Cancelled));
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(self.finish(Termination::Closed));
        };

        let context = &self.context;
        let received = tokio::select! {
            biased;
            () = context.cancelled() => None,
            message = stream.message() => Some(message),
        };

        match received {
            None => Ok(self.finish(Termination::Cancelled)),
            Some(Ok(Some(message))) => match TimeEvent::try_from(message) {
                Ok(event) => {
                    self.delivered += 1;
                    Ok(Pull::Event(event))
                }
                Err(e) => {
                    self.finish(Termination::Failed);
                    Err(e)
                }
            },
            Some(Ok(None)) => Ok(self.finish(Termination::Closed)),
            Some(Err(status)) => match RpcError::from(status) {
                RpcError::Cancelled => Ok(self.finish(Termination::Cancelled)),
                e => {
                    tracing::debug!("Subscription failed after {} events: {e}", self.delivered);
                    self.finish(Termination::Failed);
                    Err(e)
                }
            },
        }
    }

    /// Ends the subscription now. Events the transport already buffered are
    /// discarded.
    pub fn cancel(&mut self) {
        self.context.cancel();
        self.finish(Termination::Cancelled);
    }

    /// Number of events handed to the consumer so far.
    pub const fn delivered(&self) -> u64 {
        self.delivered
    }

    /// `None` while the subscription is live.
    pub const fn termination(&self) -> Option<Termination> {
        self.termination
    }

    fn finish(&mut self, termination: Termination) -> Pull {
        if self.termination.is_none() {
            // Dropping the stream resets it on the wire and frees whatever it
            // had buffered.
            self.stream = None;
            self.termination = Some(termination);
            tracing::debug!(
                "Subscription ended ({termination:?}) after {} events",
                self.delivered
            );
        }
        Pull::Done(self.termination.unwrap_or(termination))
    }
}
