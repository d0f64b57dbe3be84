//! Error types for the hyperclock service and its clients.
//!
//! The server side reports failures through [`Error`], which converts into a
//! [`tonic::Status`] with an appropriate code. Clients see the other half of
//! the taxonomy:
//!
//! - [`ConnectionError`]: the endpoint could not be reached, the handshake
//!   failed, or the connection was already closed. Fatal to that connection
//!   only.
//! - [`RpcError`]: a single call failed. `Cancelled` is a benign outcome
//!   (a context fired), `Timeout` means the call deadline elapsed, and
//!   `Transport` covers everything else the server or the wire reported.
//! - [`ClientError`]: either of the above, used where a unit of work opens its
//!   own connection before calling.

use core::fmt;
use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified server-side error type.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The client request was invalid.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// An arithmetic update would not fit in the result type.
    #[error("Overflow: {context}")]
    Overflow { context: String },

    /// The client aborted the request.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {}", context))
            }
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::Overflow { context } => Status::out_of_range(context),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

/// Failure to establish or use a connection.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConnectionError {
    /// The address could not be turned into an endpoint URI.
    #[error("invalid address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The endpoint refused the connection, timed out, or the HTTP/2
    /// handshake failed.
    #[error("unable to connect to `{address}`: {reason}")]
    Unreachable { address: String, reason: String },

    /// The connection was closed before a stub could be bound to it.
    #[error("connection to `{address}` is closed")]
    Closed { address: String },
}

/// Failure of a single call.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum RpcError {
    /// The per-call deadline elapsed before a response arrived.
    #[error("call deadline exceeded")]
    Timeout,

    /// The call context fired, or the server reported the call as cancelled.
    #[error("call cancelled")]
    Cancelled,

    /// Any other failure reported by the server or the transport.
    #[error("transport failure ({code:?}): {message}")]
    Transport { code: Code, message: String },
}

impl RpcError {
    pub(crate) fn transport(code: Code, message: impl fmt::Display) -> Self {
        Self::Transport {
            code,
            message: message.to_string(),
        }
    }

    /// Returns the gRPC code behind this error.
    pub const fn code(&self) -> Code {
        match self {
            Self::Timeout => Code::DeadlineExceeded,
            Self::Cancelled => Code::Cancelled,
            Self::Transport { code, .. } => *code,
        }
    }
}

impl From<Status> for RpcError {
    fn from(status: Status) -> Self {
        match status.code() {
            Code::DeadlineExceeded => Self::Timeout,
            Code::Cancelled => Self::Cancelled,
            code => Self::Transport {
                code,
                message: status.message().to_string(),
            },
        }
    }
}

/// Failure of a unit of work that may open its own connection.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum ClientError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}
