//! Error taxonomy for request orchestration.
//!
//! # Kinds
//! - Connect: the actor could not be opened for the target URL
//! - Send: the actor was opened but the request was rejected before it went out
//! - Timeout: no terminal reply within the configured window
//! - Transport: the engine reported a failure mid-flight
//!
//! # Design Decisions
//! - Timeout is its own variant so callers can tell "never heard back" from
//!   "heard back with an error"
//! - Pool replacement failures never appear here; they are tracked by the pool

use thiserror::Error;

/// Failure to open a connection actor.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The URL could not be parsed or lacks a host.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The engine does not speak this scheme.
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    /// TCP connect failed (DNS, refused, unreachable).
    #[error("connect I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP handshake on an established socket failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Opening did not finish within the request timeout.
    #[error("connect timed out after {0} ms")]
    TimedOut(u64),
}

/// The actor refused to take the request.
#[derive(Debug, Error)]
pub enum SendError {
    /// Method, URI or a header could not be encoded.
    #[error("request rejected: {0}")]
    Invalid(String),

    /// The actor already has a request in flight.
    #[error("actor is busy with another request")]
    Busy,

    /// The actor task has stopped.
    #[error("actor has stopped")]
    ActorStopped,
}

/// Mid-flight failure reported by the transport engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The peer violated HTTP framing, or the engine produced an incomplete reply.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Connection reset or closed while the request was in flight.
    #[error("connection error: {0}")]
    Connection(String),

    /// The actor went away without delivering a terminal message.
    #[error("actor exited before completing the response")]
    ActorExited,
}

/// Errors surfaced to callers of `request` and `pool_request`.
#[derive(Debug, Error)]
pub enum Error {
    /// The request itself is malformed (unknown method, bad options, wrong origin).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("connect failed: {0}")]
    Connect(#[from] ConnectError),

    #[error("send failed: {0}")]
    Send(#[from] SendError),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The pool was closed while waiting for, or before, checkout.
    #[error("connection pool is closed")]
    PoolClosed,

    /// A pool or client was constructed with unusable settings.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "invalid",
            Error::Connect(_) => "connect",
            Error::Send(_) => "send",
            Error::Timeout => "timeout",
            Error::Transport(_) => "transport",
            Error::PoolClosed => "closed",
            Error::Config(_) => "config",
        }
    }

    /// Whether the actor that served this request can no longer be trusted.
    ///
    /// After a timeout or a transport failure the stream state of the
    /// connection is unknown, so a pooled actor must be replaced.
    pub fn taints_connection(&self) -> bool {
        matches!(
            self,
            Error::Timeout
                | Error::Transport(_)
                | Error::Send(SendError::ActorStopped)
                | Error::Send(SendError::Busy)
        )
    }
}

/// Result type for request operations.
pub type Result<T> = std::result::Result<T, Error>;
