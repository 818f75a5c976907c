//! Error types for cpapi-ws.

use std::time::Duration;

use cpapi_proto::{ProtoError, TopicFamily};
use thiserror::Error;

/// Boxed error returned by subscription callbacks.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Why a read from the gateway failed.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Normal closure, initiated by either side.
    #[error("connection closed")]
    GracefulClose,

    /// The peer closed with a non-normal status code.
    #[error("connection closed abnormally: {0}")]
    ClosedAbnormally(String),

    /// No pong arrived within the read deadline.
    #[error("no pong received within {0:?}")]
    DeadlineExceeded(Duration),

    /// Transport or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ReadError {
    /// Whether this is an expected, normal termination.
    #[must_use]
    pub const fn is_graceful(&self) -> bool {
        matches!(self, Self::GracefulClose)
    }
}

/// Errors that can occur in session operations.
#[derive(Debug, Error)]
pub enum WsError {
    /// Dial or handshake failed.
    #[error("gateway connection failed: {0}")]
    Connection(String),

    /// A frame could not be written.
    #[error("write failed: {0}")]
    Write(String),

    /// The read loop failed.
    #[error("read failed: {0}")]
    Read(#[from] ReadError),

    /// An exclusive slot, or the same key, is already subscribed.
    #[error("{0} is already subscribed")]
    AlreadySubscribed(TopicFamily),

    /// An inbound frame or payload could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] ProtoError),

    /// A subscription callback returned an error.
    #[error("handler for topic {topic} failed: {source}")]
    Handler {
        /// Topic of the frame being handled.
        topic: String,
        /// Error returned by the callback.
        #[source]
        source: HandlerError,
    },

    /// The session has been closed.
    #[error("session is closed")]
    SessionClosed,

    /// The operation is not valid in the current session state.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WsError {
    /// Whether the error reports a normal closure of the connection.
    #[must_use]
    pub const fn is_graceful_close(&self) -> bool {
        matches!(self, Self::Read(e) if e.is_graceful())
    }
}
