//! Error types for the cpapi-proto crate.

use thiserror::Error;

use crate::topic::TopicFamily;

/// Errors that can occur during protocol operations.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Failed to encode subscription parameters.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Failed to decode an inbound frame or payload.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Text does not follow the `<code>[+<key>]+<json>` control grammar.
    #[error("invalid control frame: {0}")]
    InvalidControlFrame(String),

    /// The family needs a key and none was given.
    #[error("topic family {0} requires a subscription key")]
    MissingKey(TopicFamily),

    /// The family is keyless or expects a different kind of key.
    #[error("topic family {0} does not accept this subscription key")]
    UnexpectedKey(TopicFamily),
}
