//! # cpapi-proto
//!
//! Protocol definitions for the Client Portal gateway WebSocket.
//!
//! Outbound traffic is a flat, `+`-delimited control grammar
//! (`smd+265598+{"fields":["84"]}`); inbound traffic is JSON objects routed
//! by their `topic` field. This crate holds both directions plus the typed
//! parameter and payload shapes. It performs no I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod de;
pub mod error;
pub mod fields;
pub mod messages;
pub mod params;
pub mod profile;
pub mod topic;

pub use codec::{ControlFrame, DecodedFrame, decode_frame};
pub use error::ProtoError;
pub use profile::ProtocolProfile;
pub use topic::{Addressing, KeyKind, SubscriptionKey, TopicFamily, UnsolicitedTopic};
