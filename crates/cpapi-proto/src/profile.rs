//! Gateway protocol profiles.
//!
//! Gateway builds disagree on how inbound topics are delimited and on whether
//! an application-level keepalive text is needed next to protocol pings.
//! Outbound control frames use the `+` grammar under every profile.

use serde::{Deserialize, Serialize};

/// Protocol dialect spoken by the target gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolProfile {
    /// Current gateways: `smd+265598` topics, protocol pings only.
    #[default]
    Standard,
    /// Older gateways: `-` delimited topics and a `tic` text keepalive.
    Legacy,
}

impl ProtocolProfile {
    /// Delimiter separating the routing tag from per-request suffixes in
    /// inbound topics.
    #[must_use]
    pub const fn topic_delimiter(self) -> char {
        match self {
            Self::Standard => '+',
            Self::Legacy => '-',
        }
    }

    /// Text frame sent after every protocol ping, if any.
    #[must_use]
    pub const fn application_ping(self) -> Option<&'static str> {
        match self {
            Self::Standard => None,
            Self::Legacy => Some("tic"),
        }
    }
}
