//! Wire codec.
//!
//! Outbound: `<code>+<key>+<json>` for keyed topics, `<code>+<json>` for
//! global ones. Unsubscribe frames always carry `{}` as parameters.
//!
//! Inbound: a JSON object whose `topic` string, split on the profile
//! delimiter, yields the routing tag (first segment) and routing key (second
//! segment). Frames without a topic are unroutable, not malformed.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ProtoError;
use crate::profile::ProtocolProfile;
use crate::topic::{KeyKind, SubscriptionKey, TopicFamily};

const SEPARATOR: char = '+';
const EMPTY_PARAMS: &str = "{}";

/// An outbound subscribe/unsubscribe control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    code: String,
    key: Option<String>,
    params: String,
}

impl ControlFrame {
    /// Build the frame that opens a subscription.
    ///
    /// `params` must serialize to a JSON object. Optional fields should be
    /// skipped when unset so the encoding stays deterministic.
    pub fn subscribe<P: Serialize>(
        family: TopicFamily,
        key: Option<&SubscriptionKey>,
        params: &P,
    ) -> Result<Self, ProtoError> {
        check_key(family, key)?;
        let params = serde_json::to_string(params)
            .map_err(|e| ProtoError::Encoding(format!("{family} parameters: {e}")))?;
        if !params.starts_with('{') {
            return Err(ProtoError::Encoding(format!(
                "{family} parameters must encode to a JSON object, got {params}"
            )));
        }
        Ok(Self {
            code: family.subscribe_code().to_string(),
            key: key.map(SubscriptionKey::wire),
            params,
        })
    }

    /// Build the paired frame that closes a subscription.
    pub fn unsubscribe(
        family: TopicFamily,
        key: Option<&SubscriptionKey>,
    ) -> Result<Self, ProtoError> {
        check_key(family, key)?;
        Ok(Self {
            code: family.unsubscribe_code().to_string(),
            key: key.map(SubscriptionKey::wire),
            params: EMPTY_PARAMS.to_string(),
        })
    }

    /// Parse control text back into its parts.
    pub fn parse(text: &str) -> Result<Self, ProtoError> {
        let (code, rest) = text
            .split_once(SEPARATOR)
            .ok_or_else(|| ProtoError::InvalidControlFrame(format!("no separator in {text:?}")))?;
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(ProtoError::InvalidControlFrame(format!(
                "bad topic code {code:?}"
            )));
        }

        let (key, params) = if rest.starts_with('{') {
            (None, rest)
        } else {
            let (key, params) = rest.split_once(SEPARATOR).ok_or_else(|| {
                ProtoError::InvalidControlFrame(format!("missing parameters in {text:?}"))
            })?;
            if key.is_empty() {
                return Err(ProtoError::InvalidControlFrame(format!(
                    "empty key in {text:?}"
                )));
            }
            (Some(key.to_string()), params)
        };

        match serde_json::from_str::<Value>(params) {
            Ok(Value::Object(_)) => {}
            Ok(other) => {
                return Err(ProtoError::InvalidControlFrame(format!(
                    "parameters are not an object: {other}"
                )));
            }
            Err(e) => return Err(ProtoError::InvalidControlFrame(e.to_string())),
        }

        Ok(Self {
            code: code.to_string(),
            key,
            params: params.to_string(),
        })
    }

    /// Topic code, e.g. `smd`.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Key segment, if the topic is keyed.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// JSON parameter object as sent.
    #[must_use]
    pub fn params(&self) -> &str {
        &self.params
    }

    /// Text sent on the wire.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ControlFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}{SEPARATOR}{key}{SEPARATOR}{}", self.code, self.params),
            None => write!(f, "{}{SEPARATOR}{}", self.code, self.params),
        }
    }
}

fn check_key(family: TopicFamily, key: Option<&SubscriptionKey>) -> Result<(), ProtoError> {
    if family.accepts(key) {
        return Ok(());
    }
    match (family.key_kind(), key) {
        (KeyKind::Contract | KeyKind::Account, None) => Err(ProtoError::MissingKey(family)),
        _ => Err(ProtoError::UnexpectedKey(family)),
    }
}

/// An inbound frame with its routing information extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    topic: Option<String>,
    tag: String,
    key: Option<String>,
    payload: Value,
}

impl DecodedFrame {
    /// Full topic string, if the frame carried one.
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Routing tag. Empty when the frame is unroutable.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Routing key (second topic segment), if present.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether a routing tag was found.
    #[must_use]
    pub fn is_routable(&self) -> bool {
        !self.tag.is_empty()
    }

    /// Parsed frame body.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Deserialize the body into a handler's payload type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtoError> {
        T::deserialize(&self.payload).map_err(|e| {
            ProtoError::Decoding(format!(
                "topic {}: {e}",
                self.topic.as_deref().unwrap_or("<none>")
            ))
        })
    }
}

/// Decode raw frame bytes into a routable frame.
///
/// Empty frames, non-object JSON, and objects without a string `topic` are
/// returned as unroutable frames. Bytes that are not JSON at all fail.
pub fn decode_frame(raw: &[u8], profile: ProtocolProfile) -> Result<DecodedFrame, ProtoError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(DecodedFrame {
            topic: None,
            tag: String::new(),
            key: None,
            payload: Value::Null,
        });
    }

    let payload: Value =
        serde_json::from_slice(raw).map_err(|e| ProtoError::Decoding(e.to_string()))?;

    let topic = payload
        .get("topic")
        .and_then(Value::as_str)
        .map(str::to_string);

    let (tag, key) = match topic.as_deref() {
        Some(topic) => {
            let mut segments = topic.split(profile.topic_delimiter());
            let tag = segments.next().unwrap_or_default().to_string();
            let key = segments
                .next()
                .filter(|segment| !segment.is_empty())
                .map(str::to_string);
            (tag, key)
        }
        None => (String::new(), None),
    };

    Ok(DecodedFrame {
        topic,
        tag,
        key,
        payload,
    })
}
