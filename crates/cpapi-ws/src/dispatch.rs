//! Topic dispatcher.
//!
//! Handlers live in a table keyed by routing tag and optional routing key.
//! A frame goes to the handler registered under its exact `(tag, key)`,
//! otherwise to the tag's exclusive slot `(tag, None)`, otherwise nowhere.
//! Unsolicited tags go to their channels instead.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use cpapi_proto::{
    Addressing, DecodedFrame, ProtocolProfile, SubscriptionKey, TopicFamily, UnsolicitedTopic,
    decode_frame,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{HandlerError, WsError};
use crate::unsolicited::UnsolicitedChannels;

/// What happens to a frame that cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorPolicy {
    /// End the read loop with [`WsError::Decode`].
    #[default]
    Fatal,
    /// Log the failure, drop the frame, keep reading.
    Isolate,
}

/// Receives frames routed to one subscription slot.
pub trait FrameHandler: Send + Sync {
    /// Handle one frame. An error ends the read loop.
    fn handle(&self, frame: &DecodedFrame) -> Result<(), WsError>;
}

/// Adapts a typed callback into a [`FrameHandler`].
pub struct TypedHandler<T, F> {
    callback: F,
    _payload: PhantomData<fn() -> T>,
}

impl<T, F> TypedHandler<T, F>
where
    T: DeserializeOwned,
    F: Fn(T) -> Result<(), HandlerError> + Send + Sync,
{
    /// Wrap a callback taking the decoded payload.
    pub const fn new(callback: F) -> Self {
        Self {
            callback,
            _payload: PhantomData,
        }
    }
}

impl<T, F> FrameHandler for TypedHandler<T, F>
where
    T: DeserializeOwned,
    F: Fn(T) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, frame: &DecodedFrame) -> Result<(), WsError> {
        let payload = frame.payload_as::<T>()?;
        (self.callback)(payload).map_err(|source| WsError::Handler {
            topic: frame.topic().unwrap_or_default().to_string(),
            source,
        })
    }
}

/// Address of a handler slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    tag: String,
    key: Option<String>,
}

impl RouteKey {
    /// Slot a subscription of `family` under `key` occupies.
    ///
    /// Exclusive families always occupy the tag's keyless slot.
    #[must_use]
    pub fn for_subscription(family: TopicFamily, key: Option<&SubscriptionKey>) -> Self {
        let key = match family.addressing() {
            Addressing::Exclusive => None,
            Addressing::Keyed => key.map(SubscriptionKey::wire),
        };
        Self {
            tag: family.routing_tag().to_string(),
            key,
        }
    }

    /// Routing tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Routing key, if keyed.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}+{key}", self.tag),
            None => f.write_str(&self.tag),
        }
    }
}

/// Why a frame reached no handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No `topic` field.
    Unroutable,
    /// No handler or channel for the topic.
    NoHandler,
    /// Decoding failed under [`DecodeErrorPolicy::Isolate`].
    Malformed,
}

/// Result of dispatching one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler or channel accepted the frame.
    Delivered,
    /// Nobody received the frame.
    Dropped(DropReason),
}

struct Slot {
    id: u64,
    handler: Arc<dyn FrameHandler>,
}

/// Routes decoded frames to handlers and unsolicited channels.
pub struct Dispatcher {
    routes: RwLock<HashMap<RouteKey, Slot>>,
    unsolicited: UnsolicitedChannels,
    profile: ProtocolProfile,
    decode_errors: DecodeErrorPolicy,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.read().keys().collect::<Vec<_>>())
            .field("unsolicited", &self.unsolicited)
            .field("profile", &self.profile)
            .field("decode_errors", &self.decode_errors)
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher with no handlers.
    #[must_use]
    pub fn new(
        profile: ProtocolProfile,
        decode_errors: DecodeErrorPolicy,
        unsolicited: UnsolicitedChannels,
    ) -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            unsolicited,
            profile,
            decode_errors,
        }
    }

    /// Install a handler. Replaces whatever held the slot.
    pub fn register(&self, route: RouteKey, id: u64, handler: Arc<dyn FrameHandler>) {
        trace!(route = %route, id, "handler registered");
        self.routes.write().insert(route, Slot { id, handler });
    }

    /// Remove the handler if the slot still belongs to registration `id`.
    pub fn unregister(&self, route: &RouteKey, id: u64) -> bool {
        let mut routes = self.routes.write();
        if routes.get(route).is_some_and(|slot| slot.id == id) {
            routes.remove(route);
            trace!(route = %route, id, "handler removed");
            true
        } else {
            false
        }
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.routes.write().clear();
    }

    /// Number of installed handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.routes.read().len()
    }

    /// Whether a handler occupies the slot.
    #[must_use]
    pub fn is_registered(&self, route: &RouteKey) -> bool {
        self.routes.read().contains_key(route)
    }

    /// Decode raw bytes and hand the frame to its handler.
    ///
    /// # Errors
    ///
    /// Handler errors are always returned. Decode errors are returned under
    /// [`DecodeErrorPolicy::Fatal`] and turned into a drop otherwise.
    pub async fn dispatch(&self, raw: &[u8]) -> Result<DispatchOutcome, WsError> {
        let frame = match decode_frame(raw, self.profile) {
            Ok(frame) => frame,
            Err(e) => return self.on_decode_error(None, e.into()),
        };

        if !frame.is_routable() {
            trace!("frame without topic dropped");
            return Ok(DispatchOutcome::Dropped(DropReason::Unroutable));
        }

        if let Some(topic) = UnsolicitedTopic::from_tag(frame.tag()) {
            return match self.unsolicited.deliver(topic, &frame).await {
                Ok(true) => Ok(DispatchOutcome::Delivered),
                Ok(false) => Ok(DispatchOutcome::Dropped(DropReason::NoHandler)),
                Err(e) => self.on_decode_error(frame.topic(), e.into()),
            };
        }

        let Some(handler) = self.lookup(&frame) else {
            trace!(topic = frame.topic(), "no handler for topic");
            return Ok(DispatchOutcome::Dropped(DropReason::NoHandler));
        };

        match handler.handle(&frame) {
            Ok(()) => Ok(DispatchOutcome::Delivered),
            Err(e @ WsError::Decode(_)) => self.on_decode_error(frame.topic(), e),
            Err(e) => Err(e),
        }
    }

    fn lookup(&self, frame: &DecodedFrame) -> Option<Arc<dyn FrameHandler>> {
        let routes = self.routes.read();
        let mut route = RouteKey {
            tag: frame.tag().to_string(),
            key: frame.key().map(str::to_string),
        };
        if let Some(slot) = routes.get(&route) {
            return Some(Arc::clone(&slot.handler));
        }
        route.key = None;
        routes.get(&route).map(|slot| Arc::clone(&slot.handler))
    }

    fn on_decode_error(
        &self,
        topic: Option<&str>,
        err: WsError,
    ) -> Result<DispatchOutcome, WsError> {
        match self.decode_errors {
            DecodeErrorPolicy::Fatal => Err(err),
            DecodeErrorPolicy::Isolate => {
                warn!(topic, error = %err, "dropping frame that failed to decode");
                Ok(DispatchOutcome::Dropped(DropReason::Malformed))
            }
        }
    }
}
