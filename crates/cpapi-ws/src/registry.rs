//! Subscription registry.
//!
//! Tracks which `(family, key)` pairs are open on a session and drives the
//! subscribe sequence: reserve, write the control frame, install the handler,
//! activate. A failure at any step leaves no entry behind; a failure after
//! the frame went out also sends the paired unsubscribe frame.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cpapi_proto::params::SubscriptionParams;
use cpapi_proto::{Addressing, ControlFrame, SubscriptionKey, TopicFamily};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::dispatch::{Dispatcher, FrameHandler, RouteKey};
use crate::error::WsError;
use crate::supervisor::Session;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    family: TopicFamily,
    key: Option<SubscriptionKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Reserved; the subscribe frame may not be on the wire yet.
    Pending,
    Active,
}

#[derive(Debug)]
struct Entry {
    id: u64,
    phase: Phase,
}

/// Open subscriptions of one session.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<EntryKey, Entry>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Active `(family, key)` pairs.
    #[must_use]
    pub fn active(&self) -> Vec<(TopicFamily, Option<SubscriptionKey>)> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.phase == Phase::Active)
            .map(|(k, _)| (k.family, k.key.clone()))
            .collect()
    }

    /// Whether `(family, key)` is active.
    #[must_use]
    pub fn is_active(&self, family: TopicFamily, key: Option<&SubscriptionKey>) -> bool {
        self.entries
            .lock()
            .get(&EntryKey {
                family,
                key: key.cloned(),
            })
            .is_some_and(|entry| entry.phase == Phase::Active)
    }

    /// Drop every entry. Used when the session ends.
    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Reserve every key or none. Exclusive families admit one entry in
    /// total; keyed families admit one per key. Families sharing a
    /// subscribe code also share the gateway stream for a key, so a key
    /// held by one of them is taken for all.
    fn reserve(
        &self,
        family: TopicFamily,
        keys: &[Option<SubscriptionKey>],
    ) -> Result<Vec<u64>, WsError> {
        let requested: HashSet<&Option<SubscriptionKey>> = keys.iter().collect();
        if requested.len() != keys.len()
            || (family.addressing() == Addressing::Exclusive && keys.len() > 1)
        {
            return Err(WsError::AlreadySubscribed(family));
        }

        let mut entries = self.entries.lock();
        let occupied = entries.keys().any(|k| {
            (family.addressing() == Addressing::Exclusive && k.family == family)
                || (k.family.subscribe_code() == family.subscribe_code()
                    && requested.contains(&k.key))
        });
        if occupied {
            return Err(WsError::AlreadySubscribed(family));
        }

        let ids = keys
            .iter()
            .map(|key| {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                entries.insert(
                    EntryKey {
                        family,
                        key: key.clone(),
                    },
                    Entry {
                        id,
                        phase: Phase::Pending,
                    },
                );
                id
            })
            .collect();
        Ok(ids)
    }

    /// Mark a reserved entry active. Fails if it is no longer ours.
    fn activate(&self, family: TopicFamily, key: Option<&SubscriptionKey>, id: u64) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(&EntryKey {
            family,
            key: key.cloned(),
        }) {
            Some(entry) if entry.id == id => {
                entry.phase = Phase::Active;
                true
            }
            _ => false,
        }
    }

    /// Remove an entry. `id` narrows removal to one registration; `None`
    /// removes whatever active entry holds the pair. Pending entries are
    /// left to their subscribe call.
    fn remove(&self, family: TopicFamily, key: Option<&SubscriptionKey>, id: Option<u64>) -> Option<u64> {
        let mut entries = self.entries.lock();
        let entry_key = EntryKey {
            family,
            key: key.cloned(),
        };
        let entry = entries.get(&entry_key)?;
        let matches = match id {
            Some(id) => entry.id == id,
            None => entry.phase == Phase::Active,
        };
        if !matches {
            return None;
        }
        entries.remove(&entry_key).map(|entry| entry.id)
    }

    /// Open a subscription.
    ///
    /// Returns one `(key, registration id)` pair per key, in key order.
    pub(crate) async fn subscribe<P: SubscriptionParams>(
        &self,
        connection: &Connection,
        dispatcher: &Dispatcher,
        params: &P,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<Vec<(Option<SubscriptionKey>, u64)>, WsError> {
        let family = params.family();
        let frames = params.subscribe_frames()?;
        let keys: Vec<_> = frames.iter().map(|kf| kf.key.clone()).collect();
        let ids = self.reserve(family, &keys)?;

        let mut opened: Vec<(Option<SubscriptionKey>, u64)> = Vec::with_capacity(frames.len());
        for (index, (keyed, id)) in frames.into_iter().zip(ids.iter().copied()).enumerate() {
            let result = self
                .open_one(connection, dispatcher, family, keyed.key.as_ref(), &keyed.frame, id, &handler)
                .await;
            if let Err(e) = result {
                for (key, pending_id) in keys.iter().zip(&ids).skip(index + 1) {
                    self.remove(family, key.as_ref(), Some(*pending_id));
                }
                for (key, opened_id) in &opened {
                    self.close_one(connection, dispatcher, family, key.as_ref(), Some(*opened_id))
                        .await
                        .ok();
                }
                return Err(e);
            }
            opened.push((keyed.key, id));
        }

        debug!(family = %family, keys = opened.len(), "subscribed");
        Ok(opened)
    }

    #[allow(clippy::too_many_arguments)]
    async fn open_one(
        &self,
        connection: &Connection,
        dispatcher: &Dispatcher,
        family: TopicFamily,
        key: Option<&SubscriptionKey>,
        frame: &ControlFrame,
        id: u64,
        handler: &Arc<dyn FrameHandler>,
    ) -> Result<(), WsError> {
        if let Err(e) = connection.write_text(&frame.encode()).await {
            self.remove(family, key, Some(id));
            return Err(e);
        }

        let route = RouteKey::for_subscription(family, key);
        dispatcher.register(route.clone(), id, Arc::clone(handler));
        if self.activate(family, key, id) {
            return Ok(());
        }

        // The entry vanished while the frame was in flight, so the session
        // is being torn down. Undo what the gateway has seen.
        dispatcher.unregister(&route, id);
        let unsubscribe = ControlFrame::unsubscribe(family, key)?;
        if let Err(e) = connection.write_text(&unsubscribe.encode()).await {
            warn!(family = %family, error = %e, "compensating unsubscribe not sent");
        }
        Err(WsError::InvalidState(format!(
            "{family} subscription cancelled while opening"
        )))
    }

    /// Close one subscription if it is still open. Returns whether an
    /// unsubscribe frame was sent.
    pub(crate) async fn close_one(
        &self,
        connection: &Connection,
        dispatcher: &Dispatcher,
        family: TopicFamily,
        key: Option<&SubscriptionKey>,
        id: Option<u64>,
    ) -> Result<bool, WsError> {
        let Some(removed) = self.remove(family, key, id) else {
            return Ok(false);
        };
        dispatcher.unregister(&RouteKey::for_subscription(family, key), removed);

        let frame = ControlFrame::unsubscribe(family, key)?;
        connection.write_text(&frame.encode()).await?;
        debug!(family = %family, key = ?key, "unsubscribed");
        Ok(true)
    }
}

/// Handle to an open subscription.
///
/// [`Subscription::unsubscribe`] sends the paired unsubscribe frames once;
/// later calls do nothing. Dropping the handle leaves the subscription open.
#[derive(Debug)]
pub struct Subscription {
    session: Session,
    family: TopicFamily,
    entries: Vec<(Option<SubscriptionKey>, u64)>,
    closed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        session: Session,
        family: TopicFamily,
        entries: Vec<(Option<SubscriptionKey>, u64)>,
    ) -> Self {
        Self {
            session,
            family,
            entries,
            closed: AtomicBool::new(false),
        }
    }

    /// Topic family of this subscription.
    #[must_use]
    pub const fn family(&self) -> TopicFamily {
        self.family
    }

    /// Keys covered by this subscription.
    pub fn keys(&self) -> impl Iterator<Item = Option<&SubscriptionKey>> {
        self.entries.iter().map(|(key, _)| key.as_ref())
    }

    /// Whether `unsubscribe` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the subscription. Keys already closed through
    /// [`Session::unsubscribe`] are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first write error. Local state is cleared even then.
    pub async fn unsubscribe(&self) -> Result<(), WsError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut first_err = None;
        for (key, id) in &self.entries {
            let result = self
                .session
                .close_registration(self.family, key.as_ref(), Some(*id))
                .await;
            if let Err(e) = result {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
