//! Channels for server-initiated topics.
//!
//! Set once, before the session starts. A topic without a channel is
//! dropped; a channel whose receiver is gone is treated the same way.

use cpapi_proto::messages::{AccountUpdates, AuthStatus, Bulletin, Notification, SystemConnection};
use cpapi_proto::{DecodedFrame, ProtoError, UnsolicitedTopic};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

/// Destination channels for unsolicited topics.
#[derive(Debug, Clone, Default)]
pub struct UnsolicitedChannels {
    system: Option<mpsc::Sender<SystemConnection>>,
    auth_status: Option<mpsc::Sender<AuthStatus>>,
    bulletins: Option<mpsc::Sender<Bulletin>>,
    account_updates: Option<mpsc::Sender<AccountUpdates>>,
    notifications: Option<mpsc::Sender<Notification>>,
}

impl UnsolicitedChannels {
    /// No channels; every unsolicited frame is dropped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive `system` frames.
    #[must_use]
    pub fn with_system(mut self, tx: mpsc::Sender<SystemConnection>) -> Self {
        self.system = Some(tx);
        self
    }

    /// Receive `sts` frames.
    #[must_use]
    pub fn with_auth_status(mut self, tx: mpsc::Sender<AuthStatus>) -> Self {
        self.auth_status = Some(tx);
        self
    }

    /// Receive `blt` frames.
    #[must_use]
    pub fn with_bulletins(mut self, tx: mpsc::Sender<Bulletin>) -> Self {
        self.bulletins = Some(tx);
        self
    }

    /// Receive `act` frames.
    #[must_use]
    pub fn with_account_updates(mut self, tx: mpsc::Sender<AccountUpdates>) -> Self {
        self.account_updates = Some(tx);
        self
    }

    /// Receive `ntf` frames.
    #[must_use]
    pub fn with_notifications(mut self, tx: mpsc::Sender<Notification>) -> Self {
        self.notifications = Some(tx);
        self
    }

    /// Whether a channel is registered for the topic.
    #[must_use]
    pub const fn is_registered(&self, topic: UnsolicitedTopic) -> bool {
        match topic {
            UnsolicitedTopic::SystemConnection => self.system.is_some(),
            UnsolicitedTopic::AuthStatus => self.auth_status.is_some(),
            UnsolicitedTopic::Bulletins => self.bulletins.is_some(),
            UnsolicitedTopic::AccountUpdates => self.account_updates.is_some(),
            UnsolicitedTopic::Notifications => self.notifications.is_some(),
        }
    }

    /// Forward a frame to its channel. Returns whether it was delivered.
    ///
    /// Waits for capacity, so a slow consumer slows the read loop.
    pub(crate) async fn deliver(
        &self,
        topic: UnsolicitedTopic,
        frame: &DecodedFrame,
    ) -> Result<bool, ProtoError> {
        match topic {
            UnsolicitedTopic::SystemConnection => send_to(self.system.as_ref(), frame).await,
            UnsolicitedTopic::AuthStatus => send_to(self.auth_status.as_ref(), frame).await,
            UnsolicitedTopic::Bulletins => send_to(self.bulletins.as_ref(), frame).await,
            UnsolicitedTopic::AccountUpdates => send_to(self.account_updates.as_ref(), frame).await,
            UnsolicitedTopic::Notifications => send_to(self.notifications.as_ref(), frame).await,
        }
    }
}

async fn send_to<T: DeserializeOwned>(
    tx: Option<&mpsc::Sender<T>>,
    frame: &DecodedFrame,
) -> Result<bool, ProtoError> {
    let Some(tx) = tx else {
        return Ok(false);
    };
    let payload = frame.payload_as::<T>()?;
    Ok(tx.send(payload).await.is_ok())
}
