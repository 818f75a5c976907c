//! Session supervisor.
//!
//! [`Session::start`] spawns the read loop, pings on a fixed interval, and
//! waits for cancellation. The read loop owns teardown when it fails; the
//! supervisor owns it when cancelled.

use std::sync::Arc;

use cpapi_proto::SubscriptionKey;
use cpapi_proto::TopicFamily;
use cpapi_proto::params::SubscriptionParams;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::WsConfig;
use crate::connection::Connection;
use crate::dispatch::{DispatchOutcome, Dispatcher, FrameHandler, TypedHandler};
use crate::error::{HandlerError, WsError};
use crate::keepalive::KeepaliveConfig;
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::state::{AtomicSessionState, SessionState};
use crate::unsolicited::UnsolicitedChannels;

/// Called once when the read loop ends: `(was_graceful_close, error)`.
pub type ErrorHandler = Box<dyn FnOnce(bool, WsError) + Send>;

#[derive(Debug)]
struct SessionInner {
    connection: Connection,
    dispatcher: Dispatcher,
    registry: SubscriptionRegistry,
    state: AtomicSessionState,
    keepalive: KeepaliveConfig,
}

/// A live gateway session. Cheap to clone; clones share the connection.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Dial the gateway and prepare a session in the `Idle` state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the dial fails.
    pub async fn connect(
        config: &WsConfig,
        token: &str,
        unsolicited: UnsolicitedChannels,
    ) -> Result<Self, WsError> {
        config.validate()?;
        let connection = Connection::dial(config, token).await?;
        let dispatcher = Dispatcher::new(config.profile, config.decode_errors, unsolicited);
        Ok(Self::new(connection, dispatcher, config.keepalive()))
    }

    /// Assemble a session from its parts.
    #[must_use]
    pub fn new(connection: Connection, dispatcher: Dispatcher, keepalive: KeepaliveConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                connection,
                dispatcher,
                registry: SubscriptionRegistry::new(),
                state: AtomicSessionState::new(SessionState::Idle),
                keepalive,
            }),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.load()
    }

    /// Underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    /// Frame dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Open subscriptions.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    /// Run the session until cancellation or until the read loop ends.
    ///
    /// `on_error` receives the read loop's terminal error, including the
    /// normal closure that follows cancellation. It is not called when the
    /// supervisor has to stop the read loop itself, either because a
    /// keepalive ping failed or because the peer did not answer the close
    /// within the grace period.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::InvalidState`] if the session was already started,
    /// a write error if a keepalive ping fails, or the close-frame error on
    /// cancellation.
    pub async fn start(
        &self,
        cancel: CancellationToken,
        on_error: Option<ErrorHandler>,
    ) -> Result<(), WsError> {
        self.inner
            .state
            .transition(SessionState::Idle, SessionState::Running)
            .map_err(|state| WsError::InvalidState(format!("cannot start a {state:?} session")))?;
        info!("session started");

        let mut reader = tokio::spawn(self.clone().read_loop(on_error));

        let period = self.inner.keepalive.ping_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                joined = &mut reader => {
                    if let Err(e) = joined {
                        warn!(error = %e, "read loop task failed");
                    }
                    self.inner.state.store(SessionState::Closed);
                    return Ok(());
                }
                _ = ticker.tick() => match self.ping().await {
                    Ok(()) => {}
                    Err(WsError::SessionClosed) => {
                        // A close is already underway; the read loop finishes it.
                        if let Err(e) = (&mut reader).await {
                            warn!(error = %e, "read loop task failed");
                        }
                        self.inner.state.store(SessionState::Closed);
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(error = %e, "keepalive ping failed");
                        stop_reader(&mut reader).await;
                        self.teardown().await;
                        self.inner.state.store(SessionState::Closed);
                        return Err(e);
                    }
                },
                () = cancel.cancelled() => {
                    return self.shutdown(reader).await;
                }
            }
        }
    }

    async fn shutdown(&self, mut reader: JoinHandle<()>) -> Result<(), WsError> {
        info!("cancellation received, closing session");
        self.inner.state.store(SessionState::Closing);
        let result = self.close().await;

        let grace = self.inner.keepalive.close_grace;
        match tokio::time::timeout(grace, &mut reader).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "read loop task failed"),
            Err(_) => {
                debug!(?grace, "read loop still running after close grace");
                stop_reader(&mut reader).await;
                self.teardown().await;
            }
        }
        self.inner.state.store(SessionState::Closed);
        result
    }

    async fn read_loop(self, on_error: Option<ErrorHandler>) {
        let err = loop {
            if let Err(e) = self.run_once().await {
                break e;
            }
        };

        let graceful = err.is_graceful_close();
        if graceful {
            debug!("read loop ended by normal closure");
        } else {
            warn!(error = %err, "read loop failed");
        }
        self.teardown().await;
        // Closing belongs to the supervisor; only a failure in Running ends here.
        let _ = self
            .inner
            .state
            .transition(SessionState::Running, SessionState::Closed);

        if let Some(handler) = on_error {
            handler(graceful, err);
        }
    }

    /// Read one frame and dispatch it.
    ///
    /// # Errors
    ///
    /// Returns read errors, handler errors, and decode errors under the
    /// fatal policy.
    pub async fn run_once(&self) -> Result<DispatchOutcome, WsError> {
        let raw = self.inner.connection.read_next().await?;
        let outcome = self.inner.dispatcher.dispatch(&raw).await?;
        if let DispatchOutcome::Dropped(reason) = outcome {
            trace!(?reason, "frame dropped");
        }
        Ok(outcome)
    }

    /// Send a keepalive ping.
    ///
    /// # Errors
    ///
    /// Returns an error if the ping cannot be written.
    pub async fn ping(&self) -> Result<(), WsError> {
        self.inner.connection.ping().await
    }

    /// Send the close frame. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the close frame cannot be written.
    pub async fn close(&self) -> Result<(), WsError> {
        self.inner.connection.close().await
    }

    async fn teardown(&self) {
        self.inner.connection.shutdown().await;
        self.inner.registry.clear();
        self.inner.dispatcher.clear();
    }

    fn ensure_usable(&self) -> Result<(), WsError> {
        match self.state() {
            SessionState::Idle | SessionState::Running if self.inner.connection.is_open() => Ok(()),
            _ => Err(WsError::SessionClosed),
        }
    }

    /// Subscribe with an arbitrary frame handler.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::AlreadySubscribed`] without writing anything if the
    /// slot is taken, or the encode or write error otherwise.
    pub async fn subscribe<P: SubscriptionParams>(
        &self,
        params: &P,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<Subscription, WsError> {
        self.ensure_usable()?;
        let entries = self
            .inner
            .registry
            .subscribe(&self.inner.connection, &self.inner.dispatcher, params, handler)
            .await?;
        Ok(Subscription::new(self.clone(), params.family(), entries))
    }

    /// Subscribe with a callback taking the decoded payload.
    ///
    /// # Errors
    ///
    /// Same as [`Session::subscribe`].
    pub async fn subscribe_with<P, T, F>(&self, params: &P, callback: F) -> Result<Subscription, WsError>
    where
        P: SubscriptionParams,
        T: DeserializeOwned + 'static,
        F: Fn(T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.subscribe(params, Arc::new(TypedHandler::new(callback)))
            .await
    }

    /// Close `(family, key)` without the [`Subscription`] handle. Returns
    /// whether anything was open.
    ///
    /// # Errors
    ///
    /// Returns an error if the unsubscribe frame cannot be written.
    pub async fn unsubscribe(
        &self,
        family: TopicFamily,
        key: Option<&SubscriptionKey>,
    ) -> Result<bool, WsError> {
        self.close_registration(family, key, None).await
    }

    /// Close every key the parameters cover.
    ///
    /// # Errors
    ///
    /// Returns the first write error; remaining keys are still cleared.
    pub async fn unsubscribe_params<P: SubscriptionParams>(&self, params: &P) -> Result<(), WsError> {
        let mut first_err = None;
        for key in params.keys() {
            if let Err(e) = self.unsubscribe(params.family(), key.as_ref()).await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub(crate) async fn close_registration(
        &self,
        family: TopicFamily,
        key: Option<&SubscriptionKey>,
        id: Option<u64>,
    ) -> Result<bool, WsError> {
        self.inner
            .registry
            .close_one(&self.inner.connection, &self.inner.dispatcher, family, key, id)
            .await
    }
}

/// Abort the read loop and wait until it is gone. Its error handler is
/// dropped unused.
async fn stop_reader(reader: &mut JoinHandle<()>) {
    reader.abort();
    if let Some(e) = reader.await.err().filter(|e| !e.is_cancelled()) {
        warn!(error = %e, "read loop task failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Accept one client and hold its socket without reading until told to
    /// let go.
    async fn silent_gateway() -> (WsConfig, oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (release_tx, release_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("server handshake");
            let _ = release_rx.await;
            drop(ws);
        });

        let config = WsConfig::default()
            .with_base_url(format!("ws://{addr}"))
            .with_keepalive(KeepaliveConfig {
                ping_interval: Duration::from_millis(50),
                read_deadline: Duration::from_secs(30),
                close_grace: Duration::from_millis(100),
            });
        (config, release_tx)
    }

    #[tokio::test]
    async fn test_failed_ping_ends_session_without_reader() {
        let (config, _release) = silent_gateway().await;
        let session = Session::connect(&config, "token", UnsolicitedChannels::new())
            .await
            .expect("connect");
        session.connection().close_sink().await;

        let (tx, rx) = oneshot::channel();
        let on_error: ErrorHandler = Box::new(move |graceful: bool, err: WsError| {
            let _ = tx.send((graceful, err.to_string()));
        });
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            session.start(CancellationToken::new(), Some(on_error)),
        )
        .await
        .expect("start returned")
        .expect_err("ping cannot be written");

        assert!(matches!(err, WsError::Write(_)), "got {err:?}");
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.connection().is_open());
        // The reader was aborted, so its error handler was dropped unused.
        assert!(rx.await.is_err());
    }
}
