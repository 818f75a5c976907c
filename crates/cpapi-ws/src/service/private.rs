use cpapi_proto::messages::{
    AccountLedgerUpdate, AccountSummaryUpdate, OrdersUpdate, PnlUpdate, TradesUpdate,
};
use cpapi_proto::params::{
    AccountLedgerParams, AccountSummaryParams, OrdersParams, PnlParams, TradesParams,
};
use tokio_util::sync::CancellationToken;

use crate::error::{HandlerError, WsError};
use crate::registry::Subscription;
use crate::supervisor::{ErrorHandler, Session};

/// Account endpoint.
#[derive(Debug, Clone)]
pub struct PrivateService {
    session: Session,
}

impl PrivateService {
    /// Wrap a connected session.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// Underlying session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Run until `cancel` fires or the connection ends.
    ///
    /// # Errors
    ///
    /// See [`Session::start`].
    pub async fn start(
        &self,
        cancel: CancellationToken,
        on_error: Option<ErrorHandler>,
    ) -> Result<(), WsError> {
        self.session.start(cancel, on_error).await
    }

    /// Send the close frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the close frame cannot be written.
    pub async fn close(&self) -> Result<(), WsError> {
        self.session.close().await
    }

    /// Summary values for one account.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::AlreadySubscribed`] if the account is open.
    pub async fn subscribe_account_summary<F>(
        &self,
        params: &AccountSummaryParams,
        handler: F,
    ) -> Result<Subscription, WsError>
    where
        F: Fn(AccountSummaryUpdate) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.session.subscribe_with(params, handler).await
    }

    /// Stop the account summary stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the unsubscribe frame cannot be written.
    pub async fn unsubscribe_account_summary(
        &self,
        params: &AccountSummaryParams,
    ) -> Result<(), WsError> {
        self.session.unsubscribe_params(params).await
    }

    /// Ledger balances for one account.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::AlreadySubscribed`] if the account is open.
    pub async fn subscribe_account_ledger<F>(
        &self,
        params: &AccountLedgerParams,
        handler: F,
    ) -> Result<Subscription, WsError>
    where
        F: Fn(AccountLedgerUpdate) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.session.subscribe_with(params, handler).await
    }

    /// Stop the ledger stream for the listed accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the unsubscribe frame cannot be written.
    pub async fn unsubscribe_account_ledger(
        &self,
        params: &AccountLedgerParams,
    ) -> Result<(), WsError> {
        self.session.unsubscribe_params(params).await
    }

    /// Live orders. One per session.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::AlreadySubscribed`] if orders are open.
    pub async fn subscribe_orders<F>(
        &self,
        params: &OrdersParams,
        handler: F,
    ) -> Result<Subscription, WsError>
    where
        F: Fn(OrdersUpdate) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.session.subscribe_with(params, handler).await
    }

    /// Close the live orders stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the unsubscribe frame cannot be written.
    pub async fn unsubscribe_orders(&self) -> Result<(), WsError> {
        self.session.unsubscribe_params(&OrdersParams::default()).await
    }

    /// Profit and loss. One per session.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::AlreadySubscribed`] if the stream is open.
    pub async fn subscribe_pnl<F>(&self, handler: F) -> Result<Subscription, WsError>
    where
        F: Fn(PnlUpdate) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.session.subscribe_with(&PnlParams::default(), handler).await
    }

    /// Close the profit and loss stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the unsubscribe frame cannot be written.
    pub async fn unsubscribe_pnl(&self) -> Result<(), WsError> {
        self.session.unsubscribe_params(&PnlParams::default()).await
    }

    /// Executions. One per session.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::AlreadySubscribed`] if the stream is open.
    pub async fn subscribe_trades<F>(
        &self,
        params: &TradesParams,
        handler: F,
    ) -> Result<Subscription, WsError>
    where
        F: Fn(TradesUpdate) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.session.subscribe_with(params, handler).await
    }

    /// Close the trades stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the unsubscribe frame cannot be written.
    pub async fn unsubscribe_trades(&self) -> Result<(), WsError> {
        self.session.unsubscribe_params(&TradesParams::default()).await
    }
}
