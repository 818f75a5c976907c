use cpapi_proto::messages::{
    BookTraderUpdate, HistoricalMarketDataUpdate, MarketDataUpdate, TickerUpdate,
};
use cpapi_proto::params::{
    BookTraderParams, HistoricalMarketDataParams, MarketDataParams, TickerParams,
};
use tokio_util::sync::CancellationToken;

use crate::error::{HandlerError, WsError};
use crate::registry::Subscription;
use crate::supervisor::{ErrorHandler, Session};

/// Market data endpoint.
#[derive(Debug, Clone)]
pub struct PublicService {
    session: Session,
}

impl PublicService {
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

    /// Top-of-book quotes for one contract. One ticker per session.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::AlreadySubscribed`] if a ticker is open.
    pub async fn subscribe_ticker<F>(
        &self,
        params: &TickerParams,
        handler: F,
    ) -> Result<Subscription, WsError>
    where
        F: Fn(TickerUpdate) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.session.subscribe_with(params, handler).await
    }

    /// Close the ticker.
    ///
    /// # Errors
    ///
    /// Returns an error if the unsubscribe frame cannot be written.
    pub async fn unsubscribe_ticker(&self, params: &TickerParams) -> Result<(), WsError> {
        self.session.unsubscribe_params(params).await
    }

    /// Streaming fields for each listed contract.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::AlreadySubscribed`] if any contract is already
    /// streaming.
    pub async fn subscribe_market_data<F>(
        &self,
        params: &MarketDataParams,
        handler: F,
    ) -> Result<Subscription, WsError>
    where
        F: Fn(MarketDataUpdate) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.session.subscribe_with(params, handler).await
    }

    /// Stop streaming the listed contracts.
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    pub async fn unsubscribe_market_data(&self, params: &MarketDataParams) -> Result<(), WsError> {
        self.session.unsubscribe_params(params).await
    }

    /// Streaming bars for each listed contract.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::AlreadySubscribed`] if any contract is already
    /// streaming bars.
    pub async fn subscribe_historical_market_data<F>(
        &self,
        params: &HistoricalMarketDataParams,
        handler: F,
    ) -> Result<Subscription, WsError>
    where
        F: Fn(HistoricalMarketDataUpdate) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.session.subscribe_with(params, handler).await
    }

    /// Stop streaming bars.
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    pub async fn unsubscribe_historical_market_data(
        &self,
        params: &HistoricalMarketDataParams,
    ) -> Result<(), WsError> {
        self.session.unsubscribe_params(params).await
    }

    /// Depth for one contract.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::AlreadySubscribed`] if the contract's book is open.
    pub async fn subscribe_book_trader<F>(
        &self,
        params: &BookTraderParams,
        handler: F,
    ) -> Result<Subscription, WsError>
    where
        F: Fn(BookTraderUpdate) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.session.subscribe_with(params, handler).await
    }

    /// Close the contract's book.
    ///
    /// # Errors
    ///
    /// Returns an error if the unsubscribe frame cannot be written.
    pub async fn unsubscribe_book_trader(&self, params: &BookTraderParams) -> Result<(), WsError> {
        self.session.unsubscribe_params(params).await
    }
}
