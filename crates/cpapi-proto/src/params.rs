//! Typed subscription parameters.
//!
//! Each parameter type knows its topic family, the keys it subscribes under,
//! and how its JSON parameter object is encoded. Optional fields are skipped
//! when unset; the only always-present optional-looking field is
//! `outsideRth`, which the gateway treats as required.

use serde::Serialize;

use crate::codec::ControlFrame;
use crate::error::ProtoError;
use crate::fields::{DEFAULT_MARKET_DATA_FIELDS, TICKER_FIELDS};
use crate::topic::{SubscriptionKey, TopicFamily};

/// A subscribe control frame paired with the key it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedFrame {
    /// Key the frame subscribes under; `None` for global topics.
    pub key: Option<SubscriptionKey>,
    /// Encoded control frame.
    pub frame: ControlFrame,
}

/// Parameters accepted by a subscribe call.
pub trait SubscriptionParams {
    /// Family these parameters subscribe to.
    fn family(&self) -> TopicFamily;

    /// Keys the subscription covers. Global topics return `[None]`.
    fn keys(&self) -> Vec<Option<SubscriptionKey>>;

    /// One subscribe frame per key, in key order.
    fn subscribe_frames(&self) -> Result<Vec<KeyedFrame>, ProtoError>;
}

fn frames_for<B: Serialize>(
    family: TopicFamily,
    keys: Vec<Option<SubscriptionKey>>,
    body: &B,
) -> Result<Vec<KeyedFrame>, ProtoError> {
    if keys.is_empty() {
        return Err(ProtoError::MissingKey(family));
    }
    keys.into_iter()
        .map(|key| {
            let frame = ControlFrame::subscribe(family, key.as_ref(), body)?;
            Ok(KeyedFrame { key, frame })
        })
        .collect()
}

fn contract_keys(contract_ids: &[i64]) -> Vec<Option<SubscriptionKey>> {
    contract_ids
        .iter()
        .map(|conid| Some(SubscriptionKey::Contract(*conid)))
        .collect()
}

#[derive(Serialize)]
struct FieldsBody<'a> {
    fields: &'a [&'a str],
}

/// Single-instrument quote subscription (bid/ask price and size).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerParams {
    /// Contract to quote.
    pub contract_id: i64,
}

impl TickerParams {
    /// Quote the given contract.
    #[must_use]
    pub const fn new(contract_id: i64) -> Self {
        Self { contract_id }
    }
}

impl SubscriptionParams for TickerParams {
    fn family(&self) -> TopicFamily {
        TopicFamily::Ticker
    }

    fn keys(&self) -> Vec<Option<SubscriptionKey>> {
        vec![Some(SubscriptionKey::Contract(self.contract_id))]
    }

    fn subscribe_frames(&self) -> Result<Vec<KeyedFrame>, ProtoError> {
        frames_for(self.family(), self.keys(), &FieldsBody {
            fields: &TICKER_FIELDS,
        })
    }
}

/// Streaming market data for one or more contracts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarketDataParams {
    /// Contracts to stream.
    pub contract_ids: Vec<i64>,
    /// Field codes; [`DEFAULT_MARKET_DATA_FIELDS`] when empty.
    pub fields: Vec<String>,
}

impl MarketDataParams {
    /// Stream the default fields for these contracts.
    #[must_use]
    pub fn new(contract_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            contract_ids: contract_ids.into_iter().collect(),
            fields: Vec::new(),
        }
    }

    /// Request specific field codes.
    #[must_use]
    pub fn with_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl SubscriptionParams for MarketDataParams {
    fn family(&self) -> TopicFamily {
        TopicFamily::MarketData
    }

    fn keys(&self) -> Vec<Option<SubscriptionKey>> {
        contract_keys(&self.contract_ids)
    }

    fn subscribe_frames(&self) -> Result<Vec<KeyedFrame>, ProtoError> {
        let fields: Vec<&str> = if self.fields.is_empty() {
            DEFAULT_MARKET_DATA_FIELDS.to_vec()
        } else {
            self.fields.iter().map(String::as_str).collect()
        };
        frames_for(self.family(), self.keys(), &FieldsBody { fields: &fields })
    }
}

/// Streaming historical bars.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalMarketDataParams {
    /// Contracts to stream; carried in the key, not the parameter object.
    #[serde(skip)]
    pub contract_ids: Vec<i64>,
    /// Routing exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    /// Look-back period, e.g. `1d`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    /// Bar size, e.g. `1min`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar: Option<String>,
    /// Include data outside regular trading hours.
    pub outside_rth: bool,
    /// Data source, e.g. `trades` or `midpoint`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Bar format string, e.g. `%o/%c/%h/%l`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl HistoricalMarketDataParams {
    /// Stream bars for these contracts with gateway defaults.
    #[must_use]
    pub fn new(contract_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            contract_ids: contract_ids.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Set period and bar size.
    #[must_use]
    pub fn with_window(mut self, period: impl Into<String>, bar: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self.bar = Some(bar.into());
        self
    }
}

impl SubscriptionParams for HistoricalMarketDataParams {
    fn family(&self) -> TopicFamily {
        TopicFamily::HistoricalMarketData
    }

    fn keys(&self) -> Vec<Option<SubscriptionKey>> {
        contract_keys(&self.contract_ids)
    }

    fn subscribe_frames(&self) -> Result<Vec<KeyedFrame>, ProtoError> {
        frames_for(self.family(), self.keys(), self)
    }
}

/// Book trader depth for one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookTraderParams {
    /// Contract to stream; carried in the key.
    #[serde(skip)]
    pub contract_id: i64,
    /// Routing exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
}

impl BookTraderParams {
    /// Depth for this contract on the default exchange.
    #[must_use]
    pub const fn new(contract_id: i64) -> Self {
        Self {
            contract_id,
            exchange: None,
        }
    }
}

impl SubscriptionParams for BookTraderParams {
    fn family(&self) -> TopicFamily {
        TopicFamily::BookTrader
    }

    fn keys(&self) -> Vec<Option<SubscriptionKey>> {
        vec![Some(SubscriptionKey::Contract(self.contract_id))]
    }

    fn subscribe_frames(&self) -> Result<Vec<KeyedFrame>, ProtoError> {
        frames_for(self.family(), self.keys(), self)
    }
}

#[derive(Serialize)]
struct AccountBody<'a> {
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    keys: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    fields: &'a [String],
}

/// Account summary values for one account.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountSummaryParams {
    /// Account to stream.
    pub account_id: String,
    /// Summary keys, e.g. `NetLiquidation`; all when empty.
    pub keys: Vec<String>,
    /// Value fields, e.g. `currency`; all when empty.
    pub fields: Vec<String>,
}

impl AccountSummaryParams {
    /// Stream every summary value for this account.
    #[must_use]
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Self::default()
        }
    }
}

impl SubscriptionParams for AccountSummaryParams {
    fn family(&self) -> TopicFamily {
        TopicFamily::AccountSummary
    }

    fn keys(&self) -> Vec<Option<SubscriptionKey>> {
        vec![Some(SubscriptionKey::Account(self.account_id.clone()))]
    }

    fn subscribe_frames(&self) -> Result<Vec<KeyedFrame>, ProtoError> {
        frames_for(self.family(), self.keys(), &AccountBody {
            keys: &self.keys,
            fields: &self.fields,
        })
    }
}

/// Ledger balances for one account.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountLedgerParams {
    /// Account to stream.
    pub account_id: String,
    /// Currency keys, e.g. `LedgerListBASE`; all when empty.
    pub keys: Vec<String>,
    /// Ledger fields, e.g. `cashBalance`; all when empty.
    pub fields: Vec<String>,
}

impl AccountLedgerParams {
    /// Stream every ledger currency for this account.
    #[must_use]
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Self::default()
        }
    }
}

impl SubscriptionParams for AccountLedgerParams {
    fn family(&self) -> TopicFamily {
        TopicFamily::AccountLedger
    }

    fn keys(&self) -> Vec<Option<SubscriptionKey>> {
        vec![Some(SubscriptionKey::Account(self.account_id.clone()))]
    }

    fn subscribe_frames(&self) -> Result<Vec<KeyedFrame>, ProtoError> {
        frames_for(self.family(), self.keys(), &AccountBody {
            keys: &self.keys,
            fields: &self.fields,
        })
    }
}

/// Live order stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OrdersParams {
    /// Order status filters, e.g. `Submitted`; all orders when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
}

impl SubscriptionParams for OrdersParams {
    fn family(&self) -> TopicFamily {
        TopicFamily::Orders
    }

    fn keys(&self) -> Vec<Option<SubscriptionKey>> {
        vec![None]
    }

    fn subscribe_frames(&self) -> Result<Vec<KeyedFrame>, ProtoError> {
        frames_for(self.family(), self.keys(), self)
    }
}

/// Executions stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesParams {
    /// Only push executions that happen after subscribing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime_updates_only: Option<bool>,
    /// Days of execution history to replay first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
}

impl SubscriptionParams for TradesParams {
    fn family(&self) -> TopicFamily {
        TopicFamily::Trades
    }

    fn keys(&self) -> Vec<Option<SubscriptionKey>> {
        vec![None]
    }

    fn subscribe_frames(&self) -> Result<Vec<KeyedFrame>, ProtoError> {
        frames_for(self.family(), self.keys(), self)
    }
}

/// Profit and loss stream. Takes no options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PnlParams {}

impl SubscriptionParams for PnlParams {
    fn family(&self) -> TopicFamily {
        TopicFamily::ProfitAndLoss
    }

    fn keys(&self) -> Vec<Option<SubscriptionKey>> {
        vec![None]
    }

    fn subscribe_frames(&self) -> Result<Vec<KeyedFrame>, ProtoError> {
        frames_for(self.family(), self.keys(), self)
    }
}
