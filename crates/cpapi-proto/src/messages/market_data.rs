//! Market data payloads (`smd`, `smh`, `sbd`).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::de::{flexible_f64, flexible_i64};
use crate::fields;

/// Top-of-book quote pushed for a ticker subscription.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TickerUpdate {
    /// Full topic string, e.g. `smd+265598`.
    pub topic: String,
    /// Contract identifier.
    #[serde(deserialize_with = "flexible_i64")]
    pub conid: Option<i64>,
    /// Update time in epoch milliseconds.
    #[serde(rename = "_updated")]
    pub updated: Option<i64>,
    /// Best bid price.
    #[serde(rename = "84", deserialize_with = "flexible_f64")]
    pub bid_price: Option<f64>,
    /// Best bid size.
    #[serde(rename = "88", deserialize_with = "flexible_f64")]
    pub bid_size: Option<f64>,
    /// Best ask price.
    #[serde(rename = "86", deserialize_with = "flexible_f64")]
    pub ask_price: Option<f64>,
    /// Best ask size.
    #[serde(rename = "85", deserialize_with = "flexible_f64")]
    pub ask_size: Option<f64>,
}

impl TickerUpdate {
    /// Midpoint of the quote when both sides are present.
    #[must_use]
    pub fn mid_price(&self) -> Option<f64> {
        Some((self.bid_price? + self.ask_price?) / 2.0)
    }
}

/// Streaming market data for one contract.
///
/// The commonly requested codes are typed; every other field code is kept in
/// [`MarketDataUpdate::extra`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarketDataUpdate {
    /// Full topic string.
    pub topic: String,
    /// Server-side request identifier.
    pub server_id: Option<String>,
    /// Contract identifier.
    #[serde(deserialize_with = "flexible_i64")]
    pub conid: Option<i64>,
    /// Contract identifier with exchange suffix.
    #[serde(rename = "conidEx")]
    pub conid_ex: Option<String>,
    /// Update time in epoch milliseconds.
    #[serde(rename = "_updated")]
    pub updated: Option<i64>,
    /// Availability flags (`6509`).
    #[serde(rename = "6509")]
    pub availability: Option<String>,
    /// Last price (`31`).
    #[serde(rename = "31", deserialize_with = "flexible_f64")]
    pub last_price: Option<f64>,
    /// Best bid price (`84`).
    #[serde(rename = "84", deserialize_with = "flexible_f64")]
    pub bid_price: Option<f64>,
    /// Best bid size (`88`).
    #[serde(rename = "88", deserialize_with = "flexible_f64")]
    pub bid_size: Option<f64>,
    /// Best ask price (`86`).
    #[serde(rename = "86", deserialize_with = "flexible_f64")]
    pub ask_price: Option<f64>,
    /// Best ask size (`85`).
    #[serde(rename = "85", deserialize_with = "flexible_f64")]
    pub ask_size: Option<f64>,
    /// Remaining fields by code.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MarketDataUpdate {
    /// Symbol (`55`), if it was pushed.
    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        self.extra.get(fields::SYMBOL).and_then(Value::as_str)
    }

    /// Raw value of an untyped field code.
    #[must_use]
    pub fn field(&self, code: &str) -> Option<&Value> {
        self.extra.get(code)
    }
}

/// One historical bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistoricalBar {
    /// Bar start in epoch milliseconds.
    pub t: Option<i64>,
    /// Open.
    pub o: Option<f64>,
    /// Close.
    pub c: Option<f64>,
    /// High.
    pub h: Option<f64>,
    /// Low.
    pub l: Option<f64>,
    /// Volume.
    pub v: Option<f64>,
}

/// Historical bar batch for one contract.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistoricalMarketDataUpdate {
    /// Full topic string.
    pub topic: String,
    /// Server-side request identifier, needed by some gateways to cancel.
    pub server_id: Option<String>,
    /// Symbol.
    pub symbol: Option<String>,
    /// Human readable period, e.g. `1d`.
    #[serde(rename = "timePeriod")]
    pub time_period: Option<String>,
    /// Bars, oldest first.
    pub data: Vec<HistoricalBar>,
}

/// One price row of the book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BookLevel {
    /// Row index.
    pub row: Option<i64>,
    /// Set on the row nearest the last price.
    pub focus: Option<i64>,
    /// Price of the row.
    #[serde(deserialize_with = "flexible_f64")]
    pub price: Option<f64>,
    /// Size offered at this price.
    #[serde(deserialize_with = "flexible_f64")]
    pub ask: Option<f64>,
    /// Size bid at this price.
    #[serde(deserialize_with = "flexible_f64")]
    pub bid: Option<f64>,
}

/// Book trader depth snapshot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BookTraderUpdate {
    /// Full topic string.
    pub topic: String,
    /// Book rows.
    pub data: Vec<BookLevel>,
}
