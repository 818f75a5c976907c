//! Order, execution, and profit-and-loss payloads (`sor`, `str`, `spl`).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::de::{flexible_f64, flexible_i64};

/// One live order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderUpdate {
    /// Account the order belongs to.
    pub acct: Option<String>,
    /// Contract identifier.
    #[serde(deserialize_with = "flexible_i64")]
    pub conid: Option<i64>,
    /// Order identifier.
    #[serde(deserialize_with = "flexible_i64")]
    pub order_id: Option<i64>,
    /// Order description, e.g. `Buy 100 Limit 182.00`.
    pub order_desc: Option<String>,
    /// Symbol.
    pub ticker: Option<String>,
    /// Security type.
    pub sec_type: Option<String>,
    /// Quantity not yet filled.
    #[serde(deserialize_with = "flexible_f64")]
    pub remaining_quantity: Option<f64>,
    /// Quantity filled.
    #[serde(deserialize_with = "flexible_f64")]
    pub filled_quantity: Option<f64>,
    /// Order status, e.g. `Submitted`.
    pub status: Option<String>,
    /// Order type.
    pub order_type: Option<String>,
    /// Time in force.
    pub time_in_force: Option<String>,
    /// `BUY` or `SELL`.
    pub side: Option<String>,
    /// Limit price.
    #[serde(deserialize_with = "flexible_f64")]
    pub price: Option<f64>,
    /// Client order reference.
    #[serde(rename = "order_ref")]
    pub order_ref: Option<String>,
    /// Last execution in epoch milliseconds.
    #[serde(rename = "lastExecutionTime_r")]
    pub last_execution_time: Option<i64>,
}

/// `sor` frame.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OrdersUpdate {
    /// Full topic string.
    pub topic: String,
    /// Changed orders.
    pub args: Vec<OrderUpdate>,
}

/// One execution.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TradeExecution {
    /// Execution identifier.
    pub execution_id: Option<String>,
    /// Symbol.
    pub symbol: Option<String>,
    /// `B` or `S`.
    pub side: Option<String>,
    /// Execution time, `YYYYMMDD-hh:mm:ss`.
    pub trade_time: Option<String>,
    /// Execution time in epoch milliseconds.
    pub trade_time_r: Option<i64>,
    /// Executed size.
    #[serde(deserialize_with = "flexible_f64")]
    pub size: Option<f64>,
    /// Execution price.
    #[serde(deserialize_with = "flexible_f64")]
    pub price: Option<f64>,
    /// Executing exchange.
    pub exchange: Option<String>,
    /// Net amount.
    #[serde(deserialize_with = "flexible_f64")]
    pub net_amount: Option<f64>,
    /// Account.
    pub account: Option<String>,
    /// Contract identifier.
    #[serde(deserialize_with = "flexible_i64")]
    pub conid: Option<i64>,
    /// Client order reference.
    pub order_ref: Option<String>,
}

/// `str` frame.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TradesUpdate {
    /// Full topic string.
    pub topic: String,
    /// New executions.
    pub args: Vec<TradeExecution>,
}

/// Profit and loss for one account partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PnlRow {
    /// Daily PnL.
    #[serde(rename = "dpl")]
    pub daily: Option<f64>,
    /// Unrealized PnL.
    #[serde(rename = "upl")]
    pub unrealized: Option<f64>,
    /// Realized PnL.
    #[serde(rename = "rpl")]
    pub realized: Option<f64>,
    /// Net liquidation.
    #[serde(rename = "nl")]
    pub net_liquidation: Option<f64>,
    /// Excess liquidity.
    #[serde(rename = "el")]
    pub excess_liquidity: Option<f64>,
    /// Market value.
    #[serde(rename = "mv")]
    pub market_value: Option<f64>,
}

/// `spl` frame. Rows are keyed by account partition, e.g. `DU1234567.Core`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PnlUpdate {
    /// Full topic string.
    pub topic: String,
    /// Rows by partition.
    #[serde(alias = "upnl")]
    pub args: BTreeMap<String, PnlRow>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
