//! Inbound payload types.
//!
//! Field sets are the subset the gateway documents as stable; unknown fields
//! are ignored and every optional field defaults when absent.

pub mod account;
pub mod market_data;
pub mod orders;
pub mod unsolicited;

pub use account::{AccountLedgerUpdate, AccountSummaryUpdate, LedgerEntry, SummaryValue};
pub use market_data::{BookTraderUpdate, HistoricalMarketDataUpdate, MarketDataUpdate, TickerUpdate};
pub use orders::{OrderUpdate, OrdersUpdate, PnlUpdate, TradeExecution, TradesUpdate};
pub use unsolicited::{
    AccountUpdates, AuthStatus, Bulletin, Notification, ServerInfo, SystemConnection,
};
