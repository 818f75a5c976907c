//! Market data field codes.
//!
//! The gateway identifies snapshot and streaming fields by numeric strings.
//! Only the codes this crate decodes into typed fields, plus a few common
//! extras, are listed.

/// Last traded price.
pub const LAST_PRICE: &str = "31";
/// Symbol.
pub const SYMBOL: &str = "55";
/// High of the day.
pub const HIGH: &str = "70";
/// Low of the day.
pub const LOW: &str = "71";
/// Change since prior close.
pub const CHANGE: &str = "82";
/// Percent change since prior close.
pub const CHANGE_PERCENT: &str = "83";
/// Best bid price.
pub const BID_PRICE: &str = "84";
/// Best ask size.
pub const ASK_SIZE: &str = "85";
/// Best ask price.
pub const ASK_PRICE: &str = "86";
/// Day volume.
pub const VOLUME: &str = "87";
/// Best bid size.
pub const BID_SIZE: &str = "88";
/// Market data availability flags.
pub const MARKET_DATA_AVAILABILITY: &str = "6509";
/// Last trade size.
pub const LAST_SIZE: &str = "7059";

/// Fields requested by a ticker subscription, in wire order.
pub const TICKER_FIELDS: [&str; 4] = [BID_SIZE, BID_PRICE, ASK_SIZE, ASK_PRICE];

/// Fields requested by a market data subscription when none are given.
pub const DEFAULT_MARKET_DATA_FIELDS: [&str; 5] =
    [LAST_PRICE, BID_PRICE, BID_SIZE, ASK_PRICE, ASK_SIZE];
