//! Account summary and ledger payloads (`ssd`, `sld`).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// One account summary value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SummaryValue {
    /// Summary key, e.g. `NetLiquidation`.
    pub key: String,
    /// Currency of a monetary value.
    pub currency: Option<String>,
    /// Numeric value.
    pub monetary_value: Option<f64>,
    /// Text value, for non-numeric keys.
    pub value: Option<String>,
    /// Severity flag.
    pub severity: Option<i64>,
    /// Update time in epoch milliseconds.
    pub timestamp: Option<i64>,
}

/// Account summary update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AccountSummaryUpdate {
    /// Full topic string, e.g. `ssd+DU1234567`.
    pub topic: String,
    /// Changed values.
    pub result: Vec<SummaryValue>,
}

impl AccountSummaryUpdate {
    /// Look up a value by summary key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SummaryValue> {
        self.result.iter().find(|v| v.key == key)
    }
}

/// Ledger balances for one currency.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Ledger key, e.g. `LedgerListUSD`.
    pub key: String,
    /// Currency code, `BASE` for the aggregate.
    pub secondary_key: Option<String>,
    /// Cash balance.
    pub cash_balance: Option<f64>,
    /// Settled cash.
    pub settled_cash: Option<f64>,
    /// Net liquidation value.
    pub net_liquidation_value: Option<f64>,
    /// Exchange rate to base currency.
    pub exchange_rate: Option<f64>,
    /// Update time in epoch milliseconds.
    pub timestamp: Option<i64>,
    /// Remaining ledger fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Account ledger update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AccountLedgerUpdate {
    /// Full topic string, e.g. `sld+DU1234567`.
    pub topic: String,
    /// Changed currency entries.
    pub result: Vec<LedgerEntry>,
}
