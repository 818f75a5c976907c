//! Topic families, subscription keys, and unsolicited topic tags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Subscription topic families offered by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopicFamily {
    /// Single-instrument top-of-book quote. One per session.
    Ticker,
    /// Streaming market data fields, one entry per contract.
    MarketData,
    /// Streaming historical bars, one entry per contract.
    HistoricalMarketData,
    /// Book trader depth, one entry per contract.
    BookTrader,
    /// Account summary values, one entry per account.
    AccountSummary,
    /// Account ledger balances, one entry per account.
    AccountLedger,
    /// Live order stream.
    Orders,
    /// Profit and loss stream.
    #[serde(rename = "pnl")]
    ProfitAndLoss,
    /// Executions stream.
    Trades,
}

/// How a family addresses its handler slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// At most one active subscription of the family per session; frames are
    /// routed by tag alone.
    Exclusive,
    /// Any number of concurrent subscriptions, one per key; frames are routed
    /// by tag and key.
    Keyed,
}

/// Kind of key a family's control frames carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Numeric contract identifier.
    Contract,
    /// Account identifier.
    Account,
    /// Global topic, no key.
    None,
}

impl TopicFamily {
    /// Every family, in table order.
    pub const ALL: [Self; 9] = [
        Self::Ticker,
        Self::MarketData,
        Self::HistoricalMarketData,
        Self::BookTrader,
        Self::AccountSummary,
        Self::AccountLedger,
        Self::Orders,
        Self::ProfitAndLoss,
        Self::Trades,
    ];

    /// Code that opens a subscription.
    #[must_use]
    pub const fn subscribe_code(self) -> &'static str {
        match self {
            Self::Ticker | Self::MarketData => "smd",
            Self::HistoricalMarketData => "smh",
            Self::BookTrader => "sbd",
            Self::AccountSummary => "ssd",
            Self::AccountLedger => "sld",
            Self::Orders => "sor",
            Self::ProfitAndLoss => "spl",
            Self::Trades => "str",
        }
    }

    /// Code that closes a subscription.
    #[must_use]
    pub const fn unsubscribe_code(self) -> &'static str {
        match self {
            Self::Ticker | Self::MarketData => "umd",
            Self::HistoricalMarketData => "umh",
            Self::BookTrader => "ubd",
            Self::AccountSummary => "usd",
            Self::AccountLedger => "uld",
            Self::Orders => "uor",
            Self::ProfitAndLoss => "upl",
            Self::Trades => "utr",
        }
    }

    /// Tag the gateway puts in front of inbound topics for this family.
    #[must_use]
    pub const fn routing_tag(self) -> &'static str {
        self.subscribe_code()
    }

    /// Key carried by control frames.
    #[must_use]
    pub const fn key_kind(self) -> KeyKind {
        match self {
            Self::Ticker | Self::MarketData | Self::HistoricalMarketData | Self::BookTrader => {
                KeyKind::Contract
            }
            Self::AccountSummary | Self::AccountLedger => KeyKind::Account,
            Self::Orders | Self::ProfitAndLoss | Self::Trades => KeyKind::None,
        }
    }

    /// Handler addressing scheme.
    #[must_use]
    pub const fn addressing(self) -> Addressing {
        match self {
            Self::Ticker | Self::Orders | Self::ProfitAndLoss | Self::Trades => {
                Addressing::Exclusive
            }
            Self::MarketData
            | Self::HistoricalMarketData
            | Self::BookTrader
            | Self::AccountSummary
            | Self::AccountLedger => Addressing::Keyed,
        }
    }

    /// Whether a key is acceptable for this family.
    #[must_use]
    pub fn accepts(self, key: Option<&SubscriptionKey>) -> bool {
        matches!(
            (self.key_kind(), key),
            (KeyKind::Contract, Some(SubscriptionKey::Contract(_)))
                | (KeyKind::Account, Some(SubscriptionKey::Account(_)))
                | (KeyKind::None, None)
        )
    }

    /// Stable lowercase name, used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::MarketData => "market-data",
            Self::HistoricalMarketData => "historical-market-data",
            Self::BookTrader => "book-trader",
            Self::AccountSummary => "account-summary",
            Self::AccountLedger => "account-ledger",
            Self::Orders => "orders",
            Self::ProfitAndLoss => "pnl",
            Self::Trades => "trades",
        }
    }
}

impl fmt::Display for TopicFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key placed between the topic code and the parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionKey {
    /// Contract identifier (`conid`).
    Contract(i64),
    /// Account identifier, e.g. `DU1234567`.
    Account(String),
}

impl SubscriptionKey {
    /// Key as it appears on the wire and in inbound topics.
    #[must_use]
    pub fn wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contract(conid) => write!(f, "{conid}"),
            Self::Account(account) => f.write_str(account),
        }
    }
}

impl From<i64> for SubscriptionKey {
    fn from(conid: i64) -> Self {
        Self::Contract(conid)
    }
}

/// Server-initiated topics that are not tied to a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsolicitedTopic {
    /// `system`: connection heartbeat and login confirmation.
    SystemConnection,
    /// `sts`: brokerage session authentication status.
    AuthStatus,
    /// `blt`: exchange bulletins.
    Bulletins,
    /// `act`: account list and properties.
    AccountUpdates,
    /// `ntf`: user notifications.
    Notifications,
}

impl UnsolicitedTopic {
    /// Resolve a routing tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "system" => Some(Self::SystemConnection),
            "sts" => Some(Self::AuthStatus),
            "blt" => Some(Self::Bulletins),
            "act" => Some(Self::AccountUpdates),
            "ntf" => Some(Self::Notifications),
            _ => None,
        }
    }

    /// Routing tag on the wire.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::SystemConnection => "system",
            Self::AuthStatus => "sts",
            Self::Bulletins => "blt",
            Self::AccountUpdates => "act",
            Self::Notifications => "ntf",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(TopicFamily::Ticker, "smd", "umd")]
    #[test_case(TopicFamily::MarketData, "smd", "umd")]
    #[test_case(TopicFamily::HistoricalMarketData, "smh", "umh")]
    #[test_case(TopicFamily::BookTrader, "sbd", "ubd")]
    #[test_case(TopicFamily::AccountSummary, "ssd", "usd")]
    #[test_case(TopicFamily::AccountLedger, "sld", "uld")]
    #[test_case(TopicFamily::Orders, "sor", "uor")]
    #[test_case(TopicFamily::ProfitAndLoss, "spl", "upl")]
    #[test_case(TopicFamily::Trades, "str", "utr")]
    fn test_topic_codes(family: TopicFamily, sub: &str, unsub: &str) {
        assert_eq!(family.subscribe_code(), sub);
        assert_eq!(family.unsubscribe_code(), unsub);
    }

    #[test]
    fn test_global_families_are_exclusive_and_keyless() {
        for family in [TopicFamily::Orders, TopicFamily::ProfitAndLoss, TopicFamily::Trades] {
            assert_eq!(family.addressing(), Addressing::Exclusive);
            assert_eq!(family.key_kind(), KeyKind::None);
        }
    }

    #[test]
    fn test_accepts_matching_key_kind() {
        assert!(TopicFamily::MarketData.accepts(Some(&SubscriptionKey::Contract(265_598))));
        assert!(!TopicFamily::MarketData.accepts(None));
        assert!(!TopicFamily::MarketData.accepts(Some(&SubscriptionKey::Account("DU1".into()))));
        assert!(TopicFamily::AccountLedger.accepts(Some(&SubscriptionKey::Account("DU1".into()))));
        assert!(TopicFamily::Orders.accepts(None));
        assert!(!TopicFamily::Orders.accepts(Some(&SubscriptionKey::Contract(1))));
    }

    #[test]
    fn test_unsolicited_tags_round_trip() {
        for topic in [
            UnsolicitedTopic::SystemConnection,
            UnsolicitedTopic::AuthStatus,
            UnsolicitedTopic::Bulletins,
            UnsolicitedTopic::AccountUpdates,
            UnsolicitedTopic::Notifications,
        ] {
            assert_eq!(UnsolicitedTopic::from_tag(topic.tag()), Some(topic));
        }
        assert_eq!(UnsolicitedTopic::from_tag("smd"), None);
    }

    #[test]
    fn test_subscription_key_display() {
        assert_eq!(SubscriptionKey::Contract(265_598).wire(), "265598");
        assert_eq!(SubscriptionKey::Account("DU1234567".into()).wire(), "DU1234567");
    }
}
