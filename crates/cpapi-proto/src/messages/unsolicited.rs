//! Server-pushed status topics (`system`, `sts`, `act`, `blt`, `ntf`).

use serde::Deserialize;
use serde_json::Value;

/// `system` frame: login confirmation or heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SystemConnection {
    /// Full topic string.
    pub topic: String,
    /// User name on successful login.
    pub success: Option<String>,
    /// Fractional trading account.
    #[serde(rename = "isFT")]
    pub is_fractional: bool,
    /// Paper trading account.
    #[serde(rename = "isPaper")]
    pub is_paper: bool,
    /// Heartbeat timestamp in epoch milliseconds.
    pub hb: Option<i64>,
}

impl SystemConnection {
    /// Whether this frame is a heartbeat rather than a login notice.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.hb.is_some()
    }
}

/// Arguments of an `sts` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthStatusArgs {
    /// Brokerage session is authenticated.
    pub authenticated: bool,
    /// Another session is competing for the login.
    pub competing: bool,
    /// Gateway is connected to the backend.
    pub connected: bool,
    /// Status text.
    pub message: Option<String>,
    /// Failure reason.
    pub fail: Option<String>,
    /// Backend server name.
    #[serde(rename = "serverName")]
    pub server_name: Option<String>,
    /// Backend server version.
    #[serde(rename = "serverVersion")]
    pub server_version: Option<String>,
    /// Logged-in user.
    pub username: Option<String>,
}

/// `sts` frame: brokerage session authentication status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthStatus {
    /// Full topic string.
    pub topic: String,
    /// Status details.
    pub args: AuthStatusArgs,
}

/// Backend server identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerInfo {
    /// Server name.
    pub server_name: String,
    /// Server version.
    pub server_version: String,
}

/// Arguments of an `act` frame.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountUpdatesArgs {
    /// Accounts visible to the session.
    pub accounts: Vec<String>,
    /// Per-account properties, passed through untyped.
    pub acct_props: Value,
    /// Account aliases.
    pub aliases: Value,
    /// Feature flags, passed through untyped.
    pub allow_features: Value,
    /// Currently selected account.
    pub selected_account: Option<String>,
    /// Backend server identity.
    pub server_info: ServerInfo,
    /// Gateway session identifier.
    pub session_id: Option<String>,
    /// Fractional trading account.
    #[serde(rename = "isFT")]
    pub is_fractional: bool,
    /// Paper trading account.
    #[serde(rename = "isPaper")]
    pub is_paper: bool,
}

/// `act` frame: account list and properties.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AccountUpdates {
    /// Full topic string.
    pub topic: String,
    /// Account details.
    pub args: AccountUpdatesArgs,
}

/// Arguments of a `blt` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BulletinArgs {
    /// Bulletin identifier.
    pub id: Option<String>,
    /// Bulletin text.
    pub message: Option<String>,
}

/// `blt` frame: exchange bulletin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Bulletin {
    /// Full topic string.
    pub topic: String,
    /// Bulletin body.
    pub args: BulletinArgs,
}

/// Arguments of an `ntf` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationArgs {
    /// Notification identifier.
    pub id: String,
    /// Body text.
    pub text: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Link for details.
    pub url: Option<String>,
}

/// `ntf` frame: user notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Notification {
    /// Full topic string.
    pub topic: String,
    /// Notification body.
    pub args: NotificationArgs,
}
