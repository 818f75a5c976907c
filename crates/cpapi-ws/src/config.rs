//! Session configuration.
//!
//! Covers everything needed to dial the gateway and run a session:
//! - Gateway address and endpoint path
//! - TLS verification and optional source-address binding
//! - How the session token is presented during the handshake
//! - Protocol profile, keepalive timings, and decode-error policy

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use cpapi_proto::ProtocolProfile;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::dispatch::DecodeErrorPolicy;
use crate::error::WsError;
use crate::keepalive::KeepaliveConfig;

/// Default gateway address.
pub const DEFAULT_BASE_URL: &str = "wss://localhost:5000";

/// Default WebSocket endpoint path.
pub const DEFAULT_ENDPOINT_PREFIX: &str = "/v1/api/ws";

/// How the session token travels with the upgrade request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TokenDelivery {
    /// `Cookie: api={"session":"<token>"}`, as the local gateway expects.
    #[default]
    Cookie,
    /// The raw token in a named request header.
    Header {
        /// Header name, e.g. `Authorization`.
        name: String,
    },
}

/// Configuration for a gateway WebSocket session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WsConfig {
    /// Gateway address, `ws://` or `wss://`.
    pub base_url: String,
    /// Endpoint path appended to the base URL.
    pub endpoint_prefix: String,
    /// Accept invalid certificates and host names. The local gateway serves a
    /// self-signed certificate.
    pub skip_tls_verify: bool,
    /// Local address to bind outbound connections to.
    pub source_ip: Option<IpAddr>,
    /// How the session token is presented.
    pub token_delivery: TokenDelivery,
    /// Gateway protocol dialect.
    pub profile: ProtocolProfile,
    /// Interval between protocol pings, in milliseconds.
    pub ping_interval_ms: u64,
    /// Liveness window refreshed by each pong, in milliseconds.
    pub read_deadline_ms: u64,
    /// Wait for the read loop after sending a close frame, in milliseconds.
    pub close_grace_ms: u64,
    /// Upper bound on dial plus handshake, in milliseconds.
    pub connect_timeout_ms: u64,
    /// What to do with frames that fail to decode.
    pub decode_errors: DecodeErrorPolicy,
    /// Buffer size for unsolicited event channels created by the binary.
    pub unsolicited_capacity: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        let keepalive = KeepaliveConfig::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint_prefix: DEFAULT_ENDPOINT_PREFIX.to_string(),
            skip_tls_verify: true,
            source_ip: None,
            token_delivery: TokenDelivery::Cookie,
            profile: ProtocolProfile::Standard,
            ping_interval_ms: keepalive.ping_interval.as_millis() as u64,
            read_deadline_ms: keepalive.read_deadline.as_millis() as u64,
            close_grace_ms: keepalive.close_grace.as_millis() as u64,
            connect_timeout_ms: 10_000,
            decode_errors: DecodeErrorPolicy::Fatal,
            unsolicited_capacity: 64,
        }
    }
}

impl WsConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WsError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            WsError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> Result<Self, WsError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| WsError::Config(format!("invalid JSON: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), WsError> {
        if !self.base_url.starts_with("ws://") && !self.base_url.starts_with("wss://") {
            return Err(WsError::Config(
                "base_url must start with ws:// or wss://".to_string(),
            ));
        }

        if !self.endpoint_prefix.is_empty() && !self.endpoint_prefix.starts_with('/') {
            return Err(WsError::Config(
                "endpoint_prefix must start with '/'".to_string(),
            ));
        }

        if let TokenDelivery::Header { name } = &self.token_delivery {
            if name.trim().is_empty() {
                return Err(WsError::Config(
                    "token_delivery header name cannot be empty".to_string(),
                ));
            }
        }

        if self.connect_timeout_ms == 0 {
            return Err(WsError::Config(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }

        self.keepalive().validate().map_err(WsError::Config)?;
        self.endpoint_url()?;
        Ok(())
    }

    /// Full WebSocket URL: base URL plus endpoint prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the result is not a valid URL.
    pub fn endpoint_url(&self) -> Result<Url, WsError> {
        let joined = format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint_prefix
        );
        Url::parse(&joined).map_err(|e| WsError::Config(format!("invalid URL '{joined}': {e}")))
    }

    /// Keepalive timings.
    #[must_use]
    pub const fn keepalive(&self) -> KeepaliveConfig {
        KeepaliveConfig {
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            read_deadline: Duration::from_millis(self.read_deadline_ms),
            close_grace: Duration::from_millis(self.close_grace_ms),
        }
    }

    /// Dial plus handshake timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Set the gateway address.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the endpoint path.
    #[must_use]
    pub fn with_endpoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.endpoint_prefix = prefix.into();
        self
    }

    /// Toggle certificate verification.
    #[must_use]
    pub fn with_skip_tls_verify(mut self, skip: bool) -> Self {
        self.skip_tls_verify = skip;
        self
    }

    /// Bind outbound connections to a local address.
    #[must_use]
    pub fn with_source_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.source_ip = ip;
        self
    }

    /// Set how the session token is presented.
    #[must_use]
    pub fn with_token_delivery(mut self, delivery: TokenDelivery) -> Self {
        self.token_delivery = delivery;
        self
    }

    /// Set the protocol profile.
    #[must_use]
    pub fn with_profile(mut self, profile: ProtocolProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the keepalive timings.
    #[must_use]
    pub fn with_keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.ping_interval_ms = keepalive.ping_interval.as_millis() as u64;
        self.read_deadline_ms = keepalive.read_deadline.as_millis() as u64;
        self.close_grace_ms = keepalive.close_grace.as_millis() as u64;
        self
    }

    /// Set the decode-error policy.
    #[must_use]
    pub fn with_decode_errors(mut self, policy: DecodeErrorPolicy) -> Self {
        self.decode_errors = policy;
        self
    }
}
