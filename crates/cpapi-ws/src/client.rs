//! Entry point for opening gateway sessions.

use std::net::IpAddr;

use tracing::info;

use crate::config::WsConfig;
use crate::error::WsError;
use crate::service::{PrivateService, PublicService};
use crate::supervisor::Session;
use crate::unsolicited::UnsolicitedChannels;

/// Opens public and private sessions with a shared configuration.
#[derive(Debug, Clone, Default)]
pub struct WsClient {
    config: WsConfig,
    unsolicited: UnsolicitedChannels,
}

impl WsClient {
    /// Create a client. The configuration is validated on each dial.
    #[must_use]
    pub fn new(config: WsConfig) -> Self {
        Self {
            config,
            unsolicited: UnsolicitedChannels::default(),
        }
    }

    /// Route unsolicited topics of every session this client opens.
    #[must_use]
    pub fn with_unsolicited(mut self, unsolicited: UnsolicitedChannels) -> Self {
        self.unsolicited = unsolicited;
        self
    }

    /// Dial configuration.
    #[must_use]
    pub const fn config(&self) -> &WsConfig {
        &self.config
    }

    /// Open a market data session.
    pub async fn public(&self, token: &str) -> Result<PublicService, WsError> {
        self.dial(&self.config, token).await.map(PublicService::new)
    }

    /// Open a market data session bound to a local address.
    pub async fn public_with_source_ip(
        &self,
        token: &str,
        source_ip: IpAddr,
    ) -> Result<PublicService, WsError> {
        let config = self.config.clone().with_source_ip(Some(source_ip));
        self.dial(&config, token).await.map(PublicService::new)
    }

    /// Open an account session.
    pub async fn private(&self, token: &str) -> Result<PrivateService, WsError> {
        self.dial(&self.config, token).await.map(PrivateService::new)
    }

    /// Open an account session bound to a local address.
    pub async fn private_with_source_ip(
        &self,
        token: &str,
        source_ip: IpAddr,
    ) -> Result<PrivateService, WsError> {
        let config = self.config.clone().with_source_ip(Some(source_ip));
        self.dial(&config, token).await.map(PrivateService::new)
    }

    async fn dial(&self, config: &WsConfig, token: &str) -> Result<Session, WsError> {
        let session = Session::connect(config, token, self.unsolicited.clone()).await?;
        info!(url = %config.endpoint_url()?, source_ip = ?config.source_ip, "session connected");
        Ok(session)
    }
}
