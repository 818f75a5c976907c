//! # cpapi-ws
//!
//! WebSocket session engine for the Client Portal gateway.
//!
//! A [`Session`] owns one gateway connection. Starting it runs a read loop
//! that decodes each frame and routes it by topic to the handler of the
//! matching subscription, while a keepalive task pings the gateway. A read
//! deadline refreshed by pongs detects a silent peer.
//!
//! ```no_run
//! use cpapi_proto::params::TickerParams;
//! use cpapi_ws::{WsClient, WsConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), cpapi_ws::WsError> {
//! let client = WsClient::new(WsConfig::default());
//! let public = client.public("session-token").await?;
//! public
//!     .subscribe_ticker(&TickerParams::new(265_598), |quote| {
//!         println!("{:?} / {:?}", quote.bid_price, quote.ask_price);
//!         Ok(())
//!     })
//!     .await?;
//! public.start(CancellationToken::new(), None).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod keepalive;
pub mod reconnect;
pub mod registry;
pub mod service;
pub mod state;
pub mod supervisor;
pub mod unsolicited;

pub use client::WsClient;
pub use config::{TokenDelivery, WsConfig};
pub use connection::Connection;
pub use dispatch::{DecodeErrorPolicy, DispatchOutcome, Dispatcher, DropReason, FrameHandler, TypedHandler};
pub use error::{HandlerError, ReadError, WsError};
pub use keepalive::KeepaliveConfig;
pub use reconnect::{ReconnectConfig, reconnect_with_backoff};
pub use registry::{Subscription, SubscriptionRegistry};
pub use service::{PrivateService, PublicService};
pub use state::SessionState;
pub use supervisor::{ErrorHandler, Session};
pub use unsolicited::UnsolicitedChannels;
