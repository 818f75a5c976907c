//! One physical WebSocket connection to the gateway.
//!
//! Writes go through a single async mutex so frames never interleave. Reads
//! are bounded by a liveness deadline that only a pong can push forward.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue, header};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use cpapi_proto::ProtocolProfile;

use crate::config::{TokenDelivery, WsConfig};
use crate::error::{ReadError, WsError};
use crate::keepalive::ReadDeadline;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "api";

/// An open gateway connection.
pub struct Connection {
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<SplitStream<WsStream>>,
    deadline: ReadDeadline,
    profile: ProtocolProfile,
    close_sent: AtomicBool,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("profile", &self.profile)
            .field("close_sent", &self.close_sent.load(Ordering::SeqCst))
            .field("shut_down", &self.shut_down.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Dial the gateway and complete the WebSocket handshake.
    ///
    /// The whole dial, including DNS, TCP, TLS, and the upgrade, is bounded
    /// by the configured connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Connection`] if any step fails or times out, and
    /// [`WsError::Config`] if the configuration cannot produce a request.
    pub async fn dial(config: &WsConfig, token: &str) -> Result<Self, WsError> {
        let url = config.endpoint_url()?;
        let request = build_request(&url, token, &config.token_delivery)?;

        debug!(url = %url, source_ip = ?config.source_ip, "dialing gateway");
        let stream = tokio::time::timeout(
            config.connect_timeout(),
            Self::handshake(&url, request, config.skip_tls_verify, config.source_ip),
        )
        .await
        .map_err(|_| {
            WsError::Connection(format!(
                "timed out after {:?} connecting to {url}",
                config.connect_timeout()
            ))
        })??;
        debug!(url = %url, "gateway connected");

        Ok(Self::from_stream(stream, config))
    }

    async fn handshake(
        url: &Url,
        request: Request,
        skip_tls_verify: bool,
        source_ip: Option<IpAddr>,
    ) -> Result<WsStream, WsError> {
        let host = url
            .host_str()
            .ok_or_else(|| WsError::Config(format!("no host in {url}")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| WsError::Config(format!("no port in {url}")))?;

        let tcp = connect_tcp(host, port, source_ip)
            .await
            .map_err(|e| WsError::Connection(format!("failed to connect to {host}:{port}: {e}")))?;

        let connector = if url.scheme() == "wss" {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(skip_tls_verify)
                .danger_accept_invalid_hostnames(skip_tls_verify)
                .build()
                .map_err(|e| WsError::Connection(format!("failed to build TLS connector: {e}")))?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        let (stream, _) =
            tokio_tungstenite::client_async_tls_with_config(request, tcp, None, connector)
                .await
                .map_err(|e| WsError::Connection(format!("handshake failed: {e}")))?;
        Ok(stream)
    }

    fn from_stream(stream: WsStream, config: &WsConfig) -> Self {
        let (writer, reader) = stream.split();
        Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            deadline: ReadDeadline::new(config.keepalive().read_deadline),
            profile: config.profile,
            close_sent: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Protocol profile this connection speaks.
    #[must_use]
    pub const fn profile(&self) -> ProtocolProfile {
        self.profile
    }

    /// Whether the connection can still carry frames.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.close_sent.load(Ordering::SeqCst) && !self.shut_down.load(Ordering::SeqCst)
    }

    /// Send a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::SessionClosed`] after close, or [`WsError::Write`]
    /// if the transport rejects the frame.
    pub async fn write_text(&self, text: &str) -> Result<(), WsError> {
        self.write(Message::Text(text.into())).await
    }

    /// Send a protocol ping, followed by the profile's text keepalive if any.
    ///
    /// # Errors
    ///
    /// Returns an error if either frame cannot be written.
    pub async fn ping(&self) -> Result<(), WsError> {
        self.write(Message::Ping(Vec::new().into())).await?;
        if let Some(text) = self.profile.application_ping() {
            self.write(Message::Text(text.into())).await?;
        }
        trace!("ping sent");
        Ok(())
    }

    async fn write(&self, message: Message) -> Result<(), WsError> {
        if !self.is_open() {
            return Err(WsError::SessionClosed);
        }
        let mut writer = self.writer.lock().await;
        writer
            .send(message)
            .await
            .map_err(|e| WsError::Write(e.to_string()))
    }

    /// Wait for the next data frame.
    ///
    /// Pongs refresh the read deadline and are not returned. Pings and raw
    /// frames are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::GracefulClose`] on a normal close,
    /// [`ReadError::DeadlineExceeded`] if no pong arrived in time, and the
    /// other [`ReadError`] variants for everything else.
    pub async fn read_next(&self) -> Result<Vec<u8>, ReadError> {
        let mut reader = self.reader.lock().await;
        loop {
            let next = tokio::time::timeout_at(self.deadline.expires_at(), reader.next())
                .await
                .map_err(|_| ReadError::DeadlineExceeded(self.deadline.window()))?;

            match next {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().as_bytes().to_vec()),
                Some(Ok(Message::Binary(bytes))) => return Ok(bytes.to_vec()),
                Some(Ok(Message::Pong(_))) => {
                    self.deadline.refresh();
                    trace!("pong received");
                }
                Some(Ok(Message::Ping(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => return Err(classify_close(frame.as_ref())),
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed))
                | None => return Err(ReadError::GracefulClose),
                Some(Err(e)) => return Err(ReadError::Transport(e.to_string())),
            }
        }
    }

    /// Send a normal-closure close frame.
    ///
    /// Only the first call sends anything. A peer that already closed is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Write`] if the close frame cannot be sent for any
    /// other reason.
    pub async fn close(&self) -> Result<(), WsError> {
        if self.close_sent.swap(true, Ordering::SeqCst) || self.shut_down.load(Ordering::SeqCst) {
            return Ok(());
        }
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        let mut writer = self.writer.lock().await;
        match writer.send(Message::Close(Some(frame))).await {
            Ok(())
            | Err(
                tungstenite::Error::ConnectionClosed
                | tungstenite::Error::AlreadyClosed
                | tungstenite::Error::Protocol(
                    tungstenite::error::ProtocolError::SendAfterClosing,
                ),
            ) => {
                debug!("close frame sent");
                Ok(())
            }
            Err(e) => Err(WsError::Write(e.to_string())),
        }
    }

    /// Finalize the transport. Further writes fail with
    /// [`WsError::SessionClosed`].
    pub(crate) async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.close().await {
            trace!(error = %e, "transport already closed");
        }
    }
}

#[cfg(test)]
impl Connection {
    /// Close the sink underneath the connection while its flags still say
    /// open, so the next write fails in the transport.
    pub(crate) async fn close_sink(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.close().await {
            trace!(error = %e, "sink already closed");
        }
    }
}

fn classify_close(frame: Option<&CloseFrame>) -> ReadError {
    match frame {
        None => ReadError::GracefulClose,
        Some(frame) if frame.code == CloseCode::Normal => ReadError::GracefulClose,
        Some(frame) => ReadError::ClosedAbnormally(format!(
            "code {}: {}",
            u16::from(frame.code),
            frame.reason.as_str()
        )),
    }
}

/// Build the upgrade request with the session token attached.
fn build_request(url: &Url, token: &str, delivery: &TokenDelivery) -> Result<Request, WsError> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| WsError::Config(format!("failed to build WebSocket request: {e}")))?;

    let (name, value) = match delivery {
        TokenDelivery::Cookie => {
            let session = serde_json::json!({ "session": token });
            (header::COOKIE, format!("{SESSION_COOKIE}={session}"))
        }
        TokenDelivery::Header { name } => {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| WsError::Config(format!("invalid header name '{name}': {e}")))?;
            (name, token.to_string())
        }
    };
    let value = HeaderValue::from_str(&value)
        .map_err(|e| WsError::Config(format!("session token is not a valid header value: {e}")))?;
    request.headers_mut().insert(name, value);
    Ok(request)
}

/// Resolve and connect, optionally from a fixed local address.
async fn connect_tcp(host: &str, port: u16, source_ip: Option<IpAddr>) -> io::Result<TcpStream> {
    let mut last_err = None;
    for remote in tokio::net::lookup_host((host, port)).await? {
        if source_ip.is_some_and(|local| local.is_ipv4() != remote.is_ipv4()) {
            continue;
        }
        match connect_from(remote, source_ip).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no usable address for {host}:{port}"),
        )
    }))
}

async fn connect_from(remote: SocketAddr, source_ip: Option<IpAddr>) -> io::Result<TcpStream> {
    let Some(local) = source_ip else {
        return TcpStream::connect(remote).await;
    };
    let socket = if remote.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.bind(SocketAddr::new(local, 0))?;
    socket.connect(remote).await
}
