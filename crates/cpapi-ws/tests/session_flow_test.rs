//! Session flow tests against a mock gateway.
//!
//! Each test binds a local WebSocket server, dials it with a real
//! [`Session`], and checks what crosses the wire in both directions.

use std::net::SocketAddr;
use std::time::Duration;

use cpapi_proto::messages::{AuthStatus, TickerUpdate};
use cpapi_proto::params::{MarketDataParams, OrdersParams, TickerParams};
use cpapi_proto::{ProtocolProfile, SubscriptionKey, TopicFamily};
use cpapi_ws::{
    DecodeErrorPolicy, DispatchOutcome, DropReason, ErrorHandler, KeepaliveConfig, ReadError,
    Session, SessionState, TokenDelivery, UnsolicitedChannels, WsConfig, WsError,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);
const TICKER_FRAME: &str = r#"smd+265598+{"fields":["88","84","85","86"]}"#;

// ============================================================================
// Mock Gateway
// ============================================================================

struct MockGateway {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockGateway {
    async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock gateway");
        let addr = listener.local_addr().expect("local addr");
        Self { listener, addr }
    }

    fn config(&self) -> WsConfig {
        WsConfig::default()
            .with_base_url(format!("ws://{}", self.addr))
            .with_keepalive(KeepaliveConfig {
                ping_interval: Duration::from_millis(50),
                read_deadline: Duration::from_secs(2),
                close_grace: Duration::from_millis(500),
            })
    }

    async fn accept(&self) -> (WebSocketStream<TcpStream>, HeaderMap) {
        let (stream, _) = self.listener.accept().await.expect("accept");
        let mut headers = HeaderMap::new();
        let ws = accept_hdr_async(
            stream,
            |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                headers = request.headers().clone();
                Ok(response)
            },
        )
        .await
        .expect("server handshake");
        (ws, headers)
    }
}

/// Next text frame, or `None` once the client closes.
async fn recv_text(ws: &mut WebSocketStream<TcpStream>) -> Option<String> {
    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

async fn send_text(ws: &mut WebSocketStream<TcpStream>, text: &str) {
    ws.send(Message::Text(text.into()))
        .await
        .expect("server send");
}

/// Read until the connection ends. Returns text frames and close frames seen.
async fn drain(ws: &mut WebSocketStream<TcpStream>) -> (Vec<String>, usize) {
    let mut texts = Vec::new();
    let mut closes = 0;
    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => texts.push(text.as_str().to_owned()),
            Ok(Message::Close(_)) => closes += 1,
            Ok(_) => {}
            Err(_) => break,
        }
    }
    (texts, closes)
}

async fn connect(config: &WsConfig) -> Session {
    Session::connect(config, "test-token", UnsolicitedChannels::new())
        .await
        .expect("session should connect")
}

fn spawn_start(
    session: &Session,
    cancel: &CancellationToken,
    on_error: Option<ErrorHandler>,
) -> tokio::task::JoinHandle<Result<(), WsError>> {
    let session = session.clone();
    let cancel = cancel.clone();
    tokio::spawn(async move { session.start(cancel, on_error).await })
}

fn report_to(tx: oneshot::Sender<(bool, WsError)>) -> ErrorHandler {
    Box::new(move |graceful: bool, err: WsError| {
        let _ = tx.send((graceful, err));
    })
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn test_ticker_subscription_delivers_quote() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();

    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        let subscribe = recv_text(&mut ws).await.expect("subscribe frame");
        send_text(
            &mut ws,
            r#"{"topic":"smd+265598","conid":265598,"84":101.5,"88":200}"#,
        )
        .await;
        let (rest, _) = drain(&mut ws).await;
        (subscribe, rest)
    });

    let session = connect(&config).await;
    let (quote_tx, mut quote_rx) = mpsc::unbounded_channel();
    session
        .subscribe_with(&TickerParams::new(265_598), move |quote: TickerUpdate| {
            quote_tx.send(quote)?;
            Ok(())
        })
        .await
        .expect("subscribe");

    let cancel = CancellationToken::new();
    let runner = spawn_start(&session, &cancel, None);

    let quote = timeout(WAIT, quote_rx.recv())
        .await
        .expect("quote in time")
        .expect("quote");
    assert_eq!(quote.conid, Some(265_598));
    assert_eq!(quote.bid_price, Some(101.5));
    assert_eq!(quote.bid_size, Some(200.0));

    cancel.cancel();
    runner.await.expect("join").expect("clean shutdown");

    let (subscribe, rest) = server.await.expect("server");
    assert_eq!(subscribe, TICKER_FRAME);
    assert!(rest.is_empty(), "unexpected frames: {rest:?}");
}

#[tokio::test]
async fn test_second_ticker_is_rejected_without_a_frame() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        drain(&mut ws).await
    });

    let session = connect(&config).await;
    session
        .subscribe_with(&TickerParams::new(265_598), |_: TickerUpdate| Ok(()))
        .await
        .expect("first ticker");

    let err = session
        .subscribe_with(&TickerParams::new(8314), |_: TickerUpdate| Ok(()))
        .await
        .expect_err("second ticker");
    assert!(matches!(err, WsError::AlreadySubscribed(TopicFamily::Ticker)));

    // The first handler still owns the slot.
    assert_eq!(session.dispatcher().handler_count(), 1);
    assert!(session.registry().is_active(
        TopicFamily::Ticker,
        Some(&SubscriptionKey::Contract(265_598))
    ));

    session.close().await.expect("close");
    let (texts, closes) = server.await.expect("server");
    assert_eq!(texts, vec![TICKER_FRAME.to_string()]);
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn test_unsubscribe_twice_sends_one_frame() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        drain(&mut ws).await
    });

    let session = connect(&config).await;
    let params = MarketDataParams::new([265_598]).with_fields(["84", "88"]);
    let subscription = session
        .subscribe_with(&params, |_: Value| Ok(()))
        .await
        .expect("subscribe");

    subscription.unsubscribe().await.expect("first unsubscribe");
    subscription.unsubscribe().await.expect("second unsubscribe");
    assert!(subscription.is_closed());

    // Closing by key finds nothing left either.
    let key = SubscriptionKey::Contract(265_598);
    assert!(
        !session
            .unsubscribe(TopicFamily::MarketData, Some(&key))
            .await
            .expect("keyed unsubscribe")
    );
    assert_eq!(session.dispatcher().handler_count(), 0);

    session.close().await.expect("close");
    let (texts, _) = server.await.expect("server");
    assert_eq!(
        texts,
        vec![
            r#"smd+265598+{"fields":["84","88"]}"#.to_string(),
            "umd+265598+{}".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_market_data_on_ticker_contract_is_rejected_without_a_frame() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        drain(&mut ws).await
    });

    let session = connect(&config).await;
    let ticker = session
        .subscribe_with(&TickerParams::new(265_598), |_: TickerUpdate| Ok(()))
        .await
        .expect("ticker");

    // Both families stream through smd+265598 on the gateway.
    let params = MarketDataParams::new([265_598]).with_fields(["31"]);
    let err = session
        .subscribe_with(&params, |_: Value| Ok(()))
        .await
        .expect_err("stream already open");
    assert!(matches!(err, WsError::AlreadySubscribed(TopicFamily::MarketData)));
    assert_eq!(session.dispatcher().handler_count(), 1);

    ticker.unsubscribe().await.expect("ticker unsubscribe");
    session
        .subscribe_with(&params, |_: Value| Ok(()))
        .await
        .expect("stream free again");
    assert!(session.registry().is_active(
        TopicFamily::MarketData,
        Some(&SubscriptionKey::Contract(265_598))
    ));

    session.close().await.expect("close");
    let (texts, _) = server.await.expect("server");
    assert_eq!(
        texts,
        vec![
            TICKER_FRAME.to_string(),
            "umd+265598+{}".to_string(),
            r#"smd+265598+{"fields":["31"]}"#.to_string(),
        ]
    );
}

#[tokio::test]
async fn test_repeated_contract_in_one_request_sends_nothing() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        drain(&mut ws).await
    });

    let session = connect(&config).await;
    let err = session
        .subscribe_with(&MarketDataParams::new([1, 1]), |_: Value| Ok(()))
        .await
        .expect_err("contract listed twice");
    assert!(matches!(err, WsError::AlreadySubscribed(TopicFamily::MarketData)));
    assert_eq!(session.dispatcher().handler_count(), 0);
    assert!(session.registry().active().is_empty());

    session.close().await.expect("close");
    let (texts, closes) = server.await.expect("server");
    assert!(texts.is_empty(), "unexpected frames: {texts:?}");
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn test_market_data_routes_by_contract() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        let first = recv_text(&mut ws).await.expect("first subscribe");
        let second = recv_text(&mut ws).await.expect("second subscribe");
        send_text(&mut ws, r#"{"topic":"smd+8314","conid":8314,"31":"12.25"}"#).await;
        let (rest, _) = drain(&mut ws).await;
        (first, second, rest)
    });

    let session = connect(&config).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let params = MarketDataParams::new([265_598, 8314]).with_fields(["31"]);
    let subscription = session
        .subscribe_with(&params, move |update: Value| {
            tx.send(update)?;
            Ok(())
        })
        .await
        .expect("subscribe");
    assert_eq!(subscription.keys().count(), 2);

    let outcome = timeout(WAIT, session.run_once())
        .await
        .expect("frame in time")
        .expect("dispatch");
    assert_eq!(outcome, DispatchOutcome::Delivered);
    let update = rx.recv().await.expect("update");
    assert_eq!(update["conid"], 8314);

    subscription.unsubscribe().await.expect("unsubscribe");
    session.close().await.expect("close");

    let (first, second, rest) = server.await.expect("server");
    assert_eq!(first, r#"smd+265598+{"fields":["31"]}"#);
    assert_eq!(second, r#"smd+8314+{"fields":["31"]}"#);
    assert_eq!(rest, vec!["umd+265598+{}".to_string(), "umd+8314+{}".to_string()]);
}

#[tokio::test]
async fn test_subscribe_after_close_fails() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        drain(&mut ws).await
    });

    let session = connect(&config).await;
    session.close().await.expect("close");
    session.close().await.expect("second close is a no-op");

    let err = session
        .subscribe_with(&OrdersParams::default(), |_: Value| Ok(()))
        .await
        .expect_err("closed session");
    assert!(matches!(err, WsError::SessionClosed));
    assert!(session.registry().active().is_empty());

    let (texts, closes) = server.await.expect("server");
    assert!(texts.is_empty());
    assert_eq!(closes, 1);
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_unrouted_frames_are_dropped() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        recv_text(&mut ws).await.expect("subscribe frame");
        send_text(&mut ws, r#"{"message":"waiting for session"}"#).await;
        send_text(&mut ws, r#"{"topic":"sor","args":[]}"#).await;
        send_text(&mut ws, r#"{"topic":"smd+265598","84":"99.5"}"#).await;
        drain(&mut ws).await
    });

    let session = connect(&config).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    session
        .subscribe_with(&TickerParams::new(265_598), move |quote: TickerUpdate| {
            tx.send(quote)?;
            Ok(())
        })
        .await
        .expect("subscribe");

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        let outcome = timeout(WAIT, session.run_once())
            .await
            .expect("frame in time")
            .expect("dispatch");
        outcomes.push(outcome);
    }
    assert_eq!(
        outcomes,
        vec![
            DispatchOutcome::Dropped(DropReason::Unroutable),
            DispatchOutcome::Dropped(DropReason::NoHandler),
            DispatchOutcome::Delivered,
        ]
    );
    let quote = rx.recv().await.expect("quote");
    assert_eq!(quote.bid_price, Some(99.5));
    assert!(rx.try_recv().is_err());

    session.close().await.expect("close");
    server.await.expect("server");
}

#[tokio::test]
async fn test_isolate_policy_survives_malformed_frame() {
    let gateway = MockGateway::bind().await;
    let config = gateway
        .config()
        .with_decode_errors(DecodeErrorPolicy::Isolate);
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        send_text(&mut ws, "{not json").await;
        send_text(&mut ws, r#"{"topic":"system","success":"trader1"}"#).await;
        drain(&mut ws).await
    });

    let session = connect(&config).await;
    let first = timeout(WAIT, session.run_once()).await.expect("in time");
    assert_eq!(
        first.expect("isolated"),
        DispatchOutcome::Dropped(DropReason::Malformed)
    );
    let second = timeout(WAIT, session.run_once()).await.expect("in time");
    assert_eq!(
        second.expect("no system channel"),
        DispatchOutcome::Dropped(DropReason::NoHandler)
    );

    session.close().await.expect("close");
    server.await.expect("server");
}

#[tokio::test]
async fn test_fatal_policy_ends_read_loop_on_malformed_frame() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        send_text(&mut ws, "{not json").await;
        drain(&mut ws).await
    });

    let session = connect(&config).await;
    let (tx, rx) = oneshot::channel();
    let cancel = CancellationToken::new();
    let runner = spawn_start(&session, &cancel, Some(report_to(tx)));

    let (graceful, err) = timeout(WAIT, rx).await.expect("in time").expect("report");
    assert!(!graceful);
    assert!(matches!(err, WsError::Decode(_)));

    runner.await.expect("join").expect("read loop end is not a start error");
    assert_eq!(session.state(), SessionState::Closed);
    server.await.expect("server");
}

#[tokio::test]
async fn test_unsolicited_auth_status_reaches_channel() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        send_text(
            &mut ws,
            r#"{"topic":"sts","args":{"authenticated":true,"competing":false,"connected":true,"username":"trader1"}}"#,
        )
        .await;
        drain(&mut ws).await
    });

    let (auth_tx, mut auth_rx) = mpsc::channel::<AuthStatus>(4);
    let session = Session::connect(
        &config,
        "test-token",
        UnsolicitedChannels::new().with_auth_status(auth_tx),
    )
    .await
    .expect("connect");

    let outcome = timeout(WAIT, session.run_once())
        .await
        .expect("in time")
        .expect("dispatch");
    assert_eq!(outcome, DispatchOutcome::Delivered);
    let status = auth_rx.recv().await.expect("status");
    assert!(status.args.authenticated);
    assert_eq!(status.args.username.as_deref(), Some("trader1"));

    session.close().await.expect("close");
    server.await.expect("server");
}

#[tokio::test]
async fn test_legacy_profile_routes_dash_topics_and_sends_tic() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config().with_profile(ProtocolProfile::Legacy);
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        let subscribe = recv_text(&mut ws).await.expect("subscribe frame");
        send_text(&mut ws, r#"{"topic":"smd-265598","86":"100.25"}"#).await;
        let (rest, _) = drain(&mut ws).await;
        (subscribe, rest)
    });

    let session = connect(&config).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    session
        .subscribe_with(&TickerParams::new(265_598), move |quote: TickerUpdate| {
            tx.send(quote)?;
            Ok(())
        })
        .await
        .expect("subscribe");

    let outcome = timeout(WAIT, session.run_once())
        .await
        .expect("in time")
        .expect("dispatch");
    assert_eq!(outcome, DispatchOutcome::Delivered);
    assert_eq!(rx.recv().await.expect("quote").ask_price, Some(100.25));

    session.ping().await.expect("ping");
    session.close().await.expect("close");

    let (subscribe, rest) = server.await.expect("server");
    assert_eq!(subscribe, TICKER_FRAME);
    assert_eq!(rest, vec!["tic".to_string()]);
}

// ============================================================================
// Keepalive and shutdown
// ============================================================================

#[tokio::test]
async fn test_read_fails_when_no_pong_arrives() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config().with_keepalive(KeepaliveConfig {
        ping_interval: Duration::from_millis(50),
        read_deadline: Duration::from_millis(200),
        close_grace: Duration::from_millis(100),
    });
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        // Hold the socket open without reading, so pings go unanswered.
        let (ws, _) = gateway.accept().await;
        let _ = release_rx.await;
        drop(ws);
    });

    let session = connect(&config).await;
    let err = timeout(WAIT, session.run_once())
        .await
        .expect("deadline fires before the test timeout")
        .expect_err("no pong");
    assert!(matches!(
        err,
        WsError::Read(ReadError::DeadlineExceeded(window)) if window == Duration::from_millis(200)
    ));
    assert!(!err.is_graceful_close());

    let _ = release_tx.send(());
    server.await.expect("server");
}

#[tokio::test]
async fn test_supervisor_reports_deadline_to_error_handler() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config().with_keepalive(KeepaliveConfig {
        ping_interval: Duration::from_millis(50),
        read_deadline: Duration::from_millis(200),
        close_grace: Duration::from_millis(100),
    });
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let (ws, _) = gateway.accept().await;
        let _ = release_rx.await;
        drop(ws);
    });

    let session = connect(&config).await;
    let (tx, rx) = oneshot::channel();
    let runner = spawn_start(&session, &CancellationToken::new(), Some(report_to(tx)));

    let (graceful, err) = timeout(WAIT, rx).await.expect("in time").expect("report");
    assert!(!graceful);
    assert!(matches!(err, WsError::Read(ReadError::DeadlineExceeded(_))));

    runner.await.expect("join").expect("start returns after the read loop");
    assert_eq!(session.state(), SessionState::Closed);

    let _ = release_tx.send(());
    server.await.expect("server");
}

#[tokio::test]
async fn test_pongs_keep_session_alive_past_deadline() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config().with_keepalive(KeepaliveConfig {
        ping_interval: Duration::from_millis(50),
        read_deadline: Duration::from_millis(300),
        close_grace: Duration::from_millis(500),
    });
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        drain(&mut ws).await
    });

    let session = connect(&config).await;
    let cancel = CancellationToken::new();
    let runner = spawn_start(&session, &cancel, None);

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(session.state(), SessionState::Running);

    cancel.cancel();
    runner.await.expect("join").expect("clean shutdown");
    server.await.expect("server");
}

#[tokio::test]
async fn test_cancellation_sends_one_close_and_reaches_closed() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        drain(&mut ws).await
    });

    let session = connect(&config).await;
    session
        .subscribe_with(&OrdersParams::default(), |_: Value| Ok(()))
        .await
        .expect("subscribe");

    let (tx, rx) = oneshot::channel();
    let cancel = CancellationToken::new();
    let runner = spawn_start(&session, &cancel, Some(report_to(tx)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.state(), SessionState::Running);

    cancel.cancel();
    timeout(WAIT, runner)
        .await
        .expect("shutdown within grace")
        .expect("join")
        .expect("clean shutdown");
    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.registry().active().is_empty());

    let (graceful, err) = timeout(WAIT, rx).await.expect("in time").expect("report");
    assert!(graceful, "unexpected error: {err}");

    let (texts, closes) = server.await.expect("server");
    assert_eq!(texts, vec!["sor+{}".to_string()]);
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn test_cancellation_stops_reader_when_close_is_never_answered() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config().with_keepalive(KeepaliveConfig {
        ping_interval: Duration::from_millis(50),
        read_deadline: Duration::from_secs(3),
        close_grace: Duration::from_millis(100),
    });
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        // Hold the socket without reading, so the close is never echoed.
        let (ws, _) = gateway.accept().await;
        let _ = release_rx.await;
        drop(ws);
    });

    let session = connect(&config).await;
    let (tx, rx) = oneshot::channel();
    let cancel = CancellationToken::new();
    let runner = spawn_start(&session, &cancel, Some(report_to(tx)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    timeout(WAIT, runner)
        .await
        .expect("shutdown after grace")
        .expect("join")
        .expect("clean shutdown");
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!session.connection().is_open());

    // The read loop was stopped, so the deadline never reaches the handler.
    let report = timeout(WAIT, rx).await.expect("handler dropped in time");
    assert!(report.is_err(), "handler fired after shutdown: {report:?}");

    let _ = release_tx.send(());
    server.await.expect("server");
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        drain(&mut ws).await
    });

    let session = connect(&config).await;
    let cancel = CancellationToken::new();
    let runner = spawn_start(&session, &cancel, None);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = session
        .start(cancel.clone(), None)
        .await
        .expect_err("already running");
    assert!(matches!(err, WsError::InvalidState(_)));

    cancel.cancel();
    runner.await.expect("join").expect("clean shutdown");
    server.await.expect("server");
}

#[tokio::test]
async fn test_peer_close_is_graceful() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, _) = gateway.accept().await;
        ws.close(None).await.expect("server close");
        drain(&mut ws).await
    });

    let session = connect(&config).await;
    let (tx, rx) = oneshot::channel();
    let runner = spawn_start(&session, &CancellationToken::new(), Some(report_to(tx)));

    let (graceful, err) = timeout(WAIT, rx).await.expect("in time").expect("report");
    assert!(graceful);
    assert!(err.is_graceful_close());
    runner.await.expect("join").expect("clean end");
    server.await.expect("server");
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_token_is_sent_as_session_cookie() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config();
    let server = tokio::spawn(async move {
        let (mut ws, headers) = gateway.accept().await;
        drain(&mut ws).await;
        headers
    });

    let session = Session::connect(&config, "tok-123", UnsolicitedChannels::new())
        .await
        .expect("connect");
    session.close().await.expect("close");

    let headers = server.await.expect("server");
    let cookie = headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .expect("cookie header");
    assert_eq!(cookie, r#"api={"session":"tok-123"}"#);
}

#[tokio::test]
async fn test_token_header_delivery() {
    let gateway = MockGateway::bind().await;
    let config = gateway.config().with_token_delivery(TokenDelivery::Header {
        name: "x-session-token".to_string(),
    });
    let server = tokio::spawn(async move {
        let (mut ws, headers) = gateway.accept().await;
        drain(&mut ws).await;
        headers
    });

    let session = Session::connect(&config, "tok-456", UnsolicitedChannels::new())
        .await
        .expect("connect");
    session.close().await.expect("close");

    let headers = server.await.expect("server");
    assert_eq!(
        headers.get("x-session-token").and_then(|v| v.to_str().ok()),
        Some("tok-456")
    );
    assert!(headers.get("cookie").is_none());
}
