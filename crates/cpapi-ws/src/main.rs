//! cpapi-stream - stream Client Portal gateway topics as JSON lines.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use cpapi_proto::messages::{AuthStatus, TickerUpdate};
use cpapi_proto::params::{MarketDataParams, OrdersParams, PnlParams, TickerParams};
use cpapi_ws::{
    ErrorHandler, HandlerError, ReconnectConfig, Session, UnsolicitedChannels, WsConfig,
    WsError, reconnect_with_backoff,
};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "cpapi-stream")]
#[command(about = "Stream Client Portal gateway topics as JSON lines")]
#[command(version)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Session token issued by the gateway
    #[arg(long, env = "CPAPI_SESSION_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Local address to dial from
    #[arg(long, global = true)]
    source_ip: Option<IpAddr>,

    /// Redial with backoff after an abnormal closure
    #[arg(long, global = true)]
    reconnect: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Stream market data fields for one or more contracts
    MarketData {
        /// Contract id, repeatable
        #[arg(long = "conid", required = true)]
        conids: Vec<i64>,

        /// Field code, repeatable; defaults to last, bid, ask, sizes
        #[arg(long = "field")]
        fields: Vec<String>,
    },

    /// Stream top-of-book quotes for one contract
    Ticker {
        /// Contract id
        #[arg(long)]
        conid: i64,
    },

    /// Stream live orders
    Orders {
        /// Order status filter, repeatable
        #[arg(long = "filter")]
        filters: Vec<String>,
    },

    /// Stream profit and loss
    Pnl,

    /// Write a config file with default values
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "cpapi.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("cpapi_ws=info".parse()?))
        .init();

    let cli = Cli::parse();

    if let Commands::InitConfig { output } = &cli.command {
        return init_config(output);
    }

    let mut config = match &cli.config {
        Some(path) => WsConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WsConfig::default(),
    };
    if cli.source_ip.is_some() {
        config = config.with_source_ip(cli.source_ip);
    }
    let token = cli
        .token
        .clone()
        .context("a session token is required (--token or CPAPI_SESSION_TOKEN)")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            on_signal.cancel();
        }
    });

    stream(&config, &token, &cli, &cancel).await
}

async fn stream(
    config: &WsConfig,
    token: &str,
    cli: &Cli,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let (auth_tx, auth_rx) = mpsc::channel(config.unsolicited_capacity);
    tokio::spawn(log_auth_status(auth_rx));
    let channels = UnsolicitedChannels::new().with_auth_status(auth_tx);
    let backoff = ReconnectConfig::default();

    loop {
        let session = if cli.reconnect {
            reconnect_with_backoff(&backoff, || {
                Session::connect(config, token, channels.clone())
            })
            .await?
        } else {
            Session::connect(config, token, channels.clone()).await?
        };
        subscribe(&session, &cli.command).await?;

        let (done_tx, done_rx) = oneshot::channel();
        let on_error: ErrorHandler = Box::new(move |graceful: bool, err: WsError| {
            let _ = done_tx.send((graceful, err));
        });
        session.start(cancel.clone(), Some(on_error)).await?;

        if cancel.is_cancelled() {
            return Ok(());
        }
        match done_rx.await {
            Ok((false, err)) if cli.reconnect => {
                warn!(error = %err, "session lost, reconnecting");
            }
            Ok((true, _)) => {
                info!("gateway closed the session");
                return Ok(());
            }
            Ok((false, err)) => {
                error!(error = %err, "session failed");
                return Err(err.into());
            }
            Err(_) => return Ok(()),
        }
    }
}

async fn subscribe(session: &Session, command: &Commands) -> Result<(), WsError> {
    match command {
        Commands::MarketData { conids, fields } => {
            let params = MarketDataParams::new(conids.iter().copied()).with_fields(fields.clone());
            session.subscribe_with(&params, print_line).await?;
        }
        Commands::Ticker { conid } => {
            session
                .subscribe_with(&TickerParams::new(*conid), print_quote)
                .await?;
        }
        Commands::Orders { filters } => {
            let params = OrdersParams {
                filters: filters.clone(),
            };
            session.subscribe_with(&params, print_line).await?;
        }
        Commands::Pnl => {
            session.subscribe_with(&PnlParams::default(), print_line).await?;
        }
        Commands::InitConfig { .. } => {}
    }
    Ok(())
}

fn print_line(payload: Value) -> Result<(), HandlerError> {
    println!("{payload}");
    Ok(())
}

fn print_quote(quote: TickerUpdate) -> Result<(), HandlerError> {
    let line = json!({
        "conid": quote.conid,
        "bid": quote.bid_price,
        "bid_size": quote.bid_size,
        "ask": quote.ask_price,
        "ask_size": quote.ask_size,
        "mid": quote.mid_price(),
    });
    println!("{line}");
    Ok(())
}

async fn log_auth_status(mut rx: mpsc::Receiver<AuthStatus>) {
    while let Some(status) = rx.recv().await {
        let args = status.args;
        if args.authenticated {
            info!(user = ?args.username, server = ?args.server_name, "brokerage session authenticated");
        } else {
            warn!(message = ?args.message, fail = ?args.fail, competing = args.competing, "brokerage session not authenticated");
        }
    }
}

fn init_config(output: &Path) -> anyhow::Result<()> {
    let config = WsConfig::default();
    let json = serde_json::to_string_pretty(&config)?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(output, json)?;
    println!("Config written to {}", output.display());
    Ok(())
}
