//! qmt-gateway: session gateway for the QMT trading terminal.
//!
//! Usage:
//!   qmt-gateway [OPTIONS]
//!
//! Options:
//!   -m, --mode <MODE>       Operating mode: disabled, readonly, live
//!   -c, --config <FILE>     Config file path (default: config/gateway.toml)
//!   --rest-bind <ADDR>      REST listen address (overrides config)
//!   --rpc-bind <ADDR>       RPC listen address (overrides config)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use qmt_gateway::adapters::{rest, rpc::RpcServer};
use qmt_gateway::backend::NativeQmtSdk;
use qmt_gateway::config::GatewayConfig;
use qmt_gateway::{Gateway, OperatingMode};

/// CLI arguments for qmt-gateway.
#[derive(Parser, Debug)]
#[command(name = "qmt-gateway")]
#[command(about = "Session gateway for the QMT trading terminal")]
#[command(version)]
struct Args {
    /// Operating mode: disabled, readonly, live
    #[arg(short, long)]
    mode: Option<OperatingMode>,

    /// Config file path
    #[arg(short, long, default_value = "config/gateway.toml")]
    config: PathBuf,

    /// REST listen address (overrides config file)
    #[arg(long)]
    rest_bind: Option<String>,

    /// RPC listen address (overrides config file)
    #[arg(long)]
    rpc_bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let args = Args::parse();

    let mut config = if args.config.exists() {
        GatewayConfig::load(Some(&args.config))
            .with_context(|| format!("Failed to load config from {:?}", args.config))?
    } else {
        GatewayConfig::load(None)?
    };

    // Apply CLI overrides
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(bind) = args.rest_bind {
        config.rest.bind = bind;
    }
    if let Some(bind) = args.rpc_bind {
        config.rpc.bind = bind;
    }

    // Initialize logging
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")?;

    info!("Starting qmt-gateway");
    info!("Mode: {}", config.mode);
    info!("Backend endpoint: {}", config.backend.endpoint);
    if config.mode == OperatingMode::Live {
        warn!("LIVE mode: orders through live sessions will reach the real backend");
    }

    let sdk = Arc::new(NativeQmtSdk::new(config.backend.endpoint.clone()));
    let gateway = Gateway::new(&config, sdk);

    let rest_listener = TcpListener::bind(&config.rest.bind)
        .await
        .with_context(|| format!("Failed to bind REST listener on {}", config.rest.bind))?;
    let rpc_listener = TcpListener::bind(&config.rpc.bind)
        .await
        .with_context(|| format!("Failed to bind RPC listener on {}", config.rpc.bind))?;

    let rpc_server = RpcServer::new(gateway.clone());
    let rpc_shutdown = rpc_server.shutdown_handle();
    let rpc_handle = tokio::spawn(async move { rpc_server.run(rpc_listener).await });

    let (rest_shutdown_tx, rest_shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let rest_gateway = gateway.clone();
    let rest_handle = tokio::spawn(async move {
        rest::serve(rest_gateway, rest_listener, async {
            let _ = rest_shutdown_rx.await;
        })
        .await
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    let _ = rest_shutdown_tx.send(());
    let _ = rpc_shutdown.send(());
    gateway.shutdown().await;

    let _ = rest_handle.await;
    let _ = rpc_handle.await;

    info!("qmt-gateway stopped");
    Ok(())
}
