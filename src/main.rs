#![forbid(unsafe_code)]

//! `syslink-server` — stdio RPC server binary.
//!
//! Bootstraps configuration and the tracing subscriber, assembles the RPC
//! server with the built-in simulation toolkit behind its bring-up gate,
//! and serves the line protocol on stdin/stdout until the front end closes
//! the stream. All diagnostics go to stderr; stdout carries the wire.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use syslink_server::rpc::RpcServer;
use syslink_server::toolkit::gate::ToolkitGate;
use syslink_server::toolkit::local::FixedStepToolkit;
use syslink_server::toolkit::methods::register_methods;
use syslink_server::{AppError, Result, ServerConfig};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "syslink-server", about = "SysLink simulation RPC server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the heartbeat interval in seconds.
    #[arg(long)]
    heartbeat_interval: Option<u64>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("syslink-server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let config = match args.config {
        Some(ref path) => ServerConfig::load_from_path(path)?,
        None => ServerConfig::default(),
    };
    info!("configuration loaded");

    // ── Assemble the server ─────────────────────────────
    let toolkit = Arc::new(FixedStepToolkit::new(config.simulation.clone()));
    let gate = Arc::new(ToolkitGate::new(toolkit.clone()));

    let mut server = RpcServer::new(&config).with_pre_request_hook(gate);
    if let Some(secs) = args.heartbeat_interval {
        if secs == 0 {
            return Err(AppError::Config(
                "heartbeat interval must be greater than zero".into(),
            ));
        }
        server = server.with_heartbeat_interval(Duration::from_secs(secs));
    }
    register_methods(&mut server, toolkit);
    info!("RPC server ready");

    // ── Serve until EOF or a shutdown signal ────────────
    tokio::select! {
        result = server.serve(tokio::io::stdin(), tokio::io::stdout()) => {
            if let Err(ref err) = result {
                error!(error = %err, "server terminated with error");
            }
            result
        }
        () = shutdown_signal() => {
            info!("shutdown signal received");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(error = %err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout is the protocol channel; diagnostics must stay on stderr.
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
