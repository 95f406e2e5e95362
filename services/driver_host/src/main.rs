//! Driver host binary
//!
//! Usage:
//!   driver-host --config config/driver.toml
//!   driver-host --socket /tmp/driver.sock --log-level debug

use anyhow::{Context, Result};
use clap::Parser;
use driver_config::{load_config, DriverConfig};
use driver_host::{demo, DriverServer};
use driver_invoker::StandaloneApplication;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "driver-host")]
#[command(about = "Serve remote driver calls over a Unix socket")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket path, overrides `server.socket_path`
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Log filter, overrides `logging.level` (e.g. `debug` or `driver_invoker=trace`)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(socket) = args.socket {
        config.server.socket_path = socket;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.logging.json |= args.json_logs;

    init_logging(&config)?;

    info!("Starting driver host");
    let version = config.product.version();
    info!(
        "Product {} ({}), snapshot: {}",
        version.product_code, version.build_number, version.is_snapshot
    );

    let shutdown = Arc::new(Notify::new());
    let exit_signal = shutdown.clone();
    let application = demo::install(
        StandaloneApplication::new(version).with_exit_hook(Arc::new(move || {
            info!("Exit requested by controller");
            exit_signal.notify_one();
        })),
    );
    let invoker = Arc::new(demo::build_invoker(&config, application)?);

    let server = DriverServer::new(invoker, config.server.clone(), shutdown.clone());
    let listener = server.bind()?;

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                signal_shutdown.notify_one();
            }
            Err(e) => error!("Failed to listen for CTRL+C: {}", e),
        }
    });

    server.serve(listener).await?;
    info!("Driver host stopped");
    Ok(())
}

fn init_logging(config: &DriverConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.logging.level)
        .with_context(|| format!("Invalid log filter '{}'", config.logging.level))?;

    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}
