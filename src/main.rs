//! iDRAC fan controller entry point: CLI dispatch, signal handlers, async runtime.

mod app;
mod config;
mod control;
mod daemon;
mod error;
mod hardware;
mod system;
#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use app::cli::Args;
use app::logging::init_tracing;
use config::types::StatusFormat;
use control::driver::ControlLoop;
use daemon::health::run_health_probe;
use daemon::status::{JsonStatusSink, LogStatusSink, StatusSink};
use hardware::DellBmc;
use system::executor::Ipmitool;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_filter());

    let config = args.to_config();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if args.show_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let bmc = Arc::new(DellBmc::new(
        Ipmitool::new(config.connection.clone()),
        config.runtime.dry_run,
    ));

    if args.check {
        let healthy = run_health_probe(bmc.as_ref(), bmc.as_ref()).await;
        std::process::exit(if healthy { 0 } else { 1 });
    }

    info!(
        "iDRAC fan controller v{} starting (iDRAC: {})",
        env!("CARGO_PKG_VERSION"),
        if config.connection.is_local() { "local" } else { config.connection.host.as_str() }
    );
    if config.runtime.dry_run {
        warn!("Dry run: fan commands are logged, not sent");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let sink: Box<dyn StatusSink> = match config.runtime.status_format {
        StatusFormat::Log => Box::new(LogStatusSink),
        StatusFormat::Json => Box::new(JsonStatusSink::new(std::io::stdout())),
    };

    let controller = ControlLoop::new(config, bmc.clone(), bmc.clone(), bmc, sink);
    if let Err(e) = controller.run(shutdown_rx).await {
        error!("Controller failed: {}", e);
        std::process::exit(1);
    }

    info!("Controller shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C, or SIGTERM where available (container stop).
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Shutdown signal received (Ctrl+C)"),
                    _ = sigterm.recv() => info!("Shutdown signal received (SIGTERM)"),
                }
                return;
            }
            Err(e) => warn!("Failed to set up SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        // Without a signal source the controller can only be killed
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received (Ctrl+C)");
}
