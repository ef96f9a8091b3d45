//! Prometheus exporter for the BIRD routing daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use birdwatcher_common::{init_tracing, render_metrics};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use birdwatcher_exporter::{ExporterConfig, HttpServer, Scraper};

/// Prometheus exporter for BIRD protocol status.
#[derive(Parser, Debug)]
#[command(name = "birdwatcher-exporter")]
#[command(about = "Export BIRD protocol status as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error; overrides config).
    #[arg(long)]
    log_level: Option<String>,

    /// Run a single scrape, print the metrics to stdout and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)
            .with_context(|| format!("Failed to load {}", config_path))?
    } else {
        ExporterConfig::default()
    };

    // Apply CLI overrides
    if let Some(listen) = args.listen {
        config.http.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_tracing(&config.logging)?;

    let scraper = Arc::new(Scraper::new(config.birdc.clone(), config.filters.clone()));

    if args.once {
        let metrics = scraper.scrape().await?;
        print!("{}", render_metrics(&metrics));
        return Ok(());
    }

    info!(command = ?config.birdc.command, "Starting BIRD exporter");

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Parse listen address
    let listen_addr = config
        .http
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let http_server = HttpServer::new(scraper.clone(), listen_addr, config.http.path.clone());

    // Bind before waiting for signals so a busy port ends startup
    let listener = http_server.bind().await?;
    let mut http_task = tokio::spawn(http_server.serve(listener, shutdown_rx));

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
        result = &mut http_task => {
            return match result {
                Ok(Ok(())) => Err(anyhow::anyhow!("HTTP server stopped unexpectedly")),
                Ok(Err(e)) => Err(e.context("HTTP server error")),
                Err(e) => Err(e.into()),
            };
        }
    }

    // Signal shutdown; the server may already be gone
    let _ = shutdown_tx.send(true);

    // Wait for the server to drain in-flight scrapes
    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    // Print final stats
    let stats = scraper.stats();
    info!(
        scrapes_total = stats.scrapes_total,
        scrapes_failed = stats.scrapes_failed,
        metrics_exported = stats.metrics_exported,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
