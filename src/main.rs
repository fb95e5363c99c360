//! Folio -- blog and user content service.
//!
//! Startup loads configuration, opens the metadata and media stores, and
//! serves the HTTP API until SIGTERM/SIGINT.  Shutdown does no cleanup;
//! media orphaned by interrupted flows is left to the reconciler.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use folio::reconcile::Reconciler;

/// Command-line arguments for the Folio server.
#[derive(Parser, Debug)]
#[command(name = "folio", version, about = "Blog and user content service")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "folio.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = folio::config::load_config(&cli.config)?;
    folio::init_tracing(&config.logging);
    info!("Loaded configuration from {}", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    if config.observability.metrics {
        folio::metrics::init_metrics();
        folio::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let metadata = folio::metadata::open(&config.metadata)?;
    let media = folio::storage::open(&config.storage).await?;

    if config.reconcile.interval_seconds > 0 {
        let reconciler = Arc::new(Reconciler::new(
            metadata.clone(),
            media.clone(),
            config.reconcile.grace_seconds,
        ));
        let interval = Duration::from_secs(config.reconcile.interval_seconds);
        tokio::spawn(reconciler.run_periodic(interval));
        info!(
            "Media reconciler running every {}s (grace {}s)",
            config.reconcile.interval_seconds, config.reconcile.grace_seconds
        );
    }

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let state = Arc::new(folio::AppState::new(config, metadata, media));
    let app = folio::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Folio listening on {}", bind_addr);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    tokio::select! {
        result = server => result?,
        _ = drain_deadline(shutdown_timeout) => {
            tracing::warn!("In-flight requests did not drain within {:?}, exiting", shutdown_timeout);
        }
    }

    info!("Folio shut down");
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}

/// Resolve `timeout` after the first shutdown signal; pending until then.
async fn drain_deadline(timeout: Duration) {
    shutdown_signal().await;
    tokio::time::sleep(timeout).await;
}
