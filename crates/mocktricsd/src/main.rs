//! mocktricsd — the Mocktrics daemon.
//!
//! Assembles the metric registry, the collect scheduler, the optional
//! redb store and the management API into one process.
//!
//! # Usage
//!
//! ```text
//! mocktricsd --config mocktrics.toml --port 8080 --data-dir /var/lib/mocktrics
//! ```

mod bootstrap;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mocktrics_core::MocktricsConfig;
use mocktrics_state::StateStore;

const DEFAULT_LOG_FILTER: &str = "info,mocktricsd=debug,mocktrics=debug";

#[derive(Parser)]
#[command(name = "mocktricsd", about = "Synthetic Prometheus metrics generator")]
struct Cli {
    /// Path to a mocktrics.toml configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Directory for the metric store. Without it, API-created metrics are
    /// lost on restart.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Export families without the `_<unit>` name suffix.
    #[arg(long)]
    disable_units: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("mocktrics daemon starting");

    let config = MocktricsConfig::load(cli.config.as_deref())?;
    info!(
        path = ?cli.config,
        metrics = config.metrics.len(),
        interval = config.effective_interval(),
        fixed = config.interval_is_fixed(),
        "configuration loaded"
    );

    let store = match &cli.data_dir {
        Some(data_dir) => {
            std::fs::create_dir_all(data_dir)?;
            let db_path = data_dir.join("mocktrics.redb");
            let store = StateStore::open(&db_path)?;
            info!(path = ?db_path, "metric store opened");
            Some(store)
        }
        None => None,
    };

    let state = bootstrap::assemble(&config, cli.disable_units, store)?;
    let scheduler = state.scheduler.clone();
    scheduler.start();

    let router = mocktrics_api::build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    scheduler.stop().await;
    info!("mocktrics daemon stopped");
    Ok(())
}
