//! treqs demo server.
//!
//! Serves the demo application behind the request tracer.
//!
//! ```text
//!     Client Request
//!     ─────────────▶ TraceLayer ─▶ tracer middleware ─▶ demo routes
//!                                   │  shared lock: pass-through, read
//!                                   │  exclusive lock: trace, reset
//!                                   ▼
//!                              SpanCapture ◀── every tracing span/event
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use treqs::config::{self, ConfigError, TracerConfig, TreqsConfig};
use treqs::http::{demo, Compactor, DemoState, HttpServer};
use treqs::observability::{logging, metrics, SpanCapture};
use treqs::{Shutdown, TraceCoordinator};

#[derive(Parser)]
#[command(name = "treqs")]
#[command(about = "Demo server with per-request runtime tracing", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => {
            let config = TreqsConfig::default();
            config::validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    let capture = SpanCapture::new();
    let capture_level = config::capture_level(&config).ok_or("invalid capture level")?;
    logging::init(&config.observability, &capture, capture_level)?;

    tracing::info!("treqs v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        capture_level = %capture_level,
        "Configuration loaded"
    );
    if config.tracer.key == TracerConfig::default().key {
        tracing::warn!("Using the default tracer key; set tracer.key in the configuration");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let coordinator = Arc::new(TraceCoordinator::new(
        config.tracer.key.clone(),
        Arc::new(capture),
    ));

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let state = DemoState::new().with_max_rounds(config.demo.max_rounds);
    let compactor = Compactor::new(coordinator.clone(), state.clone(), &config.demo);
    tokio::spawn(compactor.run(shutdown.subscribe()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(coordinator, demo::router(state));
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
