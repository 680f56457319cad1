//! Web service skeleton.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request_id ──▶ access_log ──▶ timeout ──▶ handler
//!                         │              │                         │
//!     Client Response     │              ▼                         │
//!     ◀──── X-Request-ID ─┘        Logger ◀── tracing bridge ◀─────┘
//!                                    │
//!                        ┌───────────┴───────────┐
//!                        ▼                       ▼
//!                  console sink           rotating file sinks
//! ```

use std::path::PathBuf;

use clap::Parser;

use api_skeleton::http::HttpServer;
use api_skeleton::lifecycle::{signals, startup, Shutdown};

#[derive(Parser)]
#[command(name = "api-skeleton")]
#[command(about = "Minimal JSON web service with structured request logging", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = startup::load(cli.config.as_deref())?;
    let logger = startup::init_logging(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.server.bind_address,
        request_timeout_secs = config.server.request_timeout_secs,
        log_level = %config.logging.level,
        "Configuration loaded"
    );

    let listener = match startup::bind(&config.server).await {
        Ok(listener) => listener,
        Err(e) => {
            logger.error_with_stack(&e, &[]);
            let _ = logger.sync();
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config.server.clone(), logger.clone());
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    signals::shutdown_on_signal(&shutdown).await;

    match server_task.await {
        Ok(Ok(())) => tracing::info!("Shutdown complete"),
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
        Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
    }

    logger.sync()?;
    Ok(())
}
