//! Geoproxy gateway (v1)
//!
//! Forwards management calls to stamp endpoints, attaching the credential each
//! stamp expects.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────────┐
//!                          │                       GEOPROXY                         │
//!                          │                                                        │
//!     Client Request       │  ┌────────┐   ┌──────────┐   ┌─────────────────────┐   │
//!     ─────────────────────┼─▶│  http  │──▶│ routing  │──▶│        auth         │   │
//!                          │  │ server │   │ stamp +  │   │ cert / token / basic│   │
//!                          │  └────────┘   │ version  │   └──────────┬──────────┘   │
//!                          │               └──────────┘              │              │
//!                          │                                         ▼              │
//!     Client Response      │  ┌────────┐   ┌──────────┐   ┌─────────────────────┐   │
//!     ◀────────────────────┼──│response│◀──│ security │◀──│  proxy (forwarder,  │◀──┼──── Stamp
//!                          │  │JSON 500│   │ headers  │   │  transport pool)    │   │
//!                          │  └────────┘   └──────────┘   └─────────────────────┘   │
//!                          │                                                        │
//!                          │  config · observability · lifecycle · admin · net      │
//!                          └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use geoproxy::config::loader::{load_config, load_from_env};
use geoproxy::lifecycle::{self, Shutdown};
use geoproxy::observability::logging::init_tracing;

#[derive(Parser)]
#[command(name = "geoproxy")]
#[command(about = "Gateway that forwards management calls to stamps", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Without it, defaults plus environment are used.
    #[arg(short, long, env = "GEOPROXY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    init_tracing(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "geoproxy starting");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    if let Err(e) = lifecycle::run(config, shutdown).await {
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        tracing::error!(error = %message, "geoproxy stopped with an error");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
