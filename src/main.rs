//! HTTP API server (v1)
//!
//! An HTTP server built with Tokio and Axum whose shutdown cooperates with
//! Kubernetes readiness probes.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                    API SERVER                     │
//!                      │                                                   │
//!   Client Request     │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ───────────────────┼─▶│ accept  │──▶│ pipeline │──▶│   /healthz   │   │
//!                      │  │  loop   │   │ panic →  │   │ + app routes │   │
//!                      │  └─────────┘   │ log →    │   └──────┬───────┘   │
//!                      │       ▲        │ headers  │          │ reads     │
//!                      │       │        └──────────┘          ▼           │
//!                      │  ┌────┴─────────────────┐    ┌──────────────┐    │
//!   SIGTERM/SIGINT ────┼─▶│ shutdown orchestrator│───▶│readiness gate│    │
//!                      │  └──────────────────────┘    └──────────────┘    │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use api_server::config::{load_config, ConfigOverrides, LogFormat};
use api_server::observability::logging::{self, LogOptions};
use api_server::{Server, ServerError};

#[derive(Parser)]
#[command(name = "api-server", version)]
#[command(about = "HTTP API server with probe-aware graceful shutdown", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Record source file and line in log events
    #[arg(long, global = true, env = "LOG_SHOW_SOURCE", num_args = 0..=1, default_missing_value = "true")]
    log_show_source: Option<bool>,

    /// Log output format
    #[arg(long, global = true, env = "LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    /// Optional TOML configuration file
    #[arg(long, global = true, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Server {
        /// Server port
        #[arg(long = "http-port", env = "HTTP_PORT")]
        port: Option<u16>,

        /// Value from the pod's readinessProbe.periodSeconds
        #[arg(
            long = "http-readiness-probe-period-seconds",
            env = "HTTP_READINESS_PROBE_PERIOD_SECONDS"
        )]
        probe_period_secs: Option<u64>,

        /// Allow running the server as root
        #[arg(long = "allow-root-user", env = "ALLOW_ROOT_USER", num_args = 0..=1, default_missing_value = "true")]
        allow_root_user: Option<bool>,

        /// Port for the Prometheus metrics endpoint
        #[arg(long, env = "METRICS_PORT")]
        metrics_port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Exiting");
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), ServerError> {
    let Commands::Server {
        port,
        probe_period_secs,
        allow_root_user,
        metrics_port,
    } = cli.command;

    let overrides = ConfigOverrides {
        port,
        probe_period_secs,
        log_level: cli.log_level,
        log_format: cli.log_format,
        log_show_source: cli.log_show_source,
        allow_privileged_user: allow_root_user,
        metrics_port,
    };
    let config = load_config(cli.config.as_deref(), overrides)?;

    logging::init(LogOptions {
        level: config.log_level,
        format: config.log_format,
        show_source: config.log_show_source,
    })?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-server starting");

    Server::new(config).run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
