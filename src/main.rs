//! webcmd
//!
//! Maps HTTP requests to command executions.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client Request
//!   ──────────────▶ http server ──▶ route table ──▶ [cache] ──▶ dispatcher
//!                   (request id,    (404 / 405)                 │ parameters → env
//!                    trace,                                     │ body → stdin
//!                    timeout)                                   ▼
//!                                                    executer registry
//!                                                    ├─ direct process
//!                                                    └─ pooled shell ◀── shell pool
//!                                                                 │      (replenisher)
//!   Client Response                                               ▼
//!   ◀────────────── response assembly ◀── exit code table ◀── process output
//! ```

use std::error::Error;

use clap::Parser;

use webcmd::cli::{Cli, Commands, RunArgs};
use webcmd::config::loader::{config_source, load_config, validate};
use webcmd::http::{bind, HttpServer};
use webcmd::lifecycle::signals::spawn_signal_handler;
use webcmd::lifecycle::Shutdown;
use webcmd::observability::logging::{init_tracing, LogSettings};
use webcmd::observability::metrics::init_metrics;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run(args) => run(&cli, args).await,
    }
}

async fn run(cli: &Cli, args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let source = config_source(args.config_file.as_deref());
    let mut config = load_config(source.as_deref())?;

    init_tracing(&LogSettings::new(
        &config.observability.log_level,
        cli.verbose,
        !cli.no_color,
    ));
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "webcmd starting");
    match &source {
        Some(path) => tracing::info!(path = %path.display(), routes = config.routes.len(), "Configuration file read"),
        None => tracing::info!("No configuration file, using defaults"),
    }

    args.apply(&mut config);
    tracing::info!(
        bind_address = %config.server.bind_address(),
        routes = config.routes.len(),
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    validate(&config)?;
    if args.dry_run {
        tracing::info!("Dry run finished, configuration is valid");
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = bind(&config.server.bind_address()).await?;
    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(&config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
