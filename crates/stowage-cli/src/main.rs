#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;
mod telemetry;

use std::process;

use anyhow::Context;
use axum::Router;
use stowage_server::handler::routes;
use stowage_server::middleware::RouterExt;
use stowage_server::service::ServiceState;
use stowage_storage::Storage;

use crate::config::{Cli, ServerConfig};

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "stowage_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "stowage_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "stowage_cli::config";
pub const TRACING_TARGET_TELEMETRY: &str = "stowage_cli::telemetry";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = format!("{error:#}"),
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
///
/// The telemetry guard lives until this returns, so providers are flushed
/// before `main` exits the process.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    let telemetry = telemetry::init(&cli.telemetry).context("failed to initialize telemetry")?;
    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        otlp_export = telemetry.is_exporting(),
        "starting stowage server"
    );

    cli.log();
    cli.validate()?;

    let storage = cli
        .storage
        .connect()
        .await
        .context("failed to connect object storage")?;
    let router = create_router(storage, &cli.server);

    if let Err(error) = server::serve(router, cli.server).await {
        if let Some(suggestion) = error.suggestion() {
            tracing::info!(target: TRACING_TARGET_SERVER_STARTUP, suggestion, "hint");
        }
        return Err(error.into());
    }

    tracing::info!(
        target: TRACING_TARGET_SERVER_SHUTDOWN,
        "application terminated successfully"
    );
    Ok(())
}

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Observability (outermost) - request IDs and tracing spans
/// 2. Recovery - turns handler panics into JSON 500s
/// 3. Body limit - caps upload bodies
/// 4. Routes (innermost) - actual request handlers
fn create_router(storage: Storage, server: &ServerConfig) -> Router {
    routes(ServiceState::new(storage))
        .with_body_limit(server.max_upload_size)
        .with_recovery()
        .with_observability()
}
