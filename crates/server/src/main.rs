// crates/server/src/main.rs
//! Stemsplit server binary.
//!
//! Parses configuration, prepares the storage directories, starts the
//! cleanup scheduler and serves the API.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use stemsplit_server::cli::Cli;
use stemsplit_server::{cleanup, create_app, init_metrics, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,stemsplit_server=info,stemsplit_core=info".into()),
        )
        .compact()
        .init();

    let config = Cli::parse().into_config()?;

    init_metrics();

    let paths = config.paths();
    paths
        .ensure()
        .await
        .with_context(|| format!("creating storage under {}", config.data_dir.display()))?;

    let addr = SocketAddr::new(config.host, config.port);
    let state = AppState::new(config);
    cleanup::spawn_scheduler(state.clone());

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        %addr,
        uploads = %paths.uploads.display(),
        outputs = %paths.outputs.display(),
        version = env!("CARGO_PKG_VERSION"),
        "stemsplit listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
