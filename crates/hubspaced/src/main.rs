use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hubspaced::Config;
use hubspaced::Engine;
use tracing_subscriber::prelude::*;

/// Home automation daemon for HubSpace devices
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "hubspaced.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)?;

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.filter())
        .init();

    tracing::info!("hubspaced starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    let engine = Arc::new(Engine::new());
    let registered = engine.register_integrations_from_config(&config);
    if registered == 0 {
        tracing::warn!("No integrations enabled, nothing to poll");
    }

    let engine_task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run().await {
                tracing::error!("Engine stopped with error: {}", e);
            }
        })
    };

    let (api_shutdown_tx, api_shutdown_rx) = tokio::sync::oneshot::channel();
    let api_task = if config.api.enabled {
        let listen = config.api.listen.clone();
        let port = config.api.port;
        let engine = engine.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = hubspaced::api::serve(listen, port, engine, api_shutdown_rx).await {
                tracing::error!("HTTP API server failed: {}", e);
            }
        }))
    } else {
        tracing::info!("HTTP API disabled");
        None
    };

    tracing::info!("Press Ctrl+C to exit");

    // Wait for Ctrl+C
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received shutdown signal");
        }
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    if let Some(task) = api_task {
        let _ = api_shutdown_tx.send(());
        if let Err(e) = task.await {
            tracing::error!("HTTP API task failed: {}", e);
        }
    }

    tracing::info!("Shutting down integrations...");
    engine.shutdown().await;
    engine_task.abort();

    tracing::info!("hubspaced shutdown complete");

    Ok(())
}
