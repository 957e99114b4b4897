//! `pushgate` binary

use anyhow::{Context, Result};
use clap::Parser;
use pushgate_config::ConfigLoader;
use pushgate_core::{store, Chain, PluginRegistry, ProxyContext};
use pushgate_server::{create_router, init_tracing, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Policy-enforcing proxy for git pushes
#[derive(Parser, Debug)]
#[command(name = "pushgate", version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load_with_overrides(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    init_tracing(&config.observability).context("Failed to initialise logging")?;

    let store = store::from_config(&config.store)
        .await
        .context("Failed to open store")?;
    store::seed(store.as_ref(), &config.authorised_list, &config.users)
        .await
        .context("Failed to seed store")?;

    let plugins = PluginRegistry::from_config(&config.plugins).context("Failed to load plugins")?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let ctx = ProxyContext::new(config, store).context("Failed to build proxy context")?;
    match ctx.workspace.sweep().await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Removed stale workspaces"),
        Err(e) => warn!(error = %e, "Failed to sweep stale workspaces"),
    }

    let chain = Chain::new(ctx, &plugins);
    let state = Arc::new(AppState::new(chain).context("Failed to build HTTP client")?);
    let app = create_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!("pushgate listening on {}", bind_addr);
    info!("Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("pushgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
