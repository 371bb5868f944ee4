use std::sync::Arc;

use anyhow::Context;
use golinks::{server, AppConfig, AppState, LinkStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Load .env if present; plain env vars work too
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "golinks=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Configuration problems (bad upstream URL) are fatal
    let config = AppConfig::from_env()?;
    tracing::info!(
        listen = %config.listen_addr,
        upstream = %config.upstream_target,
        db = %config.db_file.display(),
        hosts = ?config.go_hosts,
        "Starting go links service"
    );

    // A corrupt database is fatal too; starting empty would overwrite it
    let store = LinkStore::open(&config.db_file)
        .with_context(|| format!("failed to load links from {}", config.db_file.display()))?;

    let state = Arc::new(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&state.config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", state.config.listen_addr))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    server::serve(state, listener, server::shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}
