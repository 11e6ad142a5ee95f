//! Server startup: storage selection, optional seeding, and the HTTP loop.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use flagdeck_core::Config;
use flagdeck_storage::{Snapshot, StorageEngine};

use crate::router::build_router;
use crate::state::AppState;

/// Build `AppState` from config, loading `seed` into the stores first when
/// given.
pub async fn build_app_state(config: &Config, seed: Option<&Path>) -> anyhow::Result<Arc<AppState>> {
    let storage = StorageEngine::from_config(config)
        .await
        .context("Failed to initialize storage")?;
    info!("Storage ready (backend: {})", storage.backend.as_str());

    if let Some(path) = seed {
        if !path.exists() {
            anyhow::bail!("Seed file {} does not exist", path.display());
        }
        let snapshot = Snapshot::load(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let inserted = storage.seed(snapshot).await.context("Failed to seed storage")?;
        info!("Seed file {} applied ({} new entities)", path.display(), inserted);
    }

    Ok(Arc::new(AppState::new(storage, config.clone())))
}

pub async fn serve(config: &Config, seed: Option<&Path>) -> anyhow::Result<()> {
    config.log_summary();
    let state = build_app_state(config, seed).await?;
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);
    info!("API docs at http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
