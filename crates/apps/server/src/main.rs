mod config;
mod routes;

use std::path::Path;
use std::sync::Arc;

use discovery::{DiscoveryService, InMemoryPlaceStore, Place};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::routes::{AppState, router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(err) => {
            error!("configuration error: {err}");
            std::process::exit(2);
        }
    };

    let store = match load_places(&config.places_path).await {
        Ok(places) => InMemoryPlaceStore::from_places(places),
        Err(err) => {
            warn!(
                "no places loaded from {}: {err}",
                config.places_path.display()
            );
            InMemoryPlaceStore::new()
        }
    };
    info!(places = store.len(), "place store ready");

    let state = AppState {
        service: Arc::new(DiscoveryService::new(Arc::new(store), config.discovery)),
    };
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(config.addr).await {
        Ok(l) => l,
        Err(err) => {
            error!("failed to bind {}: {err}", config.addr);
            std::process::exit(1);
        }
    };
    info!("discovery server listening on http://{}", config.addr);
    if let Err(err) = axum::serve(listener, app).await {
        error!("server stopped: {err}");
    }
}

async fn load_places(path: &Path) -> Result<Vec<Place>, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("read failed: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("invalid places json: {e}"))
}
