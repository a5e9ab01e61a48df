/**
 * CABLETRACE KERNEL - Point d'entrée du serveur de connectivité
 *
 * RÔLE : Bootstrap : .env, logs, config YAML, ouverture du store, moteur,
 * puis API HTTP Axum.
 *
 * UTILITÉ : Backend unique des apps de scan et de traçage ; seul process qui
 * écrit dans les tables de câblage.
 */

mod config;
mod health;
mod http;
mod state;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cabletrace_engine::{ConnectivityEngine, JsonFileStore, MemoryStore, Stores};

use crate::config::{load_config, StorageConf, StorageKind};
use crate::health::HealthTracker;
use crate::http::AppState;

fn open_stores(storage: &StorageConf) -> Result<Stores> {
    match storage.kind {
        StorageKind::Memory => Ok(Stores::shared(Arc::new(MemoryStore::new()))),
        StorageKind::Json => {
            let store = JsonFileStore::open(&storage.path)
                .with_context(|| format!("failed to open json store at {}", storage.path))?;
            Ok(Stores::shared(Arc::new(store)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config().await;
    let stores = open_stores(&cfg.storage)?;
    let storage_label = match cfg.storage.kind {
        StorageKind::Memory => "memory".to_string(),
        StorageKind::Json => format!("json:{}", cfg.storage.path),
    };

    let engine = ConnectivityEngine::new(stores, cfg.synthesis.clone());
    let app_state = AppState::new(engine, HealthTracker::new(storage_label.clone()));
    info!(
        storage = %storage_label,
        full_ratio_percent = app_state.settings().full_ratio_percent,
        seeded = app_state.settings().rng_seed.is_some(),
        "engine ready"
    );

    let app = http::build_router(app_state);

    let listener = TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen))?;
    info!("listening on http://{}", cfg.listen);
    axum::serve(listener, app).await.context("http server stopped")?;
    Ok(())
}
