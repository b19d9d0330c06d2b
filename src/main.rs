use anyhow::{Context, Result};
use axum::Router;
use services::{blob_store::BlobStore, catalog_service::MediaCatalog};
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting media-catalog with config: {:?}", cfg);

    // --- Rebuild the catalog from the music directory ---
    let catalog = MediaCatalog::open(
        BlobStore::new(cfg.music_dir.clone()),
        BlobStore::new(cfg.covers_dir.clone()),
    )
    .await
    .context("opening the media catalog")?;

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(catalog);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
