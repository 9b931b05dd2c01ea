use anyhow::Result;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod routes;
mod storage;

use common::settings::ServerConfig;
use storage::{DiskStorage, UploadConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting media service");

    let upload_config = UploadConfig::from_env();
    tokio::fs::create_dir_all(&upload_config.dir).await?;
    let storage = DiskStorage::new(&upload_config);
    let server = ServerConfig::from_env("MEDIA", 3002)?;

    info!(
        "Storing uploads in {} (limit {} bytes)",
        upload_config.dir.display(),
        upload_config.max_bytes
    );

    let app = routes::create_router(storage)
        .layer(server.cors_layer())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(server.address()).await?;
    info!("Media service listening on {}", server.address());

    axum::serve(listener, app).await?;

    Ok(())
}
