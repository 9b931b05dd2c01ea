use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod filter;
mod middleware;
mod models;
mod repositories;
mod routes;
mod state;

use common::{
    database::{self, DatabaseConfig},
    mailer::{SmtpConfig, SmtpMailer},
    rate_limiter::RateLimiter,
    settings::ServerConfig,
};

use crate::{
    middleware::{JwtConfig, TokenVerifier},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting API service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool).await?;

    let jwt_config = JwtConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let mailer = SmtpMailer::new(&SmtpConfig::from_env()?)?;
    let server = ServerConfig::from_env("API", 3001)?;

    let app_state = AppState::new(pool, TokenVerifier::new(&jwt_config), Arc::new(mailer));

    spawn_maintenance(app_state.rate_limiter.clone());

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state)
        .layer(server.cors_layer())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(server.address()).await?;
    info!("API service listening on {}", server.address());

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop stale throttle entries
fn spawn_maintenance(rate_limiter: RateLimiter) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            rate_limiter.prune().await;
        }
    });
}
