use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod error;
mod jwt;
mod models;
mod repositories;
mod routes;

use common::{
    database::{self, DatabaseConfig},
    mailer::{SmtpConfig, SmtpMailer},
    rate_limiter::{RateLimiter, RateLimiterConfig},
    settings::ServerConfig,
    verification::{self, VerificationCodes},
};
use sqlx::PgPool;

use crate::{
    jwt::{JwtConfig, JwtService},
    repositories::UserRepository,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_service: JwtService,
    pub user_repository: UserRepository,
    pub verification: VerificationCodes,
    pub rate_limiter: RateLimiter,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

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

    let purged = verification::purge_expired(&pool).await?;
    info!("Purged {} expired verification codes", purged);

    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;
    let mailer = SmtpMailer::new(&SmtpConfig::from_env()?)?;
    let server = ServerConfig::from_env("AUTH", 3000)?;

    let rate_limiter = RateLimiter::new(RateLimiterConfig::default());
    spawn_maintenance(pool.clone(), rate_limiter.clone());

    let app_state = AppState {
        db_pool: pool.clone(),
        jwt_service,
        user_repository: UserRepository::new(pool),
        verification: VerificationCodes::new(Arc::new(mailer)),
        rate_limiter,
    };

    let app = routes::create_router(app_state)
        .layer(server.cors_layer())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(server.address()).await?;
    info!("Authentication service listening on {}", server.address());

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop expired codes and stale throttle entries
fn spawn_maintenance(pool: PgPool, rate_limiter: RateLimiter) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            rate_limiter.prune().await;
            match verification::purge_expired(&pool).await {
                Ok(purged) if purged > 0 => info!("Purged {} expired verification codes", purged),
                Ok(_) => {}
                Err(e) => error!("Failed to purge verification codes: {}", e),
            }
        }
    });
}
