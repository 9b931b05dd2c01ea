//! Application state shared across handlers

use common::{
    mailer::Mailer,
    rate_limiter::{RateLimiter, RateLimiterConfig},
    verification::VerificationCodes,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    middleware::TokenVerifier,
    repositories::{ApplicationRepository, CarRepository, PartRepository, UserRepository},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub token_verifier: TokenVerifier,
    pub users: UserRepository,
    pub applications: ApplicationRepository,
    pub cars: CarRepository,
    pub parts: PartRepository,
    pub verification: VerificationCodes,
    pub mailer: Arc<dyn Mailer>,
    /// Throttles email-change code requests and confirmations
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(db_pool: PgPool, token_verifier: TokenVerifier, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            users: UserRepository::new(db_pool.clone()),
            applications: ApplicationRepository::new(db_pool.clone()),
            cars: CarRepository::new(db_pool.clone()),
            parts: PartRepository::new(db_pool.clone()),
            verification: VerificationCodes::new(mailer.clone()),
            db_pool,
            token_verifier,
            mailer,
            rate_limiter: RateLimiter::new(RateLimiterConfig::default()),
        }
    }
}
