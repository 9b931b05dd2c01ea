//! Common library for the DragonAuto marketplace
//!
//! This crate provides shared functionality used across the auth, api and
//! media services: database connectivity and migrations, error types,
//! password hashing, per-key rate limiting, user roles, input validation,
//! outbound email and the verification-code lifecycle.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, health_check, init_pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     let is_healthy = health_check(&pool).await?;
//!     tracing::info!("Database health check: {}", is_healthy);
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
pub mod mailer;
pub mod password;
pub mod rate_limiter;
pub mod role;
pub mod settings;
pub mod validation;
pub mod verification;
