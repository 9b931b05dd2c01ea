//! Repositories for database operations

pub mod application;
pub mod catalog;
pub mod user;

pub use application::ApplicationRepository;
pub use catalog::{CarRepository, PartRepository};
pub use user::UserRepository;

/// Whether `err` is a violation of a unique constraint
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}
