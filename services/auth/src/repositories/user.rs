//! User repository for database operations

use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::models::{NewUser, User};

const USER_COLUMNS: &str =
    "id, email, password, first_name, last_name, role, photo_url, is_verified, created_at";

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an unverified user with the default role
    ///
    /// Takes a connection so that registration can issue the verification
    /// code inside the same transaction.
    pub async fn create(
        &self,
        conn: &mut PgConnection,
        new_user: &NewUser,
    ) -> Result<User, sqlx::Error> {
        info!("Creating new user: {}", new_user.email);

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password, first_name, last_name, photo_url)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.photo_url)
        .fetch_one(&mut *conn)
        .await?;

        Ok(user)
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Mark the account owning `email` as verified
    pub async fn mark_verified(
        &self,
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET is_verified = TRUE WHERE email = $1")
            .bind(email)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the stored password hash of the account owning `email`
    pub async fn update_password(
        &self,
        conn: &mut PgConnection,
        email: &str,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password = $1 WHERE email = $2")
            .bind(password_hash)
            .bind(email)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Whether `err` is a violation of a unique constraint
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}
