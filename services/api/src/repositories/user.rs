//! User persistence for profile management and request authentication

use common::role::Role;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::models::profile::Profile;

const PROFILE_COLUMNS: &str =
    "id, email, first_name, last_name, role, photo_url, is_verified, created_at";

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

    /// Current role of a user, or `None` when the account is gone
    pub async fn find_role(&self, id: i32) -> Result<Option<Role>, sqlx::Error> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        role.map(|r| r.parse::<Role>())
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    pub async fn find_profile(&self, id: i32) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Overwrite the given profile fields, keeping the others
    pub async fn update_profile(
        &self,
        id: i32,
        first_name: Option<&str>,
        last_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($1, first_name),
                last_name = COALESCE($2, last_name),
                photo_url = COALESCE($3, photo_url)
            WHERE id = $4
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(first_name)
        .bind(last_name)
        .bind(photo_url)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn password_hash(&self, id: i32) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT password FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn set_password(&self, id: i32, password_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!("Password changed for user {}", id);
        Ok(result.rows_affected() > 0)
    }

    /// Whether another account already uses `email`
    pub async fn email_taken(&self, email: &str, except_id: i32) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND id <> $2)")
            .bind(email)
            .bind(except_id)
            .fetch_one(&self.pool)
            .await
    }

    /// Replace the email of a user inside the caller's transaction
    pub async fn set_email(
        &self,
        conn: &mut PgConnection,
        id: i32,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET email = $1 WHERE id = $2")
            .bind(email)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
