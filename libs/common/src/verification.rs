//! Verification-code lifecycle used for email confirmation, password reset
//! and email change
//!
//! At most one code is active per email address. Issuing a code deletes any
//! earlier one and sends the new code by email; the write and the send
//! happen on the caller's connection so that a failed send rolls back with
//! the caller's transaction. Verifying distinguishes a wrong code from an
//! expired one, and consuming deletes the row.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::{FromRow, PgConnection, PgPool};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::mailer::{Email, MailError, Mailer};

/// Lifetime of a freshly issued code
pub const CODE_TTL_MINUTES: i64 = 10;

/// How long an expired code is kept so that late attempts still report
/// expiry rather than a wrong code
pub const EXPIRED_RETENTION_HOURS: i64 = 24;

/// Error raised by the verification-code lifecycle
#[derive(Error, Debug)]
pub enum VerificationError {
    /// No code is active for the address, or it does not match
    #[error("Invalid verification code")]
    InvalidCode,

    /// The code matched but its lifetime has passed
    #[error("Verification code has expired")]
    Expired,

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What a code proves, which selects the wording of the email
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    EmailVerification,
    PasswordReset,
    EmailChange,
}

impl CodePurpose {
    fn subject(self) -> &'static str {
        match self {
            CodePurpose::EmailVerification => "Email verification code",
            CodePurpose::PasswordReset => "Password reset code",
            CodePurpose::EmailChange => "Email change confirmation code",
        }
    }

    /// Render the email carrying `code` to `recipient`
    pub fn email(self, recipient: &str, code: &str) -> Email {
        let action = match self {
            CodePurpose::EmailVerification => "confirm your email address",
            CodePurpose::PasswordReset => "reset your password",
            CodePurpose::EmailChange => "change the email address of your account",
        };

        Email {
            to: recipient.to_string(),
            subject: self.subject().to_string(),
            body: format!(
                "Your code to {} is {}. It is valid for {} minutes.",
                action, code, CODE_TTL_MINUTES
            ),
        }
    }
}

/// Stored verification code
#[derive(Debug, Clone, FromRow)]
pub struct VerificationCode {
    pub id: i32,
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    /// Check `candidate` against this code at instant `now`
    pub fn check(&self, candidate: &str, now: DateTime<Utc>) -> Result<(), VerificationError> {
        if self.code != candidate.trim() {
            return Err(VerificationError::InvalidCode);
        }

        if now >= self.expires_at {
            return Err(VerificationError::Expired);
        }

        Ok(())
    }
}

/// Generate a random six-digit numeric code
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Issues, verifies and consumes verification codes
#[derive(Clone)]
pub struct VerificationCodes {
    mailer: Arc<dyn Mailer>,
    ttl: Duration,
}

impl VerificationCodes {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self {
            mailer,
            ttl: Duration::minutes(CODE_TTL_MINUTES),
        }
    }

    /// Replace any code for `email` with a new one and send it
    ///
    /// Run this inside a transaction: if the email cannot be sent the error
    /// is returned and the caller's rollback discards the new code.
    pub async fn issue(
        &self,
        conn: &mut PgConnection,
        email: &str,
        purpose: CodePurpose,
    ) -> Result<(), VerificationError> {
        let code = generate_code();
        let expires_at = Utc::now() + self.ttl;

        sqlx::query("DELETE FROM verification_codes WHERE email = $1")
            .bind(email)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            "INSERT INTO verification_codes (email, code, expires_at)
             VALUES ($1, $2, $3)",
        )
        .bind(email)
        .bind(&code)
        .bind(expires_at)
        .execute(&mut *conn)
        .await?;

        self.mailer.send(purpose.email(email, &code)).await?;

        info!("Issued {:?} code for {}", purpose, email);
        Ok(())
    }

    /// Look up the active code for `email`
    pub async fn find(
        &self,
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<VerificationCode>, VerificationError> {
        let code = sqlx::query_as::<_, VerificationCode>(
            "SELECT id, email, code, expires_at, created_at
             FROM verification_codes
             WHERE email = $1
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(code)
    }

    /// Check `candidate` against the active code for `email`
    pub async fn verify(
        &self,
        conn: &mut PgConnection,
        email: &str,
        candidate: &str,
    ) -> Result<(), VerificationError> {
        let entry = self
            .find(conn, email)
            .await?
            .ok_or(VerificationError::InvalidCode)?;

        entry.check(candidate, Utc::now())
    }

    /// Delete the code for `email` once the guarded action has been applied
    pub async fn consume(
        &self,
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<(), VerificationError> {
        sqlx::query("DELETE FROM verification_codes WHERE email = $1")
            .bind(email)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}

/// Remove codes that expired more than [`EXPIRED_RETENTION_HOURS`] ago
pub async fn purge_expired(pool: &PgPool) -> Result<u64, VerificationError> {
    let cutoff = Utc::now() - Duration::hours(EXPIRED_RETENTION_HOURS);
    let result = sqlx::query("DELETE FROM verification_codes WHERE expires_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_issued_at(issued_at: DateTime<Utc>) -> VerificationCode {
        VerificationCode {
            id: 1,
            email: "buyer@example.com".to_string(),
            code: "482913".to_string(),
            expires_at: issued_at + Duration::minutes(CODE_TTL_MINUTES),
            created_at: issued_at,
        }
    }

    #[test]
    fn test_generate_code_is_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.chars().next(), Some('0'));
        }
    }

    #[test]
    fn test_correct_code_within_lifetime() {
        let issued = Utc::now();
        let code = code_issued_at(issued);
        assert!(code.check("482913", issued + Duration::minutes(9)).is_ok());
        assert!(code.check(" 482913 ", issued).is_ok());
    }

    #[test]
    fn test_wrong_code_is_rejected() {
        let issued = Utc::now();
        let code = code_issued_at(issued);
        assert!(matches!(
            code.check("000000", issued),
            Err(VerificationError::InvalidCode)
        ));
    }

    #[test]
    fn test_correct_code_after_expiry_reports_expiry() {
        let issued = Utc::now();
        let code = code_issued_at(issued);
        let later = issued + Duration::minutes(CODE_TTL_MINUTES) + Duration::seconds(1);

        let err = code.check("482913", later).unwrap_err();
        assert!(matches!(err, VerificationError::Expired));
        assert_eq!(err.to_string(), "Verification code has expired");
    }

    #[test]
    fn test_purpose_email_contains_code() {
        let email = CodePurpose::PasswordReset.email("buyer@example.com", "123456");
        assert_eq!(email.to, "buyer@example.com");
        assert_eq!(email.subject, "Password reset code");
        assert!(email.body.contains("123456"));
        assert!(email.body.contains("10 minutes"));
    }
}
