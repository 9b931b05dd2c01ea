//! Integration tests for the shared infrastructure
//!
//! These tests need a PostgreSQL instance reachable through `DATABASE_URL`
//! and are ignored by default. Run them with `cargo test -- --ignored`.

use async_trait::async_trait;
use common::{
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    mailer::{Email, MailError, Mailer},
    verification::{CodePurpose, VerificationCodes, VerificationError, purge_expired},
};
use sqlx::{PgPool, Row};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Send("relay unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

impl RecordingMailer {
    fn last_code(&self) -> String {
        let sent = self.sent.lock().unwrap();
        let body = &sent.last().expect("no email was sent").body;
        body.split_whitespace()
            .map(|word| word.trim_end_matches('.'))
            .find(|word| word.len() == 6 && word.chars().all(|c| c.is_ascii_digit()))
            .expect("email carries no code")
            .to_string()
    }
}

async fn setup() -> PgPool {
    let config = DatabaseConfig::from_env().expect("DATABASE_URL must be set");
    let pool = init_pool(&config).await.expect("database must be reachable");
    run_migrations(&pool).await.expect("migrations must apply");
    pool
}

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, rand_suffix())
}

fn rand_suffix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

async fn codes_for(pool: &PgPool, email: &str) -> i64 {
    sqlx::query("SELECT COUNT(*) AS count FROM verification_codes WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await
        .unwrap()
        .get("count")
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_database_is_reachable_and_migrated() {
    let pool = setup().await;
    assert!(health_check(&pool).await.unwrap(), "Database health check failed");

    let row = sqlx::query("SELECT 1 AS result").fetch_one(&pool).await.unwrap();
    let result: i32 = row.get("result");
    assert_eq!(result, 1);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_issuing_a_code_replaces_the_previous_one() {
    let pool = setup().await;
    let mailer = Arc::new(RecordingMailer::default());
    let codes = VerificationCodes::new(mailer.clone());
    let email = unique_email("reissue");

    let mut conn = pool.acquire().await.unwrap();
    codes
        .issue(&mut *conn, &email, CodePurpose::PasswordReset)
        .await
        .unwrap();
    let first = mailer.last_code();

    codes
        .issue(&mut *conn, &email, CodePurpose::PasswordReset)
        .await
        .unwrap();
    let second = mailer.last_code();

    assert_eq!(codes_for(&pool, &email).await, 1);
    assert!(codes.verify(&mut *conn, &email, &second).await.is_ok());
    if first != second {
        assert!(matches!(
            codes.verify(&mut *conn, &email, &first).await,
            Err(VerificationError::InvalidCode)
        ));
    }

    codes.consume(&mut *conn, &email).await.unwrap();
    assert_eq!(codes_for(&pool, &email).await, 0);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_failed_send_leaves_no_code_behind() {
    let pool = setup().await;
    let mailer = Arc::new(RecordingMailer {
        fail: true,
        ..Default::default()
    });
    let codes = VerificationCodes::new(mailer);
    let email = unique_email("unsent");

    let mut tx = pool.begin().await.unwrap();
    let result = codes
        .issue(&mut *tx, &email, CodePurpose::EmailVerification)
        .await;
    assert!(matches!(result, Err(VerificationError::Mail(_))));
    drop(tx);

    assert_eq!(codes_for(&pool, &email).await, 0);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_expired_code_is_rejected_with_expiry_error() {
    let pool = setup().await;
    let mailer = Arc::new(RecordingMailer::default());
    let codes = VerificationCodes::new(mailer.clone());
    let email = unique_email("expired");

    let mut conn = pool.acquire().await.unwrap();
    codes
        .issue(&mut *conn, &email, CodePurpose::EmailChange)
        .await
        .unwrap();
    let code = mailer.last_code();

    sqlx::query(
        "UPDATE verification_codes SET expires_at = NOW() - INTERVAL '1 minute' WHERE email = $1",
    )
    .bind(&email)
    .execute(&pool)
    .await
    .unwrap();

    assert!(matches!(
        codes.verify(&mut *conn, &email, &code).await,
        Err(VerificationError::Expired)
    ));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_purge_keeps_recently_expired_codes() {
    let pool = setup().await;
    let mailer = Arc::new(RecordingMailer::default());
    let codes = VerificationCodes::new(mailer.clone());
    let recent = unique_email("recent");
    let stale = unique_email("stale");

    let mut conn = pool.acquire().await.unwrap();
    codes
        .issue(&mut *conn, &recent, CodePurpose::PasswordReset)
        .await
        .unwrap();
    let code = mailer.last_code();
    codes
        .issue(&mut *conn, &stale, CodePurpose::PasswordReset)
        .await
        .unwrap();

    sqlx::query(
        "UPDATE verification_codes SET expires_at = NOW() - INTERVAL '1 minute' WHERE email = $1",
    )
    .bind(&recent)
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "UPDATE verification_codes SET expires_at = NOW() - INTERVAL '2 days' WHERE email = $1",
    )
    .bind(&stale)
    .execute(&pool)
    .await
    .unwrap();

    purge_expired(&pool).await.unwrap();

    assert_eq!(codes_for(&pool, &stale).await, 0);
    assert_eq!(codes_for(&pool, &recent).await, 1);
    assert!(matches!(
        codes.verify(&mut *conn, &recent, &code).await,
        Err(VerificationError::Expired)
    ));
}
