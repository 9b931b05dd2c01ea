//! Authentication service routes
//!
//! Registration leaves the account unverified and mails a code; the code
//! must be confirmed before login succeeds. Password reset follows the same
//! code flow. Every step that checks a secret is throttled per email.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use common::{
    password::{hash_password, verify_password},
    validation::{normalize_email, validate_email, validate_name, validate_password},
    verification::CodePurpose,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    AppState,
    error::AuthError,
    models::{NewUser, user::UserSummary},
    repositories::user::is_unique_violation,
};

/// Request for user registration
#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub photo_url: Option<String>,
}

/// Request carrying an email and the code mailed to it
#[derive(Deserialize)]
pub struct VerifyEmailRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

/// Request naming an email only
#[derive(Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

/// Request for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request for password reset
#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default, rename = "newPassword")]
    pub new_password: String,
}

/// Response for user login
#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserSummary,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/resend-code", post(resend_code))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

fn required_email(raw: &str) -> Result<String, AuthError> {
    let email = normalize_email(raw);
    validate_email(&email).map_err(AuthError::BadRequest)?;
    Ok(email)
}

async fn throttle(state: &AppState, action: &str, email: &str) -> Result<String, AuthError> {
    let key = format!("{}:{}", action, email);
    if !state.rate_limiter.check(&key).await {
        warn!("Throttled {} for {}", action, email);
        return Err(AuthError::TooManyAttempts);
    }
    Ok(key)
}

/// Register a new account and mail its verification code
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = required_email(&payload.email)?;
    validate_password(&payload.password).map_err(AuthError::BadRequest)?;
    validate_name("first_name", &payload.first_name).map_err(AuthError::BadRequest)?;
    validate_name("last_name", &payload.last_name).map_err(AuthError::BadRequest)?;

    info!("Registration attempt for {}", email);

    if state.user_repository.find_by_email(&email).await?.is_some() {
        return Err(AuthError::Conflict("Email is already registered".to_string()));
    }

    let new_user = NewUser {
        email: email.clone(),
        password_hash: hash_password(&payload.password)?,
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        photo_url: payload.photo_url.filter(|url| !url.trim().is_empty()),
    };

    let mut tx = state.db_pool.begin().await?;
    let user = state
        .user_repository
        .create(&mut tx, &new_user)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::Conflict("Email is already registered".to_string())
            } else {
                AuthError::Database(e)
            }
        })?;
    state
        .verification
        .issue(&mut tx, &user.email, CodePurpose::EmailVerification)
        .await?;
    tx.commit().await?;

    info!("Registered user {} ({})", user.id, user.email);

    Ok((
        StatusCode::CREATED,
        MessageResponse::new("Registration successful, check your email for the verification code"),
    ))
}

/// Confirm an email address with the mailed code
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = required_email(&payload.email)?;
    if payload.code.trim().is_empty() {
        return Err(AuthError::BadRequest("Verification code is required".to_string()));
    }
    let key = throttle(&state, "verify", &email).await?;

    let mut tx = state.db_pool.begin().await?;
    state
        .verification
        .verify(&mut tx, &email, &payload.code)
        .await?;
    if !state.user_repository.mark_verified(&mut tx, &email).await? {
        return Err(AuthError::NotFound("User not found".to_string()));
    }
    state.verification.consume(&mut tx, &email).await?;
    tx.commit().await?;

    state.rate_limiter.reset(&key).await;
    info!("Email verified for {}", email);

    Ok(MessageResponse::new("Email verified successfully"))
}

/// Issue a fresh verification code for an unverified account
pub async fn resend_code(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = required_email(&payload.email)?;
    throttle(&state, "resend", &email).await?;

    let user = state
        .user_repository
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;
    if user.is_verified {
        return Err(AuthError::Conflict("Email is already verified".to_string()));
    }

    let mut tx = state.db_pool.begin().await?;
    state
        .verification
        .issue(&mut tx, &email, CodePurpose::EmailVerification)
        .await?;
    tx.commit().await?;

    Ok(MessageResponse::new("Verification code sent"))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(AuthError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }
    let key = throttle(&state, "login", &email).await?;

    info!("Login attempt for {}", email);

    let user = state
        .user_repository
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AuthError::InvalidCredentials);
    }

    if !user.is_verified {
        return Err(AuthError::EmailNotVerified);
    }

    let token = state
        .jwt_service
        .generate_access_token(&user)
        .map_err(|e| AuthError::Internal(format!("Failed to generate access token: {}", e)))?;

    state.rate_limiter.reset(&key).await;

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.token_expiry(),
        user: UserSummary::from(&user),
    }))
}

/// Mail a password reset code
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = required_email(&payload.email)?;
    throttle(&state, "forgot", &email).await?;

    if state.user_repository.find_by_email(&email).await?.is_none() {
        return Err(AuthError::NotFound("User not found".to_string()));
    }

    let mut tx = state.db_pool.begin().await?;
    state
        .verification
        .issue(&mut tx, &email, CodePurpose::PasswordReset)
        .await?;
    tx.commit().await?;

    Ok(MessageResponse::new("Password reset code sent"))
}

/// Set a new password using a mailed reset code
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = required_email(&payload.email)?;
    if payload.otp.trim().is_empty() {
        return Err(AuthError::BadRequest("Reset code is required".to_string()));
    }
    validate_password(&payload.new_password).map_err(AuthError::BadRequest)?;
    let key = throttle(&state, "reset", &email).await?;

    let password_hash = hash_password(&payload.new_password)?;

    let mut tx = state.db_pool.begin().await?;
    state
        .verification
        .verify(&mut tx, &email, &payload.otp)
        .await?;
    if !state
        .user_repository
        .update_password(&mut tx, &email, &password_hash)
        .await?
    {
        return Err(AuthError::NotFound("User not found".to_string()));
    }
    state.verification.consume(&mut tx, &email).await?;
    tx.commit().await?;

    state.rate_limiter.reset(&key).await;
    info!("Password reset for {}", email);

    Ok(MessageResponse::new("Password has been reset"))
}
