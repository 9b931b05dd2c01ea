//! Profile and moderator mail models

use chrono::{DateTime, Utc};
use common::role::Role;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User as shown on the profile page
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub photo_url: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Partial profile update; absent fields keep their value
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvatarRequest {
    #[serde(default)]
    pub photo_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeEmailRequest {
    #[serde(default, rename = "newEmail")]
    pub new_email: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default, rename = "currentPassword")]
    pub current_password: String,
    #[serde(default, rename = "newPassword")]
    pub new_password: String,
}

/// Moderator reply sent to a customer
#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub text: String,
}

impl SendEmailRequest {
    /// Names of the blank fields
    pub fn missing_fields(&self) -> Vec<String> {
        [
            ("to", &self.to),
            ("subject", &self.subject),
            ("text", &self.text),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
