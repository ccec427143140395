use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::telegram::TelegramAuthData;

/// Persisted user row. Keyed internally by `id`; `telegram_id` carries a
/// unique constraint and is the natural key for upserts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub locale: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub app_seconds_spent: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-facing profile shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub locale: String,
    pub is_admin: bool,
    pub app_seconds_spent: i64,
}

impl From<&User> for UserPublic {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            locale: user.locale.clone(),
            is_admin: user.is_admin,
            app_seconds_spent: user.app_seconds_spent,
        }
    }
}

/// Mutable profile fields as observed at auth time. The admin flag is
/// recomputed against the allowlist on every login, so allowlist edits take
/// effect at the user's next authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub locale: String,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
}

impl UserProfile {
    pub fn from_auth(auth: &TelegramAuthData, admin_ids: &[i64]) -> Self {
        Self {
            telegram_id: auth.id,
            username: auth.username.clone(),
            first_name: auth.first_name.clone(),
            last_name: auth.last_name.clone(),
            locale: auth.locale.clone().unwrap_or_else(|| "en".to_string()),
            avatar_url: auth.photo_url.clone(),
            is_admin: admin_ids.contains(&auth.id),
        }
    }

    /// True when persisting this profile over `user` would change nothing.
    pub fn matches(&self, user: &User) -> bool {
        self.username == user.username
            && self.first_name == user.first_name
            && self.last_name == user.last_name
            && self.locale == user.locale
            && self.avatar_url == user.avatar_url
            && self.is_admin == user.is_admin
    }
}

#[derive(Debug, Deserialize)]
pub struct UserUsageUpdate {
    pub seconds: i64,
}
