use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::error::AppError;
use crate::users::models::{User, UserProfile};

const USER_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, avatar_url, \
     locale, is_admin, is_active, app_seconds_spent, created_at, updated_at";

/// Persistence seam for user rows. Mocked in tests to count writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn get_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, AppError>;

    /// Insert a new user. Surfaces `DatabaseError::Duplicate` when another
    /// request won the race on `telegram_id`.
    async fn insert(&self, profile: &UserProfile) -> Result<User, AppError>;

    async fn update_profile(&self, id: i64, profile: &UserProfile) -> Result<User, AppError>;

    async fn add_usage_seconds(&self, id: i64, seconds: i64) -> Result<User, AppError>;
}

pub struct PgUserStore {
    pool: Arc<PgPool>,
}

impl PgUserStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn get_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE telegram_id = $1",
            USER_COLUMNS
        ))
        .bind(telegram_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn insert(&self, profile: &UserProfile) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (telegram_id, username, first_name, last_name, avatar_url, locale, is_admin)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(profile.telegram_id)
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.avatar_url)
        .bind(&profile.locale)
        .bind(profile.is_admin)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn update_profile(&self, id: i64, profile: &UserProfile) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = $2, first_name = $3, last_name = $4, avatar_url = $5,
                locale = $6, is_admin = $7, updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.avatar_url)
        .bind(&profile.locale)
        .bind(profile.is_admin)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn add_usage_seconds(&self, id: i64, seconds: i64) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET app_seconds_spent = app_seconds_spent + $2, updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(seconds)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(user)
    }
}
