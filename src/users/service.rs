use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, DatabaseError};
use crate::telegram::TelegramAuthData;
use crate::users::models::{User, UserProfile, UserPublic};
use crate::users::store::UserStore;

/// Longest single usage report accepted: six hours.
const MAX_USAGE_SECONDS: i64 = 6 * 60 * 60;

/// Upsert-on-auth and usage accounting over the user store.
pub struct UserService {
    store: Arc<dyn UserStore>,
    admin_ids: Vec<i64>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, admin_ids: Vec<i64>) -> Self {
        Self { store, admin_ids }
    }

    /// Create-if-absent-else-update-if-changed, keyed by telegram id.
    /// Repeated logins with unchanged profiles cost one read and no write.
    pub async fn ensure_user(&self, auth: &TelegramAuthData) -> Result<User, AppError> {
        let profile = UserProfile::from_auth(auth, &self.admin_ids);

        let existing = match self.store.get_by_telegram_id(profile.telegram_id).await? {
            Some(user) => Some(user),
            None => match self.store.insert(&profile).await {
                Ok(user) => {
                    info!(telegram_id = profile.telegram_id, "created user");
                    return Ok(user);
                }
                // Concurrent first login: the unique constraint on
                // telegram_id made us the loser. Retry as an update.
                Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
                    self.store.get_by_telegram_id(profile.telegram_id).await?
                }
                Err(e) => return Err(e),
            },
        };

        let user = existing.ok_or(AppError::DatabaseError(DatabaseError::NotFound))?;
        if profile.matches(&user) {
            return Ok(user);
        }
        self.store.update_profile(user.id, &profile).await
    }

    pub async fn get_or_create(&self, auth: &TelegramAuthData) -> Result<UserPublic, AppError> {
        let user = self.ensure_user(auth).await?;
        Ok(UserPublic::from(&user))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        self.store.get_by_id(id).await
    }

    /// Resolve the authenticated identity and require the admin flag.
    /// Mutating content routes gate on this.
    pub async fn require_admin(&self, auth: &TelegramAuthData) -> Result<UserPublic, AppError> {
        let user = self.get_or_create(auth).await?;
        if !user.is_admin {
            return Err(AppError::Forbidden("admin_only".into()));
        }
        Ok(user)
    }

    /// Add reported in-app time to the user's monotonic counter.
    pub async fn add_usage_time(
        &self,
        auth: &TelegramAuthData,
        seconds: i64,
    ) -> Result<UserPublic, AppError> {
        if seconds <= 0 {
            return Err(AppError::ValidationError("seconds must be positive".into()));
        }
        if seconds > MAX_USAGE_SECONDS {
            return Err(AppError::ValidationError(
                "seconds exceeds maximum session duration".into(),
            ));
        }

        let user = self.ensure_user(auth).await?;
        let updated = self.store.add_usage_seconds(user.id, seconds).await?;
        Ok(UserPublic::from(&updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::store::MockUserStore;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn auth_data(id: i64) -> TelegramAuthData {
        TelegramAuthData {
            id,
            username: Some("durov".into()),
            first_name: Some("Pavel".into()),
            last_name: None,
            photo_url: None,
            auth_date: Utc::now().timestamp(),
            hash: "deadbeef".into(),
            locale: Some("en".into()),
        }
    }

    fn stored_user(telegram_id: i64) -> User {
        let now = Utc::now();
        User {
            id: 1,
            telegram_id,
            username: Some("durov".into()),
            first_name: Some("Pavel".into()),
            last_name: None,
            avatar_url: None,
            locale: "en".into(),
            is_admin: false,
            is_active: true,
            app_seconds_spent: 100,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_first_login_creates_user() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_telegram_id()
            .with(eq(500))
            .times(1)
            .returning(|_| Ok(None));
        store
            .expect_insert()
            .times(1)
            .returning(|profile| {
                let mut user = stored_user(profile.telegram_id);
                user.is_admin = profile.is_admin;
                Ok(user)
            });

        let service = UserService::new(Arc::new(store), vec![]);
        let user = service.get_or_create(&auth_data(500)).await.unwrap();
        assert_eq!(user.id, 1);
        assert!(!user.is_admin);
    }

    #[tokio::test]
    async fn test_idempotent_login_skips_write() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_telegram_id()
            .with(eq(500))
            .times(1)
            .returning(|tg| Ok(Some(stored_user(tg))));
        // No expect_update_profile / expect_insert: any write panics the
        // mock, which is the write-count side channel this test relies on.

        let service = UserService::new(Arc::new(store), vec![]);
        let user = service.get_or_create(&auth_data(500)).await.unwrap();
        assert_eq!(user.username.as_deref(), Some("durov"));
    }

    #[tokio::test]
    async fn test_changed_profile_triggers_single_update() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_telegram_id()
            .returning(|tg| Ok(Some(stored_user(tg))));
        store
            .expect_update_profile()
            .times(1)
            .returning(|id, profile| {
                let mut user = stored_user(profile.telegram_id);
                user.id = id;
                user.username = profile.username.clone();
                Ok(user)
            });

        let mut auth = auth_data(500);
        auth.username = Some("renamed".into());

        let service = UserService::new(Arc::new(store), vec![]);
        let user = service.get_or_create(&auth).await.unwrap();
        assert_eq!(user.username.as_deref(), Some("renamed"));
    }

    #[tokio::test]
    async fn test_allowlist_promotes_on_login() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_telegram_id()
            .returning(|tg| Ok(Some(stored_user(tg))));
        store
            .expect_update_profile()
            .times(1)
            .returning(|id, profile| {
                let mut user = stored_user(profile.telegram_id);
                user.id = id;
                user.is_admin = profile.is_admin;
                Ok(user)
            });

        let service = UserService::new(Arc::new(store), vec![500]);
        let user = service.get_or_create(&auth_data(500)).await.unwrap();
        assert!(user.is_admin);
    }

    #[tokio::test]
    async fn test_insert_race_retries_as_update() {
        let mut store = MockUserStore::new();
        let mut lookups = 0;
        store.expect_get_by_telegram_id().returning(move |tg| {
            lookups += 1;
            if lookups == 1 {
                Ok(None)
            } else {
                Ok(Some(stored_user(tg)))
            }
        });
        store.expect_insert().times(1).returning(|_| {
            Err(AppError::DatabaseError(DatabaseError::Duplicate))
        });

        let service = UserService::new(Arc::new(store), vec![]);
        // The winner's row matches our profile, so no update either.
        let user = service.get_or_create(&auth_data(500)).await.unwrap();
        assert_eq!(user.id, 1);
    }

    #[tokio::test]
    async fn test_admin_gate_rejects_non_admin() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_telegram_id()
            .returning(|tg| Ok(Some(stored_user(tg))));

        let service = UserService::new(Arc::new(store), vec![]);
        let err = service.require_admin(&auth_data(500)).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(reason) if reason == "admin_only"));
    }

    #[tokio::test]
    async fn test_admin_gate_passes_allowlisted_user() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_telegram_id()
            .returning(|tg| Ok(Some(stored_user(tg))));
        // Allowlisting flips the flag relative to the stored row, so the
        // gate's lookup goes through the update path.
        store
            .expect_update_profile()
            .times(1)
            .returning(|id, profile| {
                let mut user = stored_user(profile.telegram_id);
                user.id = id;
                user.is_admin = profile.is_admin;
                Ok(user)
            });

        let service = UserService::new(Arc::new(store), vec![500]);
        let user = service.require_admin(&auth_data(500)).await.unwrap();
        assert!(user.is_admin);
    }

    #[tokio::test]
    async fn test_usage_bounds() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_telegram_id()
            .returning(|tg| Ok(Some(stored_user(tg))));
        store
            .expect_add_usage_seconds()
            .with(eq(1), eq(3600))
            .times(1)
            .returning(|id, seconds| {
                let mut user = stored_user(500);
                user.id = id;
                user.app_seconds_spent += seconds;
                Ok(user)
            });

        let service = UserService::new(Arc::new(store), vec![]);
        let auth = auth_data(500);

        let err = service.add_usage_time(&auth, 0).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = service.add_usage_time(&auth, 21601).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let user = service.add_usage_time(&auth, 3600).await.unwrap();
        assert_eq!(user.app_seconds_spent, 3700);
    }
}
