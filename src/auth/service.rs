use serde::Serialize;
use std::sync::Arc;

use crate::auth::tokens::{TokenKind, TokenService};
use crate::error::{AppError, AuthError};
use crate::telegram::TelegramVerifier;
use crate::users::{UserPublic, UserService};

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub user: UserPublic,
}

/// Ties the verifier, the user upsert and the token issuer into the two
/// auth flows. Refresh never rotates or revokes the presented token: a
/// still-valid refresh token stays usable until natural expiry.
pub struct AuthService {
    verifier: Arc<TelegramVerifier>,
    tokens: Arc<TokenService>,
    users: Arc<UserService>,
}

impl AuthService {
    pub fn new(
        verifier: Arc<TelegramVerifier>,
        tokens: Arc<TokenService>,
        users: Arc<UserService>,
    ) -> Self {
        Self {
            verifier,
            tokens,
            users,
        }
    }

    /// Login: verify the signed init-data blob, upsert the user, mint a
    /// token pair scoped to the internal user id.
    pub async fn login(&self, raw_init_data: &str) -> Result<TokenPair, AppError> {
        let auth = self.verifier.verify(raw_init_data)?;
        let user = self.users.get_or_create(&auth).await?;
        self.issue_pair(user)
    }

    /// Refresh: decode the presented token, require the refresh kind and a
    /// resolvable subject, then mint a fresh pair. Kind and subject are
    /// checked here rather than in the token service on purpose — an
    /// access token is structurally valid and must still be rejected.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self
            .tokens
            .verify(refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::InvalidRefreshToken.into());
        }

        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.issue_pair(UserPublic::from(&user))
    }

    fn issue_pair(&self, user: UserPublic) -> Result<TokenPair, AppError> {
        let access = self.tokens.issue_access(user.id)?;
        let refresh = self.tokens.issue_refresh(user.id)?;
        Ok(TokenPair {
            access,
            refresh,
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::models::User;
    use crate::users::store::MockUserStore;
    use chrono::Utc;

    fn stored_user(id: i64) -> User {
        let now = Utc::now();
        User {
            id,
            telegram_id: 900 + id,
            username: Some("reader".into()),
            first_name: None,
            last_name: None,
            avatar_url: None,
            locale: "en".into(),
            is_admin: false,
            is_active: true,
            app_seconds_spent: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn service_with_store(store: MockUserStore) -> AuthService {
        AuthService::new(
            Arc::new(TelegramVerifier::new("123456:test-bot-token")),
            Arc::new(TokenService::new(
                "test-secret-0123456789abcdef".into(),
                15,
                30,
            )),
            Arc::new(UserService::new(Arc::new(store), vec![])),
        )
    }

    #[tokio::test]
    async fn test_refresh_with_valid_token() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_id()
            .returning(|id| Ok(Some(stored_user(id))));

        let auth = service_with_store(store);
        let refresh = auth.tokens.issue_refresh(5).unwrap();

        let pair = auth.refresh(&refresh).await.unwrap();
        assert_eq!(pair.user.id, 5);
        assert!(!pair.access.is_empty());
        assert!(!pair.refresh.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_id()
            .returning(|id| Ok(Some(stored_user(id))));

        let auth = service_with_store(store);
        // Validly signed, unexpired — but the wrong kind.
        let access = auth.tokens.issue_access(5).unwrap();

        let err = auth.refresh(&access).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::AuthError(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rejects_garbage() {
        let auth = service_with_store(MockUserStore::new());
        let err = auth.refresh("not-a-token").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::AuthError(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_for_deleted_user() {
        let mut store = MockUserStore::new();
        store.expect_get_by_id().returning(|_| Ok(None));

        let auth = service_with_store(store);
        let refresh = auth.tokens.issue_refresh(5).unwrap();

        let err = auth.refresh(&refresh).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_signature() {
        let auth = service_with_store(MockUserStore::new());
        let err = auth
            .login("auth_date=1&user=%7B%22id%22%3A1%7D&hash=00ff")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::AuthError(AuthError::InvalidSignature)
        ));
    }
}
