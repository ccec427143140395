pub mod auth;
pub mod config;
pub mod content;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod telegram;
pub mod users;

use actix_web::{web, HttpResponse};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub use config::Settings;
pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;

pub use auth::{AuthService, TokenService};
pub use content::ContentStore;
pub use rate_limit::{IdentityResolver, MemoryCounterStore, RateLimiter};
pub use telegram::TelegramVerifier;
pub use users::{PgUserStore, UserService};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Readiness probe: proves a database round trip still works.
pub async fn health_ready(state: web::Data<AppState>) -> Result<HttpResponse> {
    sqlx::query("SELECT 1")
        .execute(state.db_pool.as_ref())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "ready" })))
}

/// Application state shared across all components. Everything is
/// constructed once here from the loaded `Settings` and injected by
/// handle; no component reads configuration ambiently.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db_pool: Arc<PgPool>,
    /// Concrete store handle, kept for the periodic sweep.
    pub counter_store: Arc<MemoryCounterStore>,
    pub limiter: Arc<RateLimiter>,
    pub identity: Arc<IdentityResolver>,
    pub verifier: Arc<TelegramVerifier>,
    pub users: Arc<UserService>,
    pub auth: Arc<AuthService>,
    pub content: Arc<ContentStore>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await
            .map_err(|e| {
                AppError::DatabaseError(error::DatabaseError::ConnectionError(e.to_string()))
            })?;
        Ok(Self::with_pool(config, db_pool))
    }

    /// Assemble the service graph over an existing pool. Tests hand in a
    /// lazy pool here.
    pub fn with_pool(config: Settings, db_pool: PgPool) -> Self {
        let db_pool = Arc::new(db_pool);

        let counter_store = Arc::new(MemoryCounterStore::new());
        let limiter = Arc::new(RateLimiter::new(counter_store.clone()));
        let identity = Arc::new(IdentityResolver::new(config.trusted_proxy_networks()));
        let verifier = Arc::new(TelegramVerifier::new(config.telegram.bot_token.clone()));

        let tokens = Arc::new(TokenService::new(
            config.auth.jwt_secret.clone(),
            config.auth.access_ttl_minutes,
            config.auth.refresh_ttl_days,
        ));
        let users = Arc::new(UserService::new(
            Arc::new(PgUserStore::new(db_pool.clone())),
            config.admin_telegram_ids(),
        ));
        let auth = Arc::new(AuthService::new(
            verifier.clone(),
            tokens,
            users.clone(),
        ));
        let content = Arc::new(ContentStore::new(db_pool.clone()));

        Self {
            config: Arc::new(config),
            db_pool,
            counter_store,
            limiter,
            identity,
            verifier,
            users,
            auth,
            content,
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.db_pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_requires_database() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let state = AppState::new(config).await;

        // No test database configured, so construction should fail.
        assert!(state.is_err());
        if let Err(e) = state {
            assert!(matches!(e, AppError::DatabaseError(_)));
        }
    }

    #[tokio::test]
    async fn test_shutdown_closes_pool() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database.url)
            .expect("Failed to build lazy pool");
        let state = AppState::with_pool(config, pool);

        state.shutdown().await.unwrap();
        assert!(state.db_pool.is_closed());
    }
}
