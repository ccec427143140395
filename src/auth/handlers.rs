use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MiniAppAuthRequest {
    pub init_data: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// POST /auth/telegram/miniapp — exchange a signed init-data blob for a
/// token pair. Failures log the sanitized reason only; the raw blob never
/// reaches the log stream.
pub async fn login(
    req: web::Json<MiniAppAuthRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    match state.auth.login(&req.init_data).await {
        Ok(pair) => {
            info!(event = "miniapp_auth", user_id = pair.user.id, "login ok");
            Ok(HttpResponse::Ok().json(pair))
        }
        Err(e) => {
            warn!(event = "miniapp_auth_failed", reason = %e);
            Err(e)
        }
    }
}

/// POST /auth/refresh — exchange a refresh token for a fresh pair.
pub async fn refresh(
    req: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    match state.auth.refresh(&req.refresh).await {
        Ok(pair) => {
            info!(event = "miniapp_token_refresh", user_id = pair.user.id);
            Ok(HttpResponse::Ok().json(pair))
        }
        Err(e) => {
            warn!(event = "miniapp_refresh_failed", reason = %e);
            Err(e)
        }
    }
}
