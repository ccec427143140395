use actix_web::{web, HttpResponse};
use tracing::info;

use crate::error::AppError;
use crate::telegram::TelegramAuthData;
use crate::users::models::UserUsageUpdate;
use crate::AppState;

/// GET /users/me — profile for the init-data identity in the request
/// header. Upserts on the way through, same as login.
pub async fn get_me(
    auth: TelegramAuthData,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = state.users.get_or_create(&auth).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// POST /users/me/usage — accumulate reported in-app seconds.
pub async fn report_usage(
    auth: TelegramAuthData,
    payload: web::Json<UserUsageUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = state.users.add_usage_time(&auth, payload.seconds).await?;
    info!(
        event = "usage_reported",
        user_id = user.id,
        seconds = payload.seconds
    );
    Ok(HttpResponse::Ok().json(user))
}
