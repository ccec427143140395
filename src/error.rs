use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    AuthError(#[from] AuthError),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("payload_too_large")]
    PayloadTooLarge,

    #[error("rate_limit_exceeded")]
    RateLimited,

    #[error("service_overloaded")]
    ServiceOverloaded,

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("internal server error: {0}")]
    InternalError(String),
}

/// Authentication failures. Every variant displays as the sanitized reason
/// code returned to clients and written to logs; raw verifier detail never
/// leaves this module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing_telegram_payload")]
    MissingPayload,

    #[error("invalid_payload")]
    InvalidPayload,

    #[error("invalid_signature")]
    InvalidSignature,

    #[error("missing_user_payload")]
    MissingUserPayload,

    #[error("invalid_user_payload")]
    InvalidUserPayload,

    #[error("missing_user_id")]
    MissingUserId,

    #[error("invalid_auth_date")]
    InvalidAuthDate,

    #[error("auth_expired")]
    AuthExpired,

    #[error("invalid_token")]
    InvalidToken,

    #[error("invalid_refresh_token")]
    InvalidRefreshToken,

    #[error("user_not_found")]
    UserNotFound,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("query error: {0}")]
    QueryError(String),

    #[error("record not found")]
    NotFound,

    #[error("duplicate record")]
    Duplicate,
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::DatabaseError(DatabaseError::NotFound),
            sqlx::Error::Database(e) if e.code().as_deref() == Some("23505") => {
                AppError::DatabaseError(DatabaseError::Duplicate)
            }
            _ => AppError::DatabaseError(DatabaseError::QueryError(err.to_string())),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl AppError {
    /// Machine-parsable reason string, serialized as the `detail` field.
    /// Server-side failures collapse to a generic code so internals are
    /// never echoed to clients.
    fn detail(&self) -> String {
        match self {
            AppError::AuthError(e) => e.to_string(),
            AppError::Forbidden(reason) => reason.clone(),
            AppError::NotFound(kind) => format!("{}_not_found", kind),
            AppError::PayloadTooLarge => "payload_too_large".into(),
            AppError::RateLimited => "rate_limit_exceeded".into(),
            AppError::ServiceOverloaded => "service_overloaded".into(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::DatabaseError(_)
            | AppError::ConfigError(_)
            | AppError::InternalError(_) => "internal_error".into(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.detail() }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited | AppError::ServiceOverloaded => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_)
            | AppError::ConfigError(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_status_codes() {
        let err = AppError::AuthError(AuthError::InvalidSignature);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::Forbidden("admin_only".into());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = AppError::RateLimited;
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let err = AppError::ServiceOverloaded;
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let err = AppError::PayloadTooLarge;
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

        let err = AppError::NotFound("course");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = AppError::ValidationError("seconds out of range".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_reason_codes_are_sanitized() {
        // Auth failures expose exactly the machine-readable code.
        let err = AppError::AuthError(AuthError::AuthExpired);
        assert_eq!(err.detail(), "auth_expired");

        let err = AppError::AuthError(AuthError::InvalidRefreshToken);
        assert_eq!(err.detail(), "invalid_refresh_token");

        let err = AppError::NotFound("book");
        assert_eq!(err.detail(), "book_not_found");

        // Internal failures never leak their message.
        let err = AppError::DatabaseError(DatabaseError::QueryError(
            "relation users does not exist".into(),
        ));
        assert_eq!(err.detail(), "internal_error");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::InternalError(_)));

        let config_err = config::ConfigError::NotFound(String::from("key not found"));
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::ConfigError(_)));

        let db_err = sqlx::Error::RowNotFound;
        let app_err: AppError = db_err.into();
        assert!(matches!(
            app_err,
            AppError::DatabaseError(DatabaseError::NotFound)
        ));
    }
}
