use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, ResponseError};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;
use tracing::warn;

use crate::error::{AppError, AuthError};
use crate::telegram::{TelegramAuthData, TelegramVerifier};

/// Header carrying the raw init-data blob on routes that re-verify per
/// request instead of trusting an issued token.
pub const INIT_DATA_HEADER: &str = "X-Telegram-Init-Data";

/// Verifies the init-data header on every request through the wrapped
/// scope and stashes the resulting identity in request extensions, where
/// the `TelegramAuthData` extractor and user-aware rate limiting pick it
/// up.
pub struct TelegramAuth {
    verifier: Arc<TelegramVerifier>,
}

impl TelegramAuth {
    pub fn new(verifier: Arc<TelegramVerifier>) -> Self {
        Self { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TelegramAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = TelegramAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TelegramAuthMiddleware {
            service: Rc::new(service),
            verifier: self.verifier.clone(),
        }))
    }
}

pub struct TelegramAuthMiddleware<S> {
    service: Rc<S>,
    verifier: Arc<TelegramVerifier>,
}

impl<S, B> Service<ServiceRequest> for TelegramAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let verifier = self.verifier.clone();

        Box::pin(async move {
            let raw = req
                .headers()
                .get(INIT_DATA_HEADER)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty());

            let raw = match raw {
                Some(raw) => raw,
                None => {
                    warn!(event = "header_auth_failed", reason = "missing_telegram_payload");
                    let response =
                        AppError::AuthError(AuthError::MissingPayload).error_response();
                    return Ok(req.into_response(response.map_into_right_body()));
                }
            };

            match verifier.verify(raw) {
                Ok(auth) => {
                    req.extensions_mut().insert(auth);
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                }
                Err(e) => {
                    warn!(event = "header_auth_failed", reason = %e);
                    let response = AppError::AuthError(e).error_response();
                    Ok(req.into_response(response.map_into_right_body()))
                }
            }
        })
    }
}

/// Extractor companion: pulls the identity the middleware stashed. Routes
/// using it must sit inside a `TelegramAuth`-wrapped scope.
impl FromRequest for TelegramAuthData {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let auth = req.extensions().get::<TelegramAuthData>().cloned();
        ready(auth.ok_or_else(|| AppError::AuthError(AuthError::MissingPayload).into()))
    }
}
