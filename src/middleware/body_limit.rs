use actix_http::h1;
use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::Method;
use actix_web::{web, Error, HttpMessage, ResponseError};
use futures::future::{ready, LocalBoxFuture, Ready};
use futures::StreamExt;
use std::rc::Rc;

use crate::error::AppError;

const MUTATING_METHODS: [Method; 4] =
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE];

/// Caps request body size for mutating methods. The body is buffered here,
/// before any handler or extractor sees it, and re-injected for downstream
/// use when it fits. Reads (GET/HEAD) pass through untouched.
pub struct BodyLimit {
    max_bytes: usize,
}

impl BodyLimit {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BodyLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = BodyLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BodyLimitMiddleware {
            service: Rc::new(service),
            max_bytes: self.max_bytes,
        }))
    }
}

pub struct BodyLimitMiddleware<S> {
    service: Rc<S>,
    max_bytes: usize,
}

impl<S, B> Service<ServiceRequest> for BodyLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let max_bytes = self.max_bytes;

        Box::pin(async move {
            if MUTATING_METHODS.contains(req.method()) {
                let mut payload = req.take_payload();
                let mut body = web::BytesMut::new();
                while let Some(chunk) = payload.next().await {
                    let chunk = chunk?;
                    if body.len() + chunk.len() > max_bytes {
                        let response = AppError::PayloadTooLarge.error_response();
                        return Ok(req.into_response(response.map_into_right_body()));
                    }
                    body.extend_from_slice(&chunk);
                }

                // Hand the buffered bytes back so Json and friends still
                // work downstream.
                let (_, mut replacement) = h1::Payload::create(true);
                replacement.unread_data(body.freeze());
                req.set_payload(replacement.into());
            }

            service.call(req).await.map(ServiceResponse::map_into_left_body)
        })
    }
}
