use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage, ResponseError};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::net::IpAddr;
use std::rc::Rc;
use std::sync::Arc;
use tracing::warn;

use crate::error::AppError;
use crate::rate_limit::{IdentityResolver, RateLimiter};
use crate::telegram::TelegramAuthData;

fn peer_ip(req: &ServiceRequest) -> Option<IpAddr> {
    req.peer_addr().map(|addr| addr.ip())
}

fn forwarded_for(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Global per-request cap, applied to all traffic ahead of routing with
/// network-address identity. Distinct from route limiters: exceeding it
/// reads as "service overloaded", not "slow down this endpoint".
pub struct GlobalRateLimit {
    limiter: Arc<RateLimiter>,
    resolver: Arc<IdentityResolver>,
    limit: u64,
    window_seconds: u64,
}

impl GlobalRateLimit {
    pub fn new(
        limiter: Arc<RateLimiter>,
        resolver: Arc<IdentityResolver>,
        limit: u64,
        window_seconds: u64,
    ) -> Self {
        Self {
            limiter,
            resolver,
            limit,
            window_seconds,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for GlobalRateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = GlobalRateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(GlobalRateLimitMiddleware {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            resolver: self.resolver.clone(),
            limit: self.limit,
            window_seconds: self.window_seconds,
        }))
    }
}

pub struct GlobalRateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
    resolver: Arc<IdentityResolver>,
    limit: u64,
    window_seconds: u64,
}

impl<S, B> Service<ServiceRequest> for GlobalRateLimitMiddleware<S>
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
        let limiter = self.limiter.clone();
        let resolver = self.resolver.clone();
        let limit = self.limit;
        let window_seconds = self.window_seconds;

        Box::pin(async move {
            let identity =
                resolver.network_identity(peer_ip(&req), forwarded_for(&req).as_deref());
            let key = format!("global:{}", identity);
            if !limiter.allow(&key, limit, window_seconds).await {
                warn!(event = "global_rate_limited", identity = %identity);
                let response = AppError::ServiceOverloaded.error_response();
                return Ok(req.into_response(response.map_into_right_body()));
            }
            service
                .call(req)
                .await
                .map(ServiceResponse::map_into_left_body)
        })
    }
}

/// Route-scope cap (`auth`, `usage`, `admin`) with independently configured
/// limit and window. With `user_aware` set, an authenticated identity
/// stashed earlier in the pipeline keys the counter instead of the network
/// address.
pub struct ScopedRateLimit {
    scope: &'static str,
    limiter: Arc<RateLimiter>,
    resolver: Arc<IdentityResolver>,
    limit: u64,
    window_seconds: u64,
    user_aware: bool,
}

impl ScopedRateLimit {
    pub fn new(
        scope: &'static str,
        limiter: Arc<RateLimiter>,
        resolver: Arc<IdentityResolver>,
        limit: u64,
        window_seconds: u64,
    ) -> Self {
        Self {
            scope,
            limiter,
            resolver,
            limit,
            window_seconds,
            user_aware: false,
        }
    }

    pub fn user_aware(mut self) -> Self {
        self.user_aware = true;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for ScopedRateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ScopedRateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ScopedRateLimitMiddleware {
            service: Rc::new(service),
            scope: self.scope,
            limiter: self.limiter.clone(),
            resolver: self.resolver.clone(),
            limit: self.limit,
            window_seconds: self.window_seconds,
            user_aware: self.user_aware,
        }))
    }
}

pub struct ScopedRateLimitMiddleware<S> {
    service: Rc<S>,
    scope: &'static str,
    limiter: Arc<RateLimiter>,
    resolver: Arc<IdentityResolver>,
    limit: u64,
    window_seconds: u64,
    user_aware: bool,
}

impl<S, B> Service<ServiceRequest> for ScopedRateLimitMiddleware<S>
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
        let limiter = self.limiter.clone();
        let resolver = self.resolver.clone();
        let scope = self.scope;
        let limit = self.limit;
        let window_seconds = self.window_seconds;
        let user_aware = self.user_aware;

        Box::pin(async move {
            let identity = if user_aware {
                let user_id = req
                    .extensions()
                    .get::<TelegramAuthData>()
                    .map(|auth| auth.id);
                resolver.user_identity(user_id, peer_ip(&req), forwarded_for(&req).as_deref())
            } else {
                resolver.network_identity(peer_ip(&req), forwarded_for(&req).as_deref())
            };

            let key = format!("{}:{}", scope, identity);
            if !limiter.allow(&key, limit, window_seconds).await {
                warn!(event = "rate_limited", scope = scope, identity = %identity);
                let response = AppError::RateLimited.error_response();
                return Ok(req.into_response(response.map_into_right_body()));
            }
            service
                .call(req)
                .await
                .map(ServiceResponse::map_into_left_body)
        })
    }
}
