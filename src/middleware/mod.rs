//! Request guards composed ahead of routing, plus the per-request
//! init-data authentication layer for header-authenticated routes.

mod body_limit;
mod rate_guard;
mod telegram_auth;

pub use body_limit::BodyLimit;
pub use rate_guard::{GlobalRateLimit, ScopedRateLimit};
pub use telegram_auth::{TelegramAuth, INIT_DATA_HEADER};
