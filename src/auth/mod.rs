//! Authentication: Telegram init-data login, token refresh and the
//! stateless session tokens backing both.

pub mod handlers;
pub mod service;
pub mod tokens;

pub use service::{AuthService, TokenPair};
pub use tokens::{Claims, TokenKind, TokenService};
