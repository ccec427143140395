//! User accounts: persistence, upsert-on-auth and usage tracking.

pub mod handlers;
pub mod models;
pub mod service;
pub mod store;

pub use models::{User, UserProfile, UserPublic};
pub use service::UserService;
pub use store::{PgUserStore, UserStore};
