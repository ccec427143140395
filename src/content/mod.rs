//! Educational content: courses and books with nested quizzes. Plain CRUD
//! glue around Postgres; the auth core consumes this surface as-is.

pub mod handlers;
pub mod models;
pub mod store;

pub use store::ContentStore;
