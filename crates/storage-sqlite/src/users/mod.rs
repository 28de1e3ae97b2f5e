//! SQLite persistence for the cached user profile.

mod model;
mod repository;

pub use model::UserDB;
pub use repository::UserRepository;
