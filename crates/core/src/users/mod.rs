//! User profile domain models, repository port and service.

mod users_model;
mod users_service;
mod users_traits;

pub use users_model::*;
pub use users_service::*;
pub use users_traits::*;
