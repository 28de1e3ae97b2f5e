//! SQLite persistence for the local expense cache.

mod model;
mod repository;

pub use model::{ExpenseDB, NewExpenseDB};
pub use repository::ExpenseRepository;
